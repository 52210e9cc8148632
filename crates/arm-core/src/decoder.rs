//! Hashed dispatch tables, one per encoding.
//!
//! Each table maps a hash of the discriminating instruction bits to a handler
//! selected from the ordered entry lists in [`crate::encoding`]. Tables are
//! built once per [`CpuVariant`] and are immutable afterwards.

use crate::api::CpuVariant;
use crate::encoding::{
    arm_dispatch_entries, thumb_dispatch_entries, ArmOp, DispatchEntry, ThumbOp,
};

/// Slot count of the ARM table (12-bit hash).
pub const ARM_TABLE_SIZE: usize = 4096;
/// Slot count of the Thumb table (10-bit hash).
pub const THUMB_TABLE_SIZE: usize = 1024;

/// ARM hash: bits 27..20 in the upper eight bits, bits 7..4 in the lower four.
#[must_use]
pub const fn arm_hash(instr: u32) -> usize {
    (((instr >> 16) & 0xFF0) | ((instr >> 4) & 0xF)) as usize
}

/// Thumb hash: bits 15..6.
#[must_use]
pub const fn thumb_hash(instr: u32) -> usize {
    ((instr >> 6) & 0x3FF) as usize
}

/// Returns the first entry whose hashed mask and pattern match `slot`.
fn resolve<Op: Copy>(
    slot: usize,
    entries: &[DispatchEntry<Op>],
    variant: CpuVariant,
    hash: fn(u32) -> usize,
    unknown: Op,
) -> Op {
    entries
        .iter()
        .find(|entry| {
            entry.variants.contains(variant) && slot & hash(entry.mask) == hash(entry.pattern)
        })
        .map_or(unknown, |entry| entry.op)
}

/// Immutable handler lookup for one CPU variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchTable {
    variant: CpuVariant,
    arm: Box<[ArmOp]>,
    thumb: Box<[ThumbOp]>,
}

impl DispatchTable {
    /// Builds both tables for `variant`.
    #[must_use]
    pub fn build(variant: CpuVariant) -> Self {
        let arm_entries = arm_dispatch_entries();
        let thumb_entries = thumb_dispatch_entries();

        let arm = (0..ARM_TABLE_SIZE)
            .map(|slot| resolve(slot, &arm_entries, variant, arm_hash, ArmOp::Unknown))
            .collect();
        let thumb = (0..THUMB_TABLE_SIZE)
            .map(|slot| resolve(slot, &thumb_entries, variant, thumb_hash, ThumbOp::Unknown))
            .collect();

        tracing::debug!(?variant, "dispatch tables built");
        Self {
            variant,
            arm,
            thumb,
        }
    }

    /// Variant the tables were built for.
    #[must_use]
    pub const fn variant(&self) -> CpuVariant {
        self.variant
    }

    /// Handler for a 32-bit ARM instruction.
    #[must_use]
    pub fn arm(&self, instr: u32) -> ArmOp {
        self.arm[arm_hash(instr)]
    }

    /// Handler for a 16-bit Thumb instruction.
    #[must_use]
    pub fn thumb(&self, instr: u16) -> ThumbOp {
        self.thumb[thumb_hash(u32::from(instr))]
    }
}
