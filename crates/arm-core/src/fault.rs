use thiserror::Error;

use crate::api::BusError;

/// Error classes used for diagnostics aggregation and host policy decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum FaultClass {
    /// Instruction bits matched no dispatch entry for the active variant.
    Decode,
    /// Core invariant violation (programming defect, not guest behavior).
    Internal,
    /// Error raised by the bus or an external callback.
    Bus,
}

/// Instruction set a failing instruction was fetched in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum InstructionSet {
    /// 32-bit ARM encoding.
    Arm,
    /// 16-bit Thumb encoding.
    Thumb,
}

impl std::fmt::Display for InstructionSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Arm => f.write_str("arm"),
            Self::Thumb => f.write_str("thumb"),
        }
    }
}

/// Fatal errors surfaced by a core step.
///
/// None of these are recovered inside the core; the owner decides whether to
/// halt or reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum CoreError {
    /// Instruction bits matched no dispatch entry.
    #[error("unknown {set} instruction {raw:#010x} at {address:#010x}")]
    UnknownInstruction {
        /// Encoding the instruction was fetched in.
        set: InstructionSet,
        /// Raw instruction bits (zero-extended for Thumb).
        raw: u32,
        /// Fetch address of the instruction.
        address: u32,
    },
    /// Condition field outside the 4-bit domain.
    #[error("condition code {0:#x} is outside the 4-bit domain")]
    InvalidCondition(u8),
    /// Bus or external callback failure, propagated unchanged.
    #[error(transparent)]
    Bus(#[from] BusError),
}

impl CoreError {
    /// Returns the diagnostics class for this error.
    #[must_use]
    pub const fn class(&self) -> FaultClass {
        match self {
            Self::UnknownInstruction { .. } => FaultClass::Decode,
            Self::InvalidCondition(_) => FaultClass::Internal,
            Self::Bus(_) => FaultClass::Bus,
        }
    }

    /// Returns true for errors that indicate a defect in the core itself.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self.class(), FaultClass::Internal)
    }
}
