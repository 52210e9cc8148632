//! Public host-facing API contracts for embedding the interpreter core.

use thiserror::Error;

use crate::state::{Exception, Mode, Registers};
use crate::timing::{cycle_cost, CycleCostKind};

/// Concrete CPU variant; selects which dispatch entries are installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum CpuVariant {
    /// ARM7TDMI (ARMv4T).
    #[default]
    Armv4t,
    /// ARM946E-S class core (ARMv5TE).
    Armv5te,
}

impl CpuVariant {
    /// Returns the bit this variant occupies in a [`VariantSet`].
    #[must_use]
    pub const fn bit(self) -> u8 {
        match self {
            Self::Armv4t => 1 << 0,
            Self::Armv5te => 1 << 1,
        }
    }

    /// ARMv5TE loads into PC (`LDR`, `LDM`, `POP`) select the instruction set
    /// from bit 0 of the loaded value.
    #[must_use]
    pub const fn loads_interwork(self) -> bool {
        matches!(self, Self::Armv5te)
    }
}

/// Set of CPU variants an instruction applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VariantSet(u8);

impl VariantSet {
    /// Instruction present on every supported variant.
    pub const ALL: Self = Self(CpuVariant::Armv4t.bit() | CpuVariant::Armv5te.bit());
    /// Instruction introduced by ARMv5TE.
    pub const V5TE: Self = Self(CpuVariant::Armv5te.bit());

    /// Returns true when `variant` is a member of this set.
    #[must_use]
    pub const fn contains(self, variant: CpuVariant) -> bool {
        self.0 & variant.bit() != 0
    }
}

/// Top-level immutable configuration for a core instance.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct CoreConfig {
    /// CPU variant used to filter dispatch entries.
    pub variant: CpuVariant,
    /// Address of the first instruction after reset.
    pub entry_point: u32,
    /// Processor mode entered at reset.
    pub initial_mode: Mode,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            variant: CpuVariant::Armv4t,
            entry_point: 0,
            initial_mode: Mode::Supervisor,
        }
    }
}

/// Failures reported by a bus adapter or external callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum BusError {
    /// Adapter could not complete a read.
    #[error("bus read of {width} bytes at {address:#010x} failed")]
    ReadFailed {
        /// Access address.
        address: u32,
        /// Access width in bytes.
        width: u8,
    },
    /// Adapter could not complete a write.
    #[error("bus write of {width} bytes at {address:#010x} failed")]
    WriteFailed {
        /// Access address.
        address: u32,
        /// Access width in bytes.
        width: u8,
    },
    /// Nothing is mapped at the address.
    #[error("no device mapped at {address:#010x}")]
    Unmapped {
        /// Access address.
        address: u32,
    },
    /// Peripheral register exists but has no implementation.
    #[error("peripheral register at {address:#010x} is not implemented")]
    Unimplemented {
        /// Access address.
        address: u32,
    },
}

/// Memory and exception callbacks consumed by the core.
///
/// Addresses passed to the access methods are already aligned to the access
/// width. Errors propagate out of [`crate::Cpu::step`] untouched.
pub trait Bus {
    /// Reads one byte.
    ///
    /// # Errors
    ///
    /// Returns a [`BusError`] when the adapter cannot complete the read.
    fn read8(&mut self, address: u32) -> Result<u8, BusError>;

    /// Reads a little-endian half-word.
    ///
    /// # Errors
    ///
    /// Returns a [`BusError`] when the adapter cannot complete the read.
    fn read16(&mut self, address: u32) -> Result<u16, BusError>;

    /// Reads a little-endian word.
    ///
    /// # Errors
    ///
    /// Returns a [`BusError`] when the adapter cannot complete the read.
    fn read32(&mut self, address: u32) -> Result<u32, BusError>;

    /// Writes one byte.
    ///
    /// # Errors
    ///
    /// Returns a [`BusError`] when the adapter cannot complete the write.
    fn write8(&mut self, address: u32, value: u8) -> Result<(), BusError>;

    /// Writes a little-endian half-word.
    ///
    /// # Errors
    ///
    /// Returns a [`BusError`] when the adapter cannot complete the write.
    fn write16(&mut self, address: u32, value: u16) -> Result<(), BusError>;

    /// Writes a little-endian word.
    ///
    /// # Errors
    ///
    /// Returns a [`BusError`] when the adapter cannot complete the write.
    fn write32(&mut self, address: u32, value: u32) -> Result<(), BusError>;

    /// Handles `SWI`; `comment` is the raw immediate field of the instruction.
    ///
    /// Returns the cycle cost of the whole software interrupt. The default
    /// vectors through the architectural exception entry.
    ///
    /// # Errors
    ///
    /// Returns a [`BusError`] when a high-level handler cannot service the call.
    fn software_interrupt(&mut self, regs: &mut Registers, comment: u32) -> Result<u32, BusError> {
        let _ = comment;
        regs.enter_exception(Exception::SoftwareInterrupt);
        Ok(cycle_cost(CycleCostKind::SoftwareInterrupt))
    }

    /// Services an asserted interrupt line while interrupts are enabled.
    ///
    /// The default vectors through the architectural IRQ entry.
    ///
    /// # Errors
    ///
    /// Returns a [`BusError`] when the host-side interrupt controller fails.
    fn interrupt(&mut self, regs: &mut Registers) -> Result<(), BusError> {
        regs.enter_exception(Exception::Interrupt);
        Ok(())
    }
}
