//! Condition-code evaluation against `CPSR` flags.

use crate::fault::CoreError;
use crate::state::{PSR_C, PSR_N, PSR_V, PSR_Z};

/// Instruction condition field values (bits 31..28 in ARM state).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Condition {
    /// `Z` set.
    Eq = 0x0,
    /// `Z` clear.
    Ne = 0x1,
    /// `C` set (unsigned higher or same).
    Cs = 0x2,
    /// `C` clear (unsigned lower).
    Cc = 0x3,
    /// `N` set.
    Mi = 0x4,
    /// `N` clear.
    Pl = 0x5,
    /// `V` set.
    Vs = 0x6,
    /// `V` clear.
    Vc = 0x7,
    /// `C` set and `Z` clear.
    Hi = 0x8,
    /// `C` clear or `Z` set.
    Ls = 0x9,
    /// `N == V`.
    Ge = 0xA,
    /// `N != V`.
    Lt = 0xB,
    /// `Z` clear and `N == V`.
    Gt = 0xC,
    /// `Z` set or `N != V`.
    Le = 0xD,
    /// Always.
    Al = 0xE,
    /// Reserved; never executes.
    Nv = 0xF,
}

impl Condition {
    /// Decodes a 4-bit condition field.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidCondition`] for values above `0xF`.
    pub const fn from_bits(bits: u8) -> Result<Self, CoreError> {
        Ok(match bits {
            0x0 => Self::Eq,
            0x1 => Self::Ne,
            0x2 => Self::Cs,
            0x3 => Self::Cc,
            0x4 => Self::Mi,
            0x5 => Self::Pl,
            0x6 => Self::Vs,
            0x7 => Self::Vc,
            0x8 => Self::Hi,
            0x9 => Self::Ls,
            0xA => Self::Ge,
            0xB => Self::Lt,
            0xC => Self::Gt,
            0xD => Self::Le,
            0xE => Self::Al,
            0xF => Self::Nv,
            _ => return Err(CoreError::InvalidCondition(bits)),
        })
    }

    /// Returns true when `cpsr` satisfies this condition.
    #[must_use]
    pub const fn passes(self, cpsr: u32) -> bool {
        let n = cpsr & PSR_N != 0;
        let z = cpsr & PSR_Z != 0;
        let c = cpsr & PSR_C != 0;
        let v = cpsr & PSR_V != 0;

        match self {
            Self::Eq => z,
            Self::Ne => !z,
            Self::Cs => c,
            Self::Cc => !c,
            Self::Mi => n,
            Self::Pl => !n,
            Self::Vs => v,
            Self::Vc => !v,
            Self::Hi => c && !z,
            Self::Ls => !c || z,
            Self::Ge => n == v,
            Self::Lt => n != v,
            Self::Gt => !z && n == v,
            Self::Le => z || n != v,
            Self::Al => true,
            Self::Nv => false,
        }
    }
}

/// Decodes and evaluates a raw condition field in one call.
///
/// # Errors
///
/// Returns [`CoreError::InvalidCondition`] for values above `0xF`.
pub const fn condition_passes(bits: u8, cpsr: u32) -> Result<bool, CoreError> {
    match Condition::from_bits(bits) {
        Ok(condition) => Ok(condition.passes(cpsr)),
        Err(err) => Err(err),
    }
}
