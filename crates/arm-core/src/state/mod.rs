//! Architectural CPU state model primitives.

/// Register file, status registers and mode banking.
pub mod registers;

pub use registers::{
    Exception, Mode, Registers, GENERAL_REGISTER_COUNT, PSR_C, PSR_F, PSR_I, PSR_MODE_MASK,
    PSR_MODE_REQUIRED, PSR_N, PSR_Q, PSR_T, PSR_V, PSR_Z, REG_LR, REG_PC, REG_SP,
};
