//! Instruction execution: operand resolvers, flag arithmetic and the
//! per-encoding handlers.
//!
//! Handlers mutate the register file directly and report the cycles consumed.
//! A handler that writes `R15` performs the branch itself; the core step never
//! advances the program counter after a handler returns.

#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::cast_lossless
)]

pub mod addressing;
pub mod alu;
mod arm;
mod thumb;
mod transfer;

#[cfg(test)]
pub(crate) mod test_bus;

pub use addressing::{
    block_transfer_range, halfword_transfer_address, shift_by_immediate, shift_by_register,
    shifter_operand, single_transfer_address, BlockRange, ShifterOperand, TransferAddress,
    EMPTY_LIST_SPAN,
};
pub use alu::{add_with_carry, sub_with_carry, AluOutput};
pub use arm::execute_arm;
pub use thumb::execute_thumb;
