//! Operand and address resolution for the four ARM addressing modes.
//!
//! Resolvers only compute values; handlers decide whether and when a
//! write-back takes effect.

use crate::encoding::ShiftKind;
use crate::state::{Registers, PSR_C, REG_PC};

/// Span covered by a block transfer with an empty register list.
pub const EMPTY_LIST_SPAN: u32 = 0x40;

const BIT_IMMEDIATE: u32 = 1 << 25;
const BIT_PRE_INDEX: u32 = 1 << 24;
const BIT_UP: u32 = 1 << 23;
const BIT_HALFWORD_IMMEDIATE: u32 = 1 << 22;
const BIT_WRITEBACK: u32 = 1 << 21;
const BIT_REGISTER_SHIFT: u32 = 1 << 4;

/// Second operand of a data-processing instruction and the shifter carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShifterOperand {
    /// Operand value.
    pub value: u32,
    /// Shifter carry out (the current `C` when the shifter leaves it alone).
    pub carry: bool,
}

/// Effective address of a single transfer and the value to write back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferAddress {
    /// Address accessed.
    pub address: u32,
    /// Base register value after the access, when the base is updated.
    pub writeback: Option<u32>,
}

/// Address range of a block transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRange {
    /// Address of the lowest-numbered register.
    pub start: u32,
    /// Address of the highest-numbered register.
    pub end: u32,
    /// Base register value after write-back.
    pub writeback: u32,
}

/// Shift by a 5-bit immediate, where an amount of zero encodes the special
/// forms (`LSR #32`, `ASR #32`, `RRX`).
#[must_use]
pub const fn shift_by_immediate(
    kind: ShiftKind,
    value: u32,
    amount: u32,
    carry_in: bool,
) -> ShifterOperand {
    let amount = amount & 0x1F;
    match (kind, amount) {
        (ShiftKind::Lsl, 0) => ShifterOperand {
            value,
            carry: carry_in,
        },
        (ShiftKind::Lsl, _) => ShifterOperand {
            value: value << amount,
            carry: (value >> (32 - amount)) & 1 != 0,
        },
        (ShiftKind::Lsr, 0) => ShifterOperand {
            value: 0,
            carry: value >> 31 != 0,
        },
        (ShiftKind::Asr, 0) => ShifterOperand {
            value: ((value as i32) >> 31) as u32,
            carry: value >> 31 != 0,
        },
        (ShiftKind::Ror, 0) => ShifterOperand {
            value: ((carry_in as u32) << 31) | (value >> 1),
            carry: value & 1 != 0,
        },
        (ShiftKind::Lsr, _) => ShifterOperand {
            value: value >> amount,
            carry: (value >> (amount - 1)) & 1 != 0,
        },
        (ShiftKind::Asr, _) => ShifterOperand {
            value: ((value as i32) >> amount) as u32,
            carry: (value >> (amount - 1)) & 1 != 0,
        },
        (ShiftKind::Ror, _) => ShifterOperand {
            value: value.rotate_right(amount),
            carry: (value >> (amount - 1)) & 1 != 0,
        },
    }
}

/// Shift by the bottom byte of a register; amounts of 32 and above saturate.
#[must_use]
pub const fn shift_by_register(
    kind: ShiftKind,
    value: u32,
    amount: u32,
    carry_in: bool,
) -> ShifterOperand {
    let amount = amount & 0xFF;
    if amount == 0 {
        return ShifterOperand {
            value,
            carry: carry_in,
        };
    }
    match kind {
        ShiftKind::Lsl => match amount {
            1..=31 => ShifterOperand {
                value: value << amount,
                carry: (value >> (32 - amount)) & 1 != 0,
            },
            32 => ShifterOperand {
                value: 0,
                carry: value & 1 != 0,
            },
            _ => ShifterOperand {
                value: 0,
                carry: false,
            },
        },
        ShiftKind::Lsr => match amount {
            1..=31 => ShifterOperand {
                value: value >> amount,
                carry: (value >> (amount - 1)) & 1 != 0,
            },
            32 => ShifterOperand {
                value: 0,
                carry: value >> 31 != 0,
            },
            _ => ShifterOperand {
                value: 0,
                carry: false,
            },
        },
        ShiftKind::Asr => {
            if amount < 32 {
                ShifterOperand {
                    value: ((value as i32) >> amount) as u32,
                    carry: (value >> (amount - 1)) & 1 != 0,
                }
            } else {
                ShifterOperand {
                    value: ((value as i32) >> 31) as u32,
                    carry: value >> 31 != 0,
                }
            }
        }
        ShiftKind::Ror => {
            let rotation = amount & 0x1F;
            if rotation == 0 {
                ShifterOperand {
                    value,
                    carry: value >> 31 != 0,
                }
            } else {
                ShifterOperand {
                    value: value.rotate_right(rotation),
                    carry: (value >> (rotation - 1)) & 1 != 0,
                }
            }
        }
    }
}

/// Reads `Rn`/`Rm` as an operand. With a register-specified shift the extra
/// internal cycle makes `R15` read one word further ahead.
#[must_use]
pub const fn read_operand(regs: &Registers, index: usize, register_shift: bool) -> u32 {
    if index == REG_PC && register_shift {
        regs.pc().wrapping_add(4)
    } else {
        regs.reg(index)
    }
}

/// Resolves the data-processing second operand (mode 1).
#[must_use]
pub const fn shifter_operand(regs: &Registers, instr: u32) -> ShifterOperand {
    let carry_in = regs.flag(PSR_C);

    if instr & BIT_IMMEDIATE != 0 {
        let immediate = instr & 0xFF;
        let rotation = ((instr >> 8) & 0xF) * 2;
        if rotation == 0 {
            return ShifterOperand {
                value: immediate,
                carry: carry_in,
            };
        }
        let value = immediate.rotate_right(rotation);
        return ShifterOperand {
            value,
            carry: value >> 31 != 0,
        };
    }

    let kind = ShiftKind::from_bits(instr >> 5);
    let rm = (instr & 0xF) as usize;
    if instr & BIT_REGISTER_SHIFT != 0 {
        let rs = ((instr >> 8) & 0xF) as usize;
        let value = read_operand(regs, rm, true);
        shift_by_register(kind, value, regs.reg(rs), carry_in)
    } else {
        shift_by_immediate(kind, regs.reg(rm), (instr >> 7) & 0x1F, carry_in)
    }
}

const fn index_address(base: u32, offset: u32, instr: u32) -> TransferAddress {
    let offset_base = if instr & BIT_UP != 0 {
        base.wrapping_add(offset)
    } else {
        base.wrapping_sub(offset)
    };

    if instr & BIT_PRE_INDEX == 0 {
        return TransferAddress {
            address: base,
            writeback: Some(offset_base),
        };
    }
    TransferAddress {
        address: offset_base,
        writeback: if instr & BIT_WRITEBACK != 0 {
            Some(offset_base)
        } else {
            None
        },
    }
}

/// Resolves a word/unsigned-byte transfer address (mode 2).
///
/// Post-indexed forms always write back.
#[must_use]
pub const fn single_transfer_address(regs: &Registers, instr: u32) -> TransferAddress {
    let base = regs.reg(((instr >> 16) & 0xF) as usize);
    let offset = if instr & BIT_IMMEDIATE == 0 {
        instr & 0xFFF
    } else {
        let rm = regs.reg((instr & 0xF) as usize);
        let kind = ShiftKind::from_bits(instr >> 5);
        shift_by_immediate(kind, rm, (instr >> 7) & 0x1F, regs.flag(PSR_C)).value
    };
    index_address(base, offset, instr)
}

/// Resolves a half-word/signed-byte transfer address (mode 3).
#[must_use]
pub const fn halfword_transfer_address(regs: &Registers, instr: u32) -> TransferAddress {
    let base = regs.reg(((instr >> 16) & 0xF) as usize);
    let offset = if instr & BIT_HALFWORD_IMMEDIATE != 0 {
        ((instr >> 4) & 0xF0) | (instr & 0xF)
    } else {
        regs.reg((instr & 0xF) as usize)
    };
    index_address(base, offset, instr)
}

/// Resolves the address range of a block transfer (mode 4).
///
/// Registers are always transferred lowest-numbered first at the lowest
/// address. An empty list transfers one register but moves the base by
/// [`EMPTY_LIST_SPAN`].
#[must_use]
pub const fn block_transfer_range(base: u32, list: u16, up: bool, pre: bool) -> BlockRange {
    let slots = if list == 0 { 1 } else { list.count_ones() };
    let span = if list == 0 {
        EMPTY_LIST_SPAN
    } else {
        slots * 4
    };

    let (start, writeback) = match (up, pre) {
        (true, false) => (base, base.wrapping_add(span)),
        (true, true) => (base.wrapping_add(4), base.wrapping_add(span)),
        (false, false) => (base.wrapping_sub(span).wrapping_add(4), base.wrapping_sub(span)),
        (false, true) => (base.wrapping_sub(span), base.wrapping_sub(span)),
    };

    BlockRange {
        start,
        end: start.wrapping_add((slots - 1) * 4),
        writeback,
    }
}
