//! ARM (32-bit) instruction handlers.
//!
//! Handlers run after the condition check, with `R15` holding the fetch
//! address plus 8. Each returns the cycles consumed.

use crate::api::{Bus, CpuVariant};
use crate::encoding::{AluOp, ArmOp};
use crate::execute::addressing::{
    halfword_transfer_address, read_operand, shifter_operand, single_transfer_address,
    TransferAddress,
};
use crate::execute::alu::{add_with_carry, saturate, sub_with_carry, AluOutput};
use crate::execute::transfer::{
    load_into, read_half_rotated, read_signed_byte, read_signed_half, read_word_rotated,
    run_block_transfer, store_operand, BlockTransfer,
};
use crate::fault::{CoreError, InstructionSet};
use crate::state::{Mode, Registers, PSR_C, PSR_Q, PSR_T, PSR_V, REG_LR, REG_PC};
use crate::timing::{cycle_cost, multiply_cycles, CycleCostKind};

const BIT_SET_FLAGS: u32 = 1 << 20;
const BIT_LOAD: u32 = 1 << 20;
const BIT_WRITEBACK: u32 = 1 << 21;
const BIT_ACCUMULATE: u32 = 1 << 21;
const BIT_BYTE: u32 = 1 << 22;
const BIT_SIGNED: u32 = 1 << 22;
const BIT_SPSR: u32 = 1 << 22;
const BIT_PSR_FORCE_USER: u32 = 1 << 22;
const BIT_UP: u32 = 1 << 23;
const BIT_PRE_INDEX: u32 = 1 << 24;
const BIT_IMMEDIATE: u32 = 1 << 25;

const fn field(instr: u32, shift: u32) -> usize {
    ((instr >> shift) & 0xF) as usize
}

/// Runs the handler selected for `instr`.
pub fn execute_arm(
    op: ArmOp,
    regs: &mut Registers,
    bus: &mut dyn Bus,
    instr: u32,
    variant: CpuVariant,
) -> Result<u32, CoreError> {
    match op {
        ArmOp::DataProcessing(alu) => Ok(data_processing(alu, regs, instr)),
        ArmOp::Multiply => Ok(multiply(regs, instr)),
        ArmOp::MultiplyLong => Ok(multiply_long(regs, instr)),
        ArmOp::Swap => swap(regs, bus, instr),
        ArmOp::HalfwordTransfer => halfword_transfer(regs, bus, instr, variant),
        ArmOp::SingleTransfer => single_transfer(regs, bus, instr, variant),
        ArmOp::BlockTransfer => block_transfer(regs, bus, instr, variant),
        ArmOp::Branch => Ok(branch(regs, instr, false)),
        ArmOp::BranchLink => Ok(branch(regs, instr, true)),
        ArmOp::BranchExchange => Ok(branch_exchange(regs, instr, false)),
        ArmOp::BranchLinkExchange => Ok(branch_exchange(regs, instr, true)),
        ArmOp::StatusRead => Ok(status_read(regs, instr)),
        ArmOp::StatusWrite => Ok(status_write(regs, instr)),
        ArmOp::SoftwareInterrupt => bus
            .software_interrupt(regs, instr & 0x00FF_FFFF)
            .map_err(CoreError::from),
        ArmOp::CountLeadingZeros => Ok(count_leading_zeros(regs, instr)),
        ArmOp::SaturatingArithmetic => Ok(saturating_arithmetic(regs, instr)),
        ArmOp::Unknown => {
            let address = regs.pc().wrapping_sub(8);
            tracing::error!(raw = instr, address, "unknown arm instruction");
            Err(CoreError::UnknownInstruction {
                set: InstructionSet::Arm,
                raw: instr,
                address,
            })
        }
    }
}

fn logical(value: u32, carry: bool, regs: &Registers) -> AluOutput {
    AluOutput {
        value,
        carry,
        overflow: regs.flag(PSR_V),
    }
}

fn data_processing(op: AluOp, regs: &mut Registers, instr: u32) -> u32 {
    let set_flags = instr & BIT_SET_FLAGS != 0;
    let register_shift = instr & BIT_IMMEDIATE == 0 && instr & 0x10 != 0;
    let rd = field(instr, 12);
    let lhs = read_operand(regs, field(instr, 16), register_shift);
    let rhs = shifter_operand(regs, instr);
    let carry_in = regs.flag(PSR_C);

    let out = match op {
        AluOp::And | AluOp::Tst => logical(lhs & rhs.value, rhs.carry, regs),
        AluOp::Eor | AluOp::Teq => logical(lhs ^ rhs.value, rhs.carry, regs),
        AluOp::Orr => logical(lhs | rhs.value, rhs.carry, regs),
        AluOp::Bic => logical(lhs & !rhs.value, rhs.carry, regs),
        AluOp::Mov => logical(rhs.value, rhs.carry, regs),
        AluOp::Mvn => logical(!rhs.value, rhs.carry, regs),
        AluOp::Sub | AluOp::Cmp => sub_with_carry(lhs, rhs.value, true),
        AluOp::Rsb => sub_with_carry(rhs.value, lhs, true),
        AluOp::Add | AluOp::Cmn => add_with_carry(lhs, rhs.value, false),
        AluOp::Adc => add_with_carry(lhs, rhs.value, carry_in),
        AluOp::Sbc => sub_with_carry(lhs, rhs.value, carry_in),
        AluOp::Rsc => sub_with_carry(rhs.value, lhs, carry_in),
    };

    let mut cycles = cycle_cost(CycleCostKind::DataProcessing);
    if register_shift {
        cycles += cycle_cost(CycleCostKind::RegisterShift);
    }

    if op.is_compare() {
        if set_flags {
            if rd == REG_PC {
                regs.restore_cpsr();
            } else {
                regs.set_nzcv(out.value, out.carry, out.overflow);
            }
        }
        return cycles;
    }

    if rd == REG_PC {
        if set_flags {
            regs.restore_cpsr();
        }
        regs.set_pc(out.value);
        return cycles + cycle_cost(CycleCostKind::PipelineRefill);
    }

    regs.set_reg(rd, out.value);
    if set_flags {
        regs.set_nzcv(out.value, out.carry, out.overflow);
    }
    cycles
}

fn multiply(regs: &mut Registers, instr: u32) -> u32 {
    let multiplier = regs.reg(field(instr, 8));
    let multiplicand = regs.reg(field(instr, 0));
    let mut result = multiplicand.wrapping_mul(multiplier);
    let accumulate = instr & BIT_ACCUMULATE != 0;
    if accumulate {
        result = result.wrapping_add(regs.reg(field(instr, 12)));
    }

    regs.set_reg(field(instr, 16), result);
    if instr & BIT_SET_FLAGS != 0 {
        regs.set_nz(result);
    }

    let base = if accumulate {
        CycleCostKind::MultiplyAccumulate
    } else {
        CycleCostKind::Multiply
    };
    multiply_cycles(base, multiplicand, multiplier, true)
}

fn multiply_long(regs: &mut Registers, instr: u32) -> u32 {
    let signed = instr & BIT_SIGNED != 0;
    let accumulate = instr & BIT_ACCUMULATE != 0;
    let rd_hi = field(instr, 16);
    let rd_lo = field(instr, 12);
    let multiplier = regs.reg(field(instr, 8));
    let multiplicand = regs.reg(field(instr, 0));

    let mut product = if signed {
        (i64::from(multiplicand as i32) * i64::from(multiplier as i32)) as u64
    } else {
        u64::from(multiplicand) * u64::from(multiplier)
    };
    if accumulate {
        let existing = (u64::from(regs.reg(rd_hi)) << 32) | u64::from(regs.reg(rd_lo));
        product = product.wrapping_add(existing);
    }

    regs.set_reg(rd_lo, product as u32);
    regs.set_reg(rd_hi, (product >> 32) as u32);
    if instr & BIT_SET_FLAGS != 0 {
        regs.set_nz((product >> 32) as u32 | u32::from(product as u32 != 0));
    }

    let base = if accumulate {
        CycleCostKind::MultiplyAccumulateLong
    } else {
        CycleCostKind::MultiplyLong
    };
    multiply_cycles(base, multiplicand, multiplier, signed)
}

fn swap(regs: &mut Registers, bus: &mut dyn Bus, instr: u32) -> Result<u32, CoreError> {
    let address = regs.reg(field(instr, 16));
    let source = regs.reg(field(instr, 0));

    let old = if instr & BIT_BYTE != 0 {
        let old = u32::from(bus.read8(address)?);
        bus.write8(address, source as u8)?;
        old
    } else {
        let old = read_word_rotated(bus, address)?;
        bus.write32(address & !3, source)?;
        old
    };

    regs.set_reg(field(instr, 12), old);
    Ok(cycle_cost(CycleCostKind::Swap))
}

fn apply_writeback(regs: &mut Registers, rn: usize, writeback: Option<u32>) {
    if let Some(base) = writeback {
        regs.set_reg(rn, base);
    }
}

fn single_transfer(
    regs: &mut Registers,
    bus: &mut dyn Bus,
    instr: u32,
    variant: CpuVariant,
) -> Result<u32, CoreError> {
    let rn = field(instr, 16);
    let rd = field(instr, 12);
    let byte = instr & BIT_BYTE != 0;
    let TransferAddress { address, writeback } = single_transfer_address(regs, instr);

    if instr & BIT_LOAD != 0 {
        let value = if byte {
            u32::from(bus.read8(address)?)
        } else {
            read_word_rotated(bus, address)?
        };
        apply_writeback(regs, rn, writeback);
        return Ok(load_into(regs, rd, value, variant));
    }

    let value = store_operand(regs, rd);
    if byte {
        bus.write8(address, value as u8)?;
    } else {
        bus.write32(address & !3, value)?;
    }
    apply_writeback(regs, rn, writeback);
    Ok(cycle_cost(CycleCostKind::Store))
}

fn halfword_transfer(
    regs: &mut Registers,
    bus: &mut dyn Bus,
    instr: u32,
    variant: CpuVariant,
) -> Result<u32, CoreError> {
    let rn = field(instr, 16);
    let rd = field(instr, 12);
    let TransferAddress { address, writeback } = halfword_transfer_address(regs, instr);

    if instr & BIT_LOAD != 0 {
        let value = match (instr >> 5) & 3 {
            2 => read_signed_byte(bus, address)?,
            3 => read_signed_half(bus, address)?,
            _ => read_half_rotated(bus, address)?,
        };
        apply_writeback(regs, rn, writeback);
        return Ok(load_into(regs, rd, value, variant));
    }

    let value = store_operand(regs, rd);
    bus.write16(address & !1, value as u16)?;
    apply_writeback(regs, rn, writeback);
    Ok(cycle_cost(CycleCostKind::Store))
}

fn block_transfer(
    regs: &mut Registers,
    bus: &mut dyn Bus,
    instr: u32,
    variant: CpuVariant,
) -> Result<u32, CoreError> {
    let request = BlockTransfer {
        base: field(instr, 16),
        list: instr as u16,
        up: instr & BIT_UP != 0,
        pre: instr & BIT_PRE_INDEX != 0,
        writeback: instr & BIT_WRITEBACK != 0,
        load: instr & BIT_LOAD != 0,
        psr: instr & BIT_PSR_FORCE_USER != 0,
    };
    run_block_transfer(regs, bus, request, variant)
}

fn branch(regs: &mut Registers, instr: u32, link: bool) -> u32 {
    let offset = (((instr << 8) as i32) >> 6) as u32;
    if link {
        regs.set_reg(REG_LR, regs.next_pc());
    }
    regs.set_pc(regs.pc().wrapping_add(offset));
    cycle_cost(CycleCostKind::Branch)
}

fn branch_exchange(regs: &mut Registers, instr: u32, link: bool) -> u32 {
    let target = regs.reg(field(instr, 0));
    if link {
        regs.set_reg(REG_LR, regs.next_pc());
    }
    regs.set_flag(PSR_T, target & 1 != 0);
    regs.set_pc(target);
    cycle_cost(CycleCostKind::Branch)
}

fn status_read(regs: &mut Registers, instr: u32) -> u32 {
    let value = if instr & BIT_SPSR != 0 && regs.has_spsr() {
        regs.spsr()
    } else {
        regs.cpsr()
    };
    regs.set_reg(field(instr, 12), value);
    cycle_cost(CycleCostKind::StatusTransfer)
}

fn status_write(regs: &mut Registers, instr: u32) -> u32 {
    let operand = if instr & BIT_IMMEDIATE != 0 {
        (instr & 0xFF).rotate_right(((instr >> 8) & 0xF) * 2)
    } else {
        regs.reg(field(instr, 0))
    };

    let mut mask = 0;
    for (lane, bits) in [0x0000_00FF, 0x0000_FF00, 0x00FF_0000, 0xFF00_0000]
        .into_iter()
        .enumerate()
    {
        if instr & (1 << (16 + lane)) != 0 {
            mask |= bits;
        }
    }

    if instr & BIT_SPSR != 0 {
        if regs.has_spsr() {
            regs.set_spsr((regs.spsr() & !mask) | (operand & mask));
        } else {
            tracing::warn!(instr, "spsr write without an spsr");
        }
    } else {
        if !regs.mode().is_some_and(Mode::is_privileged) {
            mask &= 0xFF00_0000;
        }
        regs.set_cpsr((regs.cpsr() & !mask) | (operand & mask));
    }
    cycle_cost(CycleCostKind::StatusTransfer)
}

fn count_leading_zeros(regs: &mut Registers, instr: u32) -> u32 {
    let zeros = regs.reg(field(instr, 0)).leading_zeros();
    regs.set_reg(field(instr, 12), zeros);
    cycle_cost(CycleCostKind::CountLeadingZeros)
}

fn saturating_arithmetic(regs: &mut Registers, instr: u32) -> u32 {
    let subtract = instr & (1 << 21) != 0;
    let double = instr & (1 << 22) != 0;
    let rm = i64::from(regs.reg(field(instr, 0)) as i32);
    let mut rn = i64::from(regs.reg(field(instr, 16)) as i32);
    let mut saturated = false;

    if double {
        let (doubled, clamped) = saturate(rn * 2);
        rn = i64::from(doubled);
        saturated |= clamped;
    }
    let (result, clamped) = saturate(if subtract { rm - rn } else { rm + rn });
    saturated |= clamped;

    regs.set_reg(field(instr, 12), result as u32);
    if saturated {
        regs.set_flag(PSR_Q, true);
    }
    cycle_cost(CycleCostKind::SaturatingArithmetic)
}
