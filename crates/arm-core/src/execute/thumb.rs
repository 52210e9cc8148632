//! Thumb (16-bit) instruction handlers.
//!
//! `R15` reads as the fetch address plus 4 while these run.

use crate::api::{Bus, CpuVariant};
use crate::condition::condition_passes;
use crate::encoding::{ShiftKind, ThumbAluOp, ThumbOp, TransferKind};
use crate::execute::addressing::{shift_by_immediate, shift_by_register, ShifterOperand};
use crate::execute::alu::{add_with_carry, sub_with_carry, AluOutput};
use crate::execute::transfer::{
    load_into, read_half_rotated, read_signed_byte, read_signed_half, read_word_rotated,
    run_block_transfer, BlockTransfer,
};
use crate::fault::{CoreError, InstructionSet};
use crate::state::{Registers, PSR_C, PSR_T, REG_LR, REG_PC, REG_SP};
use crate::timing::{cycle_cost, multiply_cycles, CycleCostKind};

const fn low(instr: u16, shift: u32) -> usize {
    ((instr >> shift) & 7) as usize
}

const fn imm8(instr: u16) -> u32 {
    (instr & 0xFF) as u32
}

/// Runs the handler selected for `instr`.
pub fn execute_thumb(
    op: ThumbOp,
    regs: &mut Registers,
    bus: &mut dyn Bus,
    instr: u16,
    variant: CpuVariant,
) -> Result<u32, CoreError> {
    match op {
        ThumbOp::ShiftImmediate(kind) => Ok(shift_immediate(regs, instr, kind)),
        ThumbOp::AddRegister => {
            let rhs = regs.reg(low(instr, 6));
            Ok(add_sub(regs, instr, rhs, false))
        }
        ThumbOp::SubtractRegister => {
            let rhs = regs.reg(low(instr, 6));
            Ok(add_sub(regs, instr, rhs, true))
        }
        ThumbOp::AddImmediate3 => Ok(add_sub(regs, instr, low(instr, 6) as u32, false)),
        ThumbOp::SubtractImmediate3 => Ok(add_sub(regs, instr, low(instr, 6) as u32, true)),
        ThumbOp::MoveImmediate => {
            let value = imm8(instr);
            regs.set_reg(low(instr, 8), value);
            regs.set_nz(value);
            Ok(cycle_cost(CycleCostKind::DataProcessing))
        }
        ThumbOp::CompareImmediate => {
            let out = sub_with_carry(regs.reg(low(instr, 8)), imm8(instr), true);
            regs.set_nzcv(out.value, out.carry, out.overflow);
            Ok(cycle_cost(CycleCostKind::DataProcessing))
        }
        ThumbOp::AddImmediate8 => Ok(arithmetic_immediate8(regs, instr, false)),
        ThumbOp::SubtractImmediate8 => Ok(arithmetic_immediate8(regs, instr, true)),
        ThumbOp::Alu(alu) => Ok(alu_operation(regs, instr, alu)),
        ThumbOp::HighAdd => {
            let rd = high_destination(instr);
            let value = regs.reg(rd).wrapping_add(regs.reg(high_source(instr)));
            Ok(write_high(regs, rd, value))
        }
        ThumbOp::HighCompare => {
            let out = sub_with_carry(
                regs.reg(high_destination(instr)),
                regs.reg(high_source(instr)),
                true,
            );
            regs.set_nzcv(out.value, out.carry, out.overflow);
            Ok(cycle_cost(CycleCostKind::DataProcessing))
        }
        ThumbOp::HighMove => {
            let value = regs.reg(high_source(instr));
            Ok(write_high(regs, high_destination(instr), value))
        }
        ThumbOp::BranchExchange => Ok(branch_exchange(regs, instr, false)),
        ThumbOp::BranchLinkExchange => Ok(branch_exchange(regs, instr, true)),
        ThumbOp::LoadPcRelative => {
            let address = (regs.pc() & !3).wrapping_add(imm8(instr) * 4);
            let value = read_word_rotated(bus, address)?;
            Ok(load_into(regs, low(instr, 8), value, variant))
        }
        ThumbOp::TransferRegister(kind) => {
            let address = regs
                .reg(low(instr, 3))
                .wrapping_add(regs.reg(low(instr, 6)));
            single_transfer(regs, bus, kind, address, low(instr, 0), variant)
        }
        ThumbOp::TransferImmediate(kind) => {
            let offset = u32::from((instr >> 6) & 0x1F) * kind.immediate_scale();
            let address = regs.reg(low(instr, 3)).wrapping_add(offset);
            single_transfer(regs, bus, kind, address, low(instr, 0), variant)
        }
        ThumbOp::StoreSpRelative => {
            let address = regs.reg(REG_SP).wrapping_add(imm8(instr) * 4);
            single_transfer(regs, bus, TransferKind::StoreWord, address, low(instr, 8), variant)
        }
        ThumbOp::LoadSpRelative => {
            let address = regs.reg(REG_SP).wrapping_add(imm8(instr) * 4);
            single_transfer(regs, bus, TransferKind::LoadWord, address, low(instr, 8), variant)
        }
        ThumbOp::AddressFromPc => {
            let value = (regs.pc() & !3).wrapping_add(imm8(instr) * 4);
            regs.set_reg(low(instr, 8), value);
            Ok(cycle_cost(CycleCostKind::DataProcessing))
        }
        ThumbOp::AddressFromSp => {
            let value = regs.reg(REG_SP).wrapping_add(imm8(instr) * 4);
            regs.set_reg(low(instr, 8), value);
            Ok(cycle_cost(CycleCostKind::DataProcessing))
        }
        ThumbOp::AdjustSp => {
            let offset = u32::from(instr & 0x7F) * 4;
            let sp = regs.reg(REG_SP);
            let value = if instr & 0x80 != 0 {
                sp.wrapping_sub(offset)
            } else {
                sp.wrapping_add(offset)
            };
            regs.set_reg(REG_SP, value);
            Ok(cycle_cost(CycleCostKind::DataProcessing))
        }
        ThumbOp::Push => {
            let extra = if instr & 0x100 != 0 { 1 << REG_LR } else { 0 };
            let request = block(REG_SP, (instr & 0xFF) | extra, false, false);
            run_block_transfer(regs, bus, request, variant)
        }
        ThumbOp::Pop => {
            let extra = if instr & 0x100 != 0 { 1 << REG_PC } else { 0 };
            let request = block(REG_SP, (instr & 0xFF) | extra, true, true);
            run_block_transfer(regs, bus, request, variant)
        }
        ThumbOp::StoreMultiple => {
            let request = block(low(instr, 8), instr & 0xFF, true, false);
            run_block_transfer(regs, bus, request, variant)
        }
        ThumbOp::LoadMultiple => {
            let request = block(low(instr, 8), instr & 0xFF, true, true);
            run_block_transfer(regs, bus, request, variant)
        }
        ThumbOp::ConditionalBranch => {
            if !condition_passes(((instr >> 8) & 0xF) as u8, regs.cpsr())? {
                return Ok(cycle_cost(CycleCostKind::ConditionFailed));
            }
            let offset = (i32::from(instr as u8 as i8) << 1) as u32;
            regs.set_pc(regs.pc().wrapping_add(offset));
            Ok(cycle_cost(CycleCostKind::Branch))
        }
        ThumbOp::SoftwareInterrupt => bus
            .software_interrupt(regs, imm8(instr))
            .map_err(CoreError::from),
        ThumbOp::Branch => {
            let offset = ((u32::from(instr & 0x7FF) << 21) as i32 >> 20) as u32;
            regs.set_pc(regs.pc().wrapping_add(offset));
            Ok(cycle_cost(CycleCostKind::Branch))
        }
        ThumbOp::LongBranchPrefix => {
            let offset = ((u32::from(instr & 0x7FF) << 21) as i32 >> 9) as u32;
            regs.set_reg(REG_LR, regs.pc().wrapping_add(offset));
            Ok(cycle_cost(CycleCostKind::LongBranchPrefix))
        }
        ThumbOp::LongBranchSuffix => {
            let target = long_branch_target(regs, instr);
            regs.set_reg(REG_LR, regs.next_pc() | 1);
            regs.set_pc(target);
            Ok(cycle_cost(CycleCostKind::Branch))
        }
        ThumbOp::LongBranchExchangeSuffix => {
            let target = long_branch_target(regs, instr) & !3;
            regs.set_reg(REG_LR, regs.next_pc() | 1);
            regs.set_flag(PSR_T, false);
            regs.set_pc(target);
            Ok(cycle_cost(CycleCostKind::Branch))
        }
        ThumbOp::Unknown => {
            let address = regs.pc().wrapping_sub(4);
            tracing::error!(raw = instr, address, "unknown thumb instruction");
            Err(CoreError::UnknownInstruction {
                set: InstructionSet::Thumb,
                raw: u32::from(instr),
                address,
            })
        }
    }
}

fn set_shifted(regs: &mut Registers, rd: usize, shifted: ShifterOperand) {
    regs.set_reg(rd, shifted.value);
    regs.set_nz(shifted.value);
    regs.set_flag(PSR_C, shifted.carry);
}

fn shift_immediate(regs: &mut Registers, instr: u16, kind: ShiftKind) -> u32 {
    let amount = u32::from((instr >> 6) & 0x1F);
    let shifted = shift_by_immediate(kind, regs.reg(low(instr, 3)), amount, regs.flag(PSR_C));
    set_shifted(regs, low(instr, 0), shifted);
    cycle_cost(CycleCostKind::DataProcessing)
}

fn add_sub(regs: &mut Registers, instr: u16, rhs: u32, subtract: bool) -> u32 {
    let lhs = regs.reg(low(instr, 3));
    let out = if subtract {
        sub_with_carry(lhs, rhs, true)
    } else {
        add_with_carry(lhs, rhs, false)
    };
    regs.set_reg(low(instr, 0), out.value);
    regs.set_nzcv(out.value, out.carry, out.overflow);
    cycle_cost(CycleCostKind::DataProcessing)
}

fn arithmetic_immediate8(regs: &mut Registers, instr: u16, subtract: bool) -> u32 {
    let rd = low(instr, 8);
    let lhs = regs.reg(rd);
    let out = if subtract {
        sub_with_carry(lhs, imm8(instr), true)
    } else {
        add_with_carry(lhs, imm8(instr), false)
    };
    regs.set_reg(rd, out.value);
    regs.set_nzcv(out.value, out.carry, out.overflow);
    cycle_cost(CycleCostKind::DataProcessing)
}

fn alu_operation(regs: &mut Registers, instr: u16, op: ThumbAluOp) -> u32 {
    let rd = low(instr, 0);
    let lhs = regs.reg(rd);
    let rhs = regs.reg(low(instr, 3));
    let carry_in = regs.flag(PSR_C);
    let cycles = cycle_cost(CycleCostKind::DataProcessing);

    let register_shift = |kind| shift_by_register(kind, lhs, rhs, carry_in);
    let arithmetic = |out: AluOutput, regs: &mut Registers| {
        regs.set_nzcv(out.value, out.carry, out.overflow);
        out.value
    };

    match op {
        ThumbAluOp::Lsl | ThumbAluOp::Lsr | ThumbAluOp::Asr | ThumbAluOp::Ror => {
            let kind = match op {
                ThumbAluOp::Lsl => ShiftKind::Lsl,
                ThumbAluOp::Lsr => ShiftKind::Lsr,
                ThumbAluOp::Asr => ShiftKind::Asr,
                _ => ShiftKind::Ror,
            };
            set_shifted(regs, rd, register_shift(kind));
            cycles + cycle_cost(CycleCostKind::RegisterShift)
        }
        ThumbAluOp::Tst => {
            regs.set_nz(lhs & rhs);
            cycles
        }
        ThumbAluOp::Cmp => {
            arithmetic(sub_with_carry(lhs, rhs, true), regs);
            cycles
        }
        ThumbAluOp::Cmn => {
            arithmetic(add_with_carry(lhs, rhs, false), regs);
            cycles
        }
        ThumbAluOp::Adc => {
            let value = arithmetic(add_with_carry(lhs, rhs, carry_in), regs);
            regs.set_reg(rd, value);
            cycles
        }
        ThumbAluOp::Sbc => {
            let value = arithmetic(sub_with_carry(lhs, rhs, carry_in), regs);
            regs.set_reg(rd, value);
            cycles
        }
        ThumbAluOp::Neg => {
            let value = arithmetic(sub_with_carry(0, rhs, true), regs);
            regs.set_reg(rd, value);
            cycles
        }
        ThumbAluOp::Mul => {
            let value = lhs.wrapping_mul(rhs);
            regs.set_reg(rd, value);
            regs.set_nz(value);
            multiply_cycles(CycleCostKind::Multiply, lhs, rhs, true)
        }
        ThumbAluOp::And | ThumbAluOp::Eor | ThumbAluOp::Orr | ThumbAluOp::Bic | ThumbAluOp::Mvn => {
            let value = match op {
                ThumbAluOp::And => lhs & rhs,
                ThumbAluOp::Eor => lhs ^ rhs,
                ThumbAluOp::Orr => lhs | rhs,
                ThumbAluOp::Bic => lhs & !rhs,
                _ => !rhs,
            };
            regs.set_reg(rd, value);
            regs.set_nz(value);
            cycles
        }
    }
}

const fn high_destination(instr: u16) -> usize {
    ((instr & 7) | ((instr >> 4) & 8)) as usize
}

const fn high_source(instr: u16) -> usize {
    ((instr >> 3) & 0xF) as usize
}

fn write_high(regs: &mut Registers, rd: usize, value: u32) -> u32 {
    regs.set_reg(rd, value);
    if rd == REG_PC {
        cycle_cost(CycleCostKind::DataProcessing) + cycle_cost(CycleCostKind::PipelineRefill)
    } else {
        cycle_cost(CycleCostKind::DataProcessing)
    }
}

fn branch_exchange(regs: &mut Registers, instr: u16, link: bool) -> u32 {
    let target = regs.reg(high_source(instr));
    if link {
        regs.set_reg(REG_LR, regs.next_pc() | 1);
    }
    regs.set_flag(PSR_T, target & 1 != 0);
    regs.set_pc(target);
    cycle_cost(CycleCostKind::Branch)
}

fn long_branch_target(regs: &Registers, instr: u16) -> u32 {
    regs.reg(REG_LR)
        .wrapping_add(u32::from(instr & 0x7FF) << 1)
}

const fn block(base: usize, list: u16, up: bool, load: bool) -> BlockTransfer {
    BlockTransfer {
        base,
        list,
        up,
        pre: !up,
        writeback: true,
        load,
        psr: false,
    }
}

fn single_transfer(
    regs: &mut Registers,
    bus: &mut dyn Bus,
    kind: TransferKind,
    address: u32,
    rd: usize,
    variant: CpuVariant,
) -> Result<u32, CoreError> {
    let value = match kind {
        TransferKind::StoreWord => {
            bus.write32(address & !3, regs.reg(rd))?;
            return Ok(cycle_cost(CycleCostKind::Store));
        }
        TransferKind::StoreHalf => {
            bus.write16(address & !1, regs.reg(rd) as u16)?;
            return Ok(cycle_cost(CycleCostKind::Store));
        }
        TransferKind::StoreByte => {
            bus.write8(address, regs.reg(rd) as u8)?;
            return Ok(cycle_cost(CycleCostKind::Store));
        }
        TransferKind::LoadWord => read_word_rotated(bus, address)?,
        TransferKind::LoadHalf => read_half_rotated(bus, address)?,
        TransferKind::LoadByte => u32::from(bus.read8(address)?),
        TransferKind::LoadSignedByte => read_signed_byte(bus, address)?,
        TransferKind::LoadSignedHalf => read_signed_half(bus, address)?,
    };
    Ok(load_into(regs, rd, value, variant))
}
