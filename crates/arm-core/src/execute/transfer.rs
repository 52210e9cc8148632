//! Bus access helpers shared by the ARM and Thumb load/store handlers.

use crate::api::{Bus, CpuVariant};
use crate::execute::addressing::block_transfer_range;
use crate::fault::CoreError;
use crate::state::{Registers, PSR_T, REG_PC};
use crate::timing::{block_transfer_cycles, cycle_cost, CycleCostKind};

/// Word load; unaligned addresses rotate the aligned word right by the
/// byte offset.
pub fn read_word_rotated(bus: &mut dyn Bus, address: u32) -> Result<u32, CoreError> {
    let word = bus.read32(address & !3)?;
    Ok(word.rotate_right((address & 3) * 8))
}

/// Unsigned half-word load; an odd address rotates the half-word by eight.
pub fn read_half_rotated(bus: &mut dyn Bus, address: u32) -> Result<u32, CoreError> {
    let half = u32::from(bus.read16(address & !1)?);
    Ok(half.rotate_right((address & 1) * 8))
}

/// Signed byte load.
pub fn read_signed_byte(bus: &mut dyn Bus, address: u32) -> Result<u32, CoreError> {
    Ok(i32::from(bus.read8(address)? as i8) as u32)
}

/// Signed half-word load; an odd address loads a signed byte instead.
pub fn read_signed_half(bus: &mut dyn Bus, address: u32) -> Result<u32, CoreError> {
    if address & 1 != 0 {
        return read_signed_byte(bus, address);
    }
    Ok(i32::from(bus.read16(address)? as i16) as u32)
}

/// `R15` as seen by a store: one instruction beyond the usual read value.
pub const fn stored_pc(regs: &Registers) -> u32 {
    let unit = if regs.thumb() { 2 } else { 4 };
    regs.pc().wrapping_add(unit)
}

/// Reads `index` for a store, applying the store-specific `R15` offset.
pub const fn store_operand(regs: &Registers, index: usize) -> u32 {
    if index == REG_PC {
        stored_pc(regs)
    } else {
        regs.reg(index)
    }
}

/// Writes a loaded value into `rd`. Loads into `R15` branch, switching
/// instruction set from bit 0 on variants that interwork on loads.
pub fn load_into(regs: &mut Registers, rd: usize, value: u32, variant: CpuVariant) -> u32 {
    if rd != REG_PC {
        regs.set_reg(rd, value);
        return cycle_cost(CycleCostKind::Load);
    }
    branch_to_loaded(regs, value, variant);
    cycle_cost(CycleCostKind::Load) + cycle_cost(CycleCostKind::PipelineRefill)
}

fn branch_to_loaded(regs: &mut Registers, value: u32, variant: CpuVariant) {
    if variant.loads_interwork() {
        regs.set_flag(PSR_T, value & 1 != 0);
    }
    regs.set_pc(value);
}

/// Parameters of one block transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct BlockTransfer {
    /// Base register index.
    pub base: usize,
    /// Register list, bit `n` selecting `Rn`.
    pub list: u16,
    /// Increment (true) or decrement.
    pub up: bool,
    /// Step the address before (true) or after each transfer.
    pub pre: bool,
    /// Update the base register.
    pub writeback: bool,
    /// Load (true) or store.
    pub load: bool,
    /// `S` bit: User-bank access, or exception return when loading `R15`.
    pub psr: bool,
}

/// Performs a block transfer and returns its cycle cost.
///
/// An empty list transfers `R15` alone and moves the base by 0x40. A store
/// whose base is in the list writes the original base only when the base is
/// the lowest listed register (User-bank stores always write the original).
/// A load whose base is in the list suppresses write-back.
pub fn run_block_transfer(
    regs: &mut Registers,
    bus: &mut dyn Bus,
    request: BlockTransfer,
    variant: CpuVariant,
) -> Result<u32, CoreError> {
    let base_value = regs.reg(request.base);
    let range = block_transfer_range(base_value, request.list, request.up, request.pre);
    let list = if request.list == 0 {
        1 << REG_PC
    } else {
        request.list
    };
    let pc_listed = list & (1 << REG_PC) != 0;
    let count = list.count_ones();

    if request.load {
        let exception_return = request.psr && pc_listed;
        let user_bank = request.psr && !pc_listed;
        let mut address = range.start;
        let mut loaded_pc = None;

        for index in (0..16).filter(|index| list & (1 << index) != 0) {
            let value = bus.read32(address & !3)?;
            address = address.wrapping_add(4);
            if index == REG_PC {
                loaded_pc = Some(value);
            } else if user_bank {
                regs.set_user_reg(index, value);
            } else {
                regs.set_reg(index, value);
            }
        }

        if request.writeback && list & (1 << request.base) == 0 {
            regs.set_reg(request.base, range.writeback);
        }

        if let Some(target) = loaded_pc {
            if exception_return {
                regs.restore_cpsr();
                regs.set_pc(target);
            } else {
                branch_to_loaded(regs, target, variant);
            }
        }
        return Ok(block_transfer_cycles(true, count, loaded_pc.is_some()));
    }

    let user_bank = request.psr;
    let mut address = range.start;
    let mut first = true;
    for index in (0..16).filter(|index| list & (1 << index) != 0) {
        let value = if index == REG_PC {
            stored_pc(regs)
        } else if user_bank {
            regs.user_reg(index)
        } else {
            regs.reg(index)
        };
        bus.write32(address & !3, value)?;
        address = address.wrapping_add(4);

        if first && request.writeback && !user_bank {
            regs.set_reg(request.base, range.writeback);
        }
        first = false;
    }
    if request.writeback && user_bank {
        regs.set_reg(request.base, range.writeback);
    }

    Ok(block_transfer_cycles(false, count, false))
}
