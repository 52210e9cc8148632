//! 32-bit instruction set semantics driven through the core step.

#![allow(
    clippy::pedantic,
    clippy::nursery,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::too_many_lines
)]

use arm_core::state::{PSR_C, PSR_I, PSR_N, PSR_T, PSR_V, PSR_Z, REG_LR, REG_SP};
use arm_core::{
    cycle_cost, Bus, BusError, CoreConfig, CoreError, Cpu, CpuVariant, CycleCostKind,
    InstructionSet, Mode, Registers,
};
use proptest as _;
use rstest::rstest;
#[cfg(feature = "serde")]
use serde as _;
use thiserror as _;
use tracing as _;

const RAM_SIZE: usize = 0x4000;

struct RamBus {
    bytes: Vec<u8>,
    swi_calls: Vec<u32>,
    high_level_swi: bool,
}

impl RamBus {
    fn new() -> Self {
        Self {
            bytes: vec![0; RAM_SIZE],
            swi_calls: Vec::new(),
            high_level_swi: false,
        }
    }

    fn load(&mut self, base: u32, words: &[u32]) {
        for (offset, word) in (0u32..).zip(words) {
            self.write32(base + offset * 4, *word).expect("program fits in RAM");
        }
    }

    fn word(&mut self, address: u32) -> u32 {
        self.read32(address).expect("address in RAM")
    }

    fn slot(&self, address: u32, width: usize) -> Result<usize, BusError> {
        let start = address as usize;
        if start + width > self.bytes.len() {
            return Err(BusError::Unmapped { address });
        }
        Ok(start)
    }
}

impl Bus for RamBus {
    fn read8(&mut self, address: u32) -> Result<u8, BusError> {
        let at = self.slot(address, 1)?;
        Ok(self.bytes[at])
    }

    fn read16(&mut self, address: u32) -> Result<u16, BusError> {
        let at = self.slot(address, 2)?;
        Ok(u16::from_le_bytes([self.bytes[at], self.bytes[at + 1]]))
    }

    fn read32(&mut self, address: u32) -> Result<u32, BusError> {
        let at = self.slot(address, 4)?;
        let mut raw = [0; 4];
        raw.copy_from_slice(&self.bytes[at..at + 4]);
        Ok(u32::from_le_bytes(raw))
    }

    fn write8(&mut self, address: u32, value: u8) -> Result<(), BusError> {
        let at = self.slot(address, 1)?;
        self.bytes[at] = value;
        Ok(())
    }

    fn write16(&mut self, address: u32, value: u16) -> Result<(), BusError> {
        let at = self.slot(address, 2)?;
        self.bytes[at..at + 2].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    fn write32(&mut self, address: u32, value: u32) -> Result<(), BusError> {
        let at = self.slot(address, 4)?;
        self.bytes[at..at + 4].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    fn software_interrupt(&mut self, regs: &mut Registers, comment: u32) -> Result<u32, BusError> {
        self.swi_calls.push(comment);
        if self.high_level_swi {
            regs.set_reg(0, comment);
            return Ok(10);
        }
        regs.enter_exception(arm_core::Exception::SoftwareInterrupt);
        Ok(cycle_cost(CycleCostKind::SoftwareInterrupt))
    }
}

fn cpu(variant: CpuVariant, mode: Mode, entry_point: u32) -> Cpu {
    Cpu::new(&CoreConfig {
        variant,
        entry_point,
        initial_mode: mode,
    })
}

fn system_cpu(entry_point: u32) -> Cpu {
    cpu(CpuVariant::Armv4t, Mode::System, entry_point)
}

#[test]
fn adds_immediate_wraps_to_zero_with_carry() {
    let mut cpu = system_cpu(0x100);
    let mut bus = RamBus::new();
    // ADDS r0, r0, #1
    bus.load(0x100, &[0xE290_0001]);
    cpu.registers_mut().set_reg(0, 0xFFFF_FFFF);

    assert_eq!(cpu.step(&mut bus), Ok(1));
    let regs = cpu.registers();
    assert_eq!(regs.reg(0), 0);
    assert!(!regs.flag(PSR_N));
    assert!(regs.flag(PSR_Z));
    assert!(regs.flag(PSR_C));
    assert!(!regs.flag(PSR_V));
}

#[test]
fn ldmia_with_writeback_loads_ascending_registers() {
    let mut cpu = system_cpu(0x100);
    let mut bus = RamBus::new();
    // LDMIA r0!, {r2, r3, r5}
    bus.load(0x100, &[0xE8B0_002C]);
    bus.load(0x1000, &[0xAAAA_0001, 0xBBBB_0002, 0xCCCC_0003]);
    cpu.registers_mut().set_reg(0, 0x1000);

    cpu.step(&mut bus).expect("step");
    let regs = cpu.registers();
    assert_eq!(regs.reg(2), 0xAAAA_0001);
    assert_eq!(regs.reg(3), 0xBBBB_0002);
    assert_eq!(regs.reg(5), 0xCCCC_0003);
    assert_eq!(regs.reg(4), 0);
    assert_eq!(regs.reg(0), 0x100C);
}

#[test]
fn ldm_with_base_in_list_keeps_loaded_value() {
    let mut cpu = system_cpu(0x100);
    let mut bus = RamBus::new();
    // LDMIA r0!, {r0, r1}
    bus.load(0x100, &[0xE8B0_0003]);
    bus.load(0x1000, &[0x1234, 0x5678]);
    cpu.registers_mut().set_reg(0, 0x1000);

    cpu.step(&mut bus).expect("step");
    assert_eq!(cpu.registers().reg(0), 0x1234);
    assert_eq!(cpu.registers().reg(1), 0x5678);
}

#[test]
fn stm_stores_original_base_when_it_is_lowest_listed() {
    let mut cpu = system_cpu(0x100);
    let mut bus = RamBus::new();
    // STMIA r1!, {r1, r2}
    bus.load(0x100, &[0xE8A1_0006]);
    cpu.registers_mut().set_reg(1, 0x1000);
    cpu.registers_mut().set_reg(2, 0x22);

    cpu.step(&mut bus).expect("step");
    assert_eq!(bus.word(0x1000), 0x1000);
    assert_eq!(bus.word(0x1004), 0x22);
    assert_eq!(cpu.registers().reg(1), 0x1008);
}

#[test]
fn stm_stores_written_back_base_when_it_is_not_lowest() {
    let mut cpu = system_cpu(0x100);
    let mut bus = RamBus::new();
    // STMIA r2!, {r1, r2}
    bus.load(0x100, &[0xE8A2_0006]);
    cpu.registers_mut().set_reg(1, 0x11);
    cpu.registers_mut().set_reg(2, 0x1000);

    cpu.step(&mut bus).expect("step");
    assert_eq!(bus.word(0x1000), 0x11);
    assert_eq!(bus.word(0x1004), 0x1008);
    assert_eq!(cpu.registers().reg(2), 0x1008);
}

#[test]
fn user_bank_stm_always_stores_original_base() {
    let mut cpu = cpu(CpuVariant::Armv4t, Mode::Supervisor, 0x100);
    let mut bus = RamBus::new();
    // STMIA r1!, {r0, r1}^
    bus.load(0x100, &[0xE8E1_0003]);
    cpu.registers_mut().set_reg(0, 0x10);
    cpu.registers_mut().set_reg(1, 0x1000);

    cpu.step(&mut bus).expect("step");
    assert_eq!(bus.word(0x1000), 0x10);
    assert_eq!(bus.word(0x1004), 0x1000);
    assert_eq!(cpu.registers().reg(1), 0x1008);
}

#[test]
fn user_bank_stm_reads_user_stack_pointer() {
    let mut cpu = system_cpu(0x100);
    let mut bus = RamBus::new();
    // STMIA r0, {r13}^
    bus.load(0x100, &[0xE8C0_2000]);
    cpu.registers_mut().set_reg(REG_SP, 0x1111);
    cpu.registers_mut().set_cpsr(Mode::Interrupt.bits() | PSR_I);
    cpu.registers_mut().set_reg(REG_SP, 0x2222);
    cpu.registers_mut().set_reg(0, 0x1000);

    cpu.step(&mut bus).expect("step");
    assert_eq!(bus.word(0x1000), 0x1111);
    assert_eq!(cpu.registers().reg(REG_SP), 0x2222);
}

#[test]
fn empty_list_load_transfers_pc_and_moves_base_by_sixteen_words() {
    let mut cpu = system_cpu(0x100);
    let mut bus = RamBus::new();
    // LDMIA r0!, {}
    bus.load(0x100, &[0xE8B0_0000]);
    bus.load(0x1000, &[0x200]);
    cpu.registers_mut().set_reg(0, 0x1000);

    cpu.step(&mut bus).expect("step");
    assert_eq!(cpu.registers().next_pc(), 0x200);
    assert_eq!(cpu.registers().reg(0), 0x1040);
}

#[test]
fn empty_list_store_writes_pc_and_moves_base_down() {
    let mut cpu = system_cpu(0x100);
    let mut bus = RamBus::new();
    // STMDB r0!, {}
    bus.load(0x100, &[0xE920_0000]);
    cpu.registers_mut().set_reg(0, 0x1040);

    cpu.step(&mut bus).expect("step");
    assert_eq!(bus.word(0x1000), 0x10C);
    assert_eq!(cpu.registers().reg(0), 0x1000);
}

#[test]
fn ldm_with_psr_and_pc_returns_from_exception() {
    let mut cpu = system_cpu(0x100);
    let mut bus = RamBus::new();
    // LDMIA r13!, {r0, pc}^
    bus.load(0x100, &[0xE8FD_8001]);
    bus.load(0x1000, &[0x55, 0x200]);

    let regs = cpu.registers_mut();
    regs.set_reg(REG_SP, 0x3000);
    regs.set_cpsr(Mode::Interrupt.bits() | PSR_I);
    regs.set_spsr(Mode::System.bits() | PSR_Z);
    regs.set_reg(REG_SP, 0x1000);

    cpu.step(&mut bus).expect("step");
    let regs = cpu.registers_mut();
    assert_eq!(regs.mode(), Some(Mode::System));
    assert!(regs.flag(PSR_Z));
    assert_eq!(regs.reg(0), 0x55);
    assert_eq!(regs.next_pc(), 0x200);
    assert_eq!(regs.reg(REG_SP), 0x3000);

    regs.set_cpsr(Mode::Interrupt.bits() | PSR_I);
    assert_eq!(regs.reg(REG_SP), 0x1008);
}

#[test]
fn software_interrupt_enters_supervisor_and_movs_returns() {
    let mut cpu = system_cpu(0x100);
    let mut bus = RamBus::new();
    // SWI 0x12 ; MOV r1, #1
    bus.load(0x100, &[0xEF00_0012, 0xE3A0_1001]);
    // MOVS pc, lr
    bus.load(0x08, &[0xE1B0_F00E]);
    cpu.registers_mut().set_flag(PSR_C, true);

    assert_eq!(
        cpu.step(&mut bus),
        Ok(cycle_cost(CycleCostKind::SoftwareInterrupt))
    );
    assert_eq!(bus.swi_calls, vec![0x12]);
    assert_eq!(cpu.registers().mode(), Some(Mode::Supervisor));
    assert_eq!(cpu.registers().reg(REG_LR), 0x104);
    assert_eq!(cpu.registers().next_pc(), 0x08);

    assert_eq!(cpu.step(&mut bus), Ok(3));
    assert_eq!(cpu.registers().mode(), Some(Mode::System));
    assert!(cpu.registers().flag(PSR_C));
    assert_eq!(cpu.registers().next_pc(), 0x104);

    cpu.step(&mut bus).expect("step");
    assert_eq!(cpu.registers().reg(1), 1);
}

#[test]
fn high_level_software_interrupt_handler_bypasses_the_vector() {
    let mut cpu = system_cpu(0x100);
    let mut bus = RamBus::new();
    bus.high_level_swi = true;
    bus.load(0x100, &[0xEF12_3456]);

    assert_eq!(cpu.step(&mut bus), Ok(10));
    assert_eq!(cpu.registers().reg(0), 0x0012_3456);
    assert_eq!(cpu.registers().mode(), Some(Mode::System));
    assert_eq!(cpu.registers().next_pc(), 0x104);
}

#[test]
fn interrupt_handler_returns_with_subs() {
    let mut cpu = system_cpu(0x100);
    let mut bus = RamBus::new();
    // MOV r2, #3
    bus.load(0x100, &[0xE3A0_2003]);
    // SUBS pc, lr, #4
    bus.load(0x18, &[0xE25E_F004]);
    cpu.registers_mut().set_flag(PSR_I, false);
    cpu.set_irq_line(true);

    cpu.step(&mut bus).expect("interrupt step");
    assert_eq!(cpu.registers().mode(), Some(Mode::System));
    assert!(!cpu.registers().irq_disabled());
    assert_eq!(cpu.registers().next_pc(), 0x100);

    cpu.set_irq_line(false);
    cpu.step(&mut bus).expect("step");
    assert_eq!(cpu.registers().reg(2), 3);
}

#[test]
fn bx_switches_to_thumb_and_back() {
    let mut cpu = system_cpu(0x100);
    let mut bus = RamBus::new();
    // ADD r0, pc, #1 ; BX r0
    bus.load(0x100, &[0xE28F_0001, 0xE12F_FF10]);
    // MOVS r1, #42 ; BX pc
    bus.load(0x108, &[0x4778_212A]);
    // MOV r2, #7
    bus.load(0x10C, &[0xE3A0_2007]);

    cpu.step(&mut bus).expect("add");
    assert_eq!(cpu.registers().reg(0), 0x109);
    cpu.step(&mut bus).expect("bx to thumb");
    assert!(cpu.registers().flag(PSR_T));
    assert_eq!(cpu.registers().next_pc(), 0x108);

    cpu.step(&mut bus).expect("movs");
    cpu.step(&mut bus).expect("bx to arm");
    assert!(!cpu.registers().flag(PSR_T));
    assert_eq!(cpu.registers().next_pc(), 0x10C);

    cpu.step(&mut bus).expect("mov");
    assert_eq!(cpu.registers().reg(1), 42);
    assert_eq!(cpu.registers().reg(2), 7);
}

#[test]
fn branch_with_link_records_return_address() {
    let mut cpu = system_cpu(0x100);
    let mut bus = RamBus::new();
    // BL +0x10
    bus.load(0x100, &[0xEB00_0002]);

    assert_eq!(cpu.step(&mut bus), Ok(3));
    assert_eq!(cpu.registers().reg(REG_LR), 0x104);
    assert_eq!(cpu.registers().next_pc(), 0x110);
}

#[test]
fn countdown_loop_runs_to_completion() {
    let mut cpu = system_cpu(0x100);
    let mut bus = RamBus::new();
    bus.load(
        0x100,
        &[
            0xE3A0_0000, // MOV r0, #0
            0xE3A0_100A, // MOV r1, #10
            0xE080_0001, // ADD r0, r0, r1
            0xE251_1001, // SUBS r1, r1, #1
            0x1AFF_FFFC, // BNE loop
            0xEAFF_FFFE, // B .
        ],
    );

    let mut steps = 0;
    while cpu.registers().next_pc() != 0x114 {
        cpu.step(&mut bus).expect("loop step");
        steps += 1;
        assert!(steps < 100, "loop did not terminate");
    }
    assert_eq!(cpu.registers().reg(0), 55);
    assert!(cpu.registers().flag(PSR_Z));
}

#[test]
fn unaligned_word_load_rotates() {
    let mut cpu = system_cpu(0x100);
    let mut bus = RamBus::new();
    // LDR r0, [r1]
    bus.load(0x100, &[0xE591_0000]);
    bus.load(0x1000, &[0x4433_2211]);
    cpu.registers_mut().set_reg(1, 0x1001);

    cpu.step(&mut bus).expect("step");
    assert_eq!(cpu.registers().reg(0), 0x1144_3322);
}

#[test]
fn load_into_pc_interworks_only_on_v5te() {
    // LDR pc, [r1]
    let program = [0xE591_F000];
    for (variant, thumb, target) in [
        (CpuVariant::Armv4t, false, 0x200),
        (CpuVariant::Armv5te, true, 0x200),
    ] {
        let mut cpu = cpu(variant, Mode::System, 0x100);
        let mut bus = RamBus::new();
        bus.load(0x100, &program);
        bus.load(0x1000, &[0x201]);
        cpu.registers_mut().set_reg(1, 0x1000);

        cpu.step(&mut bus).expect("step");
        assert_eq!(cpu.registers().flag(PSR_T), thumb, "{variant:?}");
        assert_eq!(cpu.registers().next_pc(), target, "{variant:?}");
    }
}

#[rstest]
#[case::count_leading_zeros(0xE16F_0F11, 0x0000_F000, 16)]
#[case::count_leading_zeros_of_zero(0xE16F_0F11, 0, 32)]
fn v5te_count_leading_zeros(#[case] instr: u32, #[case] operand: u32, #[case] expected: u32) {
    let mut cpu = cpu(CpuVariant::Armv5te, Mode::System, 0x100);
    let mut bus = RamBus::new();
    bus.load(0x100, &[instr]);
    cpu.registers_mut().set_reg(1, operand);

    cpu.step(&mut bus).expect("step");
    assert_eq!(cpu.registers().reg(0), expected);
}

#[test]
fn coprocessor_instruction_is_unknown() {
    let mut cpu = cpu(CpuVariant::Armv5te, Mode::System, 0x100);
    let mut bus = RamBus::new();
    // MCR p0, 0, r0, c0, c0, 0
    bus.load(0x100, &[0xEE00_0010]);

    assert_eq!(
        cpu.step(&mut bus),
        Err(CoreError::UnknownInstruction {
            set: InstructionSet::Arm,
            raw: 0xEE00_0010,
            address: 0x100,
        })
    );
}

#[rstest]
#[case::mov_immediate(0xE3A0_0001, 1)]
#[case::register_shift_by_register(0xE1A0_0211, 2)]
#[case::branch(0xEA00_0000, 3)]
#[case::mov_to_pc(0xE1A0_F001, 3)]
#[case::failed_condition(0x03A0_0001, 1)]
fn cycle_costs(#[case] instr: u32, #[case] cycles: u32) {
    let mut cpu = system_cpu(0x100);
    let mut bus = RamBus::new();
    bus.load(0x100, &[instr]);
    cpu.registers_mut().set_reg(1, 0x200);

    assert_eq!(cpu.step(&mut bus), Ok(cycles));
}

#[test]
fn msr_in_user_mode_only_writes_flags() {
    let mut cpu = cpu(CpuVariant::Armv4t, Mode::User, 0x100);
    let mut bus = RamBus::new();
    // MSR CPSR_fc, r0
    bus.load(0x100, &[0xE129_F000]);
    cpu.registers_mut().set_reg(0, PSR_N | Mode::Supervisor.bits());

    cpu.step(&mut bus).expect("step");
    assert_eq!(cpu.registers().mode(), Some(Mode::User));
    assert!(cpu.registers().flag(PSR_N));
}

#[test]
fn bus_failure_aborts_the_step() {
    let mut cpu = system_cpu(0x100);
    let mut bus = RamBus::new();
    // LDR r0, [r1]
    bus.load(0x100, &[0xE591_0000]);
    cpu.registers_mut().set_reg(1, 0x8000_0000);

    assert_eq!(
        cpu.step(&mut bus),
        Err(CoreError::Bus(BusError::Unmapped {
            address: 0x8000_0000
        }))
    );
}
