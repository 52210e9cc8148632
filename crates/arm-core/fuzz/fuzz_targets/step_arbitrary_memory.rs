#![no_main]

use arm_core::state::PSR_T;
use arm_core::{
    Bus, BusError, CoreConfig, Cpu, CpuVariant, Mode, Persist, Scheduler, StateReader,
    StateWriter,
};
use libfuzzer_sys::fuzz_target;

const MEMORY_SIZE: usize = 0x400;

/// Small RAM seeded from the fuzz input, mirrored across the address space.
struct MirroredRam(Vec<u8>);

impl MirroredRam {
    fn index(address: u32) -> usize {
        address as usize % MEMORY_SIZE
    }
}

impl Bus for MirroredRam {
    fn read8(&mut self, address: u32) -> Result<u8, BusError> {
        Ok(self.0[Self::index(address)])
    }

    fn read16(&mut self, address: u32) -> Result<u16, BusError> {
        Ok(u16::from(self.read8(address)?) | (u16::from(self.read8(address.wrapping_add(1))?) << 8))
    }

    fn read32(&mut self, address: u32) -> Result<u32, BusError> {
        Ok(u32::from(self.read16(address)?)
            | (u32::from(self.read16(address.wrapping_add(2))?) << 16))
    }

    fn write8(&mut self, address: u32, value: u8) -> Result<(), BusError> {
        self.0[Self::index(address)] = value;
        Ok(())
    }

    fn write16(&mut self, address: u32, value: u16) -> Result<(), BusError> {
        let [low, high] = value.to_le_bytes();
        self.write8(address, low)?;
        self.write8(address.wrapping_add(1), high)
    }

    fn write32(&mut self, address: u32, value: u32) -> Result<(), BusError> {
        self.write16(address, value as u16)?;
        self.write16(address.wrapping_add(2), (value >> 16) as u16)
    }
}

fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }

    let variant = if data[0] & 1 == 0 {
        CpuVariant::Armv4t
    } else {
        CpuVariant::Armv5te
    };
    let mut memory = vec![0; MEMORY_SIZE];
    for (slot, byte) in memory.iter_mut().zip(&data[2..]) {
        *slot = *byte;
    }
    let mut bus = MirroredRam(memory);

    let mut cpu = Cpu::new(&CoreConfig {
        variant,
        entry_point: 0,
        initial_mode: Mode::System,
    });
    if data[0] & 2 != 0 {
        cpu.registers_mut().set_flag(PSR_T, true);
    }
    cpu.set_irq_line(data[0] & 4 != 0);

    let mut scheduler: Scheduler<u32> = Scheduler::new();
    scheduler.register_task(0, |scheduler, fired: &mut u32, overshoot| {
        *fired += 1;
        scheduler.schedule_late(0, 64_u64.saturating_sub(overshoot))
    });
    let _ = scheduler.schedule_soon(0, u64::from(data[1]));

    let mut fired = 0;
    for _ in 0..256 {
        let Ok(cycles) = cpu.step(&mut bus) else {
            break;
        };
        if scheduler.advance(&mut fired, u64::from(cycles)).is_err() {
            break;
        }
    }

    let mut writer = StateWriter::new();
    cpu.save_state(&mut writer);
    let mut restored = Cpu::new(cpu.config());
    let mut reader = StateReader::new(writer.as_words());
    assert!(restored.load_state(&mut reader).is_ok());
    assert_eq!(restored, cpu);
});
