//! Host loop wiring a core, a RAM bus and the scheduler together.
//!
//! A scanline task fires every 1232 cycles and raises the interrupt line on
//! entry to vertical blank. The guest main loop counts iterations in `r0`
//! while the interrupt handler counts frames in `r1`.
//!
//! ```sh
//! cargo run -p arm-core --example frame_loop
//! ```

#![allow(clippy::pedantic)]

use arm_core::state::PSR_I;
use arm_core::{
    Bus, BusError, CoreConfig, CoreError, Cpu, CpuVariant, Mode, Scheduler, SchedulerError,
};
use proptest as _;
use rstest as _;
#[cfg(feature = "serde")]
use serde as _;
use thiserror as _;
use tracing as _;

const SCANLINE_TASK: u32 = 0;
const CYCLES_PER_SCANLINE: u64 = 1232;
const VISIBLE_LINES: u32 = 160;
const TOTAL_LINES: u32 = 228;
const FRAMES: u32 = 4;

struct Ram(Vec<u8>);

impl Ram {
    fn slot(&self, address: u32, width: usize) -> Result<usize, BusError> {
        let start = address as usize;
        if start + width > self.0.len() {
            return Err(BusError::Unmapped { address });
        }
        Ok(start)
    }
}

impl Bus for Ram {
    fn read8(&mut self, address: u32) -> Result<u8, BusError> {
        let at = self.slot(address, 1)?;
        Ok(self.0[at])
    }

    fn read16(&mut self, address: u32) -> Result<u16, BusError> {
        let at = self.slot(address, 2)?;
        Ok(u16::from_le_bytes([self.0[at], self.0[at + 1]]))
    }

    fn read32(&mut self, address: u32) -> Result<u32, BusError> {
        let at = self.slot(address, 4)?;
        let mut raw = [0; 4];
        raw.copy_from_slice(&self.0[at..at + 4]);
        Ok(u32::from_le_bytes(raw))
    }

    fn write8(&mut self, address: u32, value: u8) -> Result<(), BusError> {
        let at = self.slot(address, 1)?;
        self.0[at] = value;
        Ok(())
    }

    fn write16(&mut self, address: u32, value: u16) -> Result<(), BusError> {
        let at = self.slot(address, 2)?;
        self.0[at..at + 2].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    fn write32(&mut self, address: u32, value: u32) -> Result<(), BusError> {
        let at = self.slot(address, 4)?;
        self.0[at..at + 4].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Video {
    line: u32,
    frames: u32,
    irq_pending: bool,
}

#[derive(Debug)]
enum HostError {
    Core(CoreError),
    Scheduler(SchedulerError),
}

impl From<CoreError> for HostError {
    fn from(error: CoreError) -> Self {
        Self::Core(error)
    }
}

impl From<SchedulerError> for HostError {
    fn from(error: SchedulerError) -> Self {
        Self::Scheduler(error)
    }
}

fn load(ram: &mut Ram, base: u32, words: &[u32]) -> Result<(), BusError> {
    for (offset, word) in (0u32..).zip(words) {
        ram.write32(base + offset * 4, *word)?;
    }
    Ok(())
}

fn run() -> Result<(), HostError> {
    let mut ram = Ram(vec![0; 0x1000]);
    // ADD r1, r1, #1 ; SUBS pc, lr, #4
    load(&mut ram, 0x18, &[0xE281_1001, 0xE25E_F004]).map_err(CoreError::from)?;
    // ADD r0, r0, #1 ; B -8
    load(&mut ram, 0x100, &[0xE280_0001, 0xEAFF_FFFD]).map_err(CoreError::from)?;

    let mut cpu = Cpu::new(&CoreConfig {
        variant: CpuVariant::Armv4t,
        entry_point: 0x100,
        initial_mode: Mode::System,
    });
    cpu.registers_mut().set_flag(PSR_I, false);

    let mut scheduler: Scheduler<Video> = Scheduler::new();
    scheduler.register_task(SCANLINE_TASK, |scheduler, video, overshoot| {
        video.line = (video.line + 1) % TOTAL_LINES;
        if video.line == VISIBLE_LINES {
            video.frames += 1;
            video.irq_pending = true;
        }
        scheduler.schedule_soon(SCANLINE_TASK, CYCLES_PER_SCANLINE - overshoot)
    });
    scheduler.schedule_soon(SCANLINE_TASK, CYCLES_PER_SCANLINE)?;

    let mut video = Video::default();
    while video.frames < FRAMES {
        cpu.set_irq_line(std::mem::take(&mut video.irq_pending));
        let cycles = cpu.step(&mut ram)?;
        scheduler.advance(&mut video, u64::from(cycles))?;
    }

    println!(
        "{} frames in {} cycles: {} main loop iterations, {} interrupts handled",
        video.frames,
        scheduler.cycles(),
        cpu.registers().reg(0),
        cpu.registers().reg(1)
    );
    Ok(())
}

fn main() {
    if let Err(error) = run() {
        eprintln!("frame loop failed: {error:?}");
        std::process::exit(1);
    }
}
