//! Deterministic replay fingerprint used for cross-host comparison.
//!
//! Runs a fixed program, snapshots core and scheduler half-way, restores the
//! snapshot into fresh instances and checks both continuations agree.

#![allow(clippy::pedantic)]

use arm_core::{
    Bus, BusError, CoreConfig, Cpu, CpuVariant, Mode, Persist, Scheduler, StateReader,
    StateWriter,
};
use proptest as _;
use rstest as _;
#[cfg(feature = "serde")]
use serde as _;
use thiserror as _;
use tracing as _;

const PROGRAM: [u32; 6] = [
    0xE3A0_0001, // MOV r0, #1
    0xE3A0_1000, // MOV r1, #0
    0xE081_1000, // ADD r1, r1, r0
    0xE1A0_0080, // MOV r0, r0, LSL #1
    0xE350_0801, // CMP r0, #0x10000
    0x1AFF_FFFB, // BNE -12
];

/// Program memory at address zero; reads past it return zero.
struct Rom;

impl Bus for Rom {
    fn read8(&mut self, address: u32) -> Result<u8, BusError> {
        Err(BusError::Unmapped { address })
    }

    fn read16(&mut self, address: u32) -> Result<u16, BusError> {
        Err(BusError::Unmapped { address })
    }

    fn read32(&mut self, address: u32) -> Result<u32, BusError> {
        Ok(PROGRAM
            .get((address / 4) as usize)
            .copied()
            .unwrap_or(0xEAFF_FFFE))
    }

    fn write8(&mut self, address: u32, _value: u8) -> Result<(), BusError> {
        Err(BusError::Unmapped { address })
    }

    fn write16(&mut self, address: u32, _value: u16) -> Result<(), BusError> {
        Err(BusError::Unmapped { address })
    }

    fn write32(&mut self, address: u32, _value: u32) -> Result<(), BusError> {
        Err(BusError::Unmapped { address })
    }
}

fn machine() -> (Cpu, Scheduler<u64>) {
    let cpu = Cpu::new(&CoreConfig {
        variant: CpuVariant::Armv5te,
        entry_point: 0,
        initial_mode: Mode::System,
    });
    let mut scheduler = Scheduler::new();
    scheduler.register_task(0, |scheduler, ticks: &mut u64, overshoot| {
        *ticks += 1;
        scheduler.schedule_late(0, 16 - overshoot)
    });
    (cpu, scheduler)
}

fn run(cpu: &mut Cpu, scheduler: &mut Scheduler<u64>, ticks: &mut u64, steps: usize) {
    for _ in 0..steps {
        let cycles = cpu.step(&mut Rom).unwrap_or(0);
        scheduler.advance(ticks, u64::from(cycles)).ok();
    }
}

fn hash_words(hash: &mut u64, words: &[u32]) {
    for word in words {
        for byte in word.to_le_bytes() {
            *hash ^= u64::from(byte);
            *hash = hash.wrapping_mul(0x1000_0000_01B3);
        }
    }
}

fn snapshot(cpu: &Cpu, scheduler: &Scheduler<u64>) -> Vec<u32> {
    let mut writer = StateWriter::new();
    cpu.save_state(&mut writer);
    scheduler.save_state(&mut writer);
    writer.into_words()
}

fn fingerprint() -> Option<u64> {
    let (mut cpu, mut scheduler) = machine();
    let mut ticks = 0;
    scheduler.schedule_soon(0, 16).ok()?;
    run(&mut cpu, &mut scheduler, &mut ticks, 40);

    let midpoint = snapshot(&cpu, &scheduler);
    let (mut replay_cpu, mut replay_scheduler) = machine();
    let mut reader = StateReader::new(&midpoint);
    replay_cpu.load_state(&mut reader).ok()?;
    replay_scheduler.load_state(&mut reader).ok()?;
    reader.finish().ok()?;
    let mut replay_ticks = ticks;

    run(&mut cpu, &mut scheduler, &mut ticks, 60);
    run(&mut replay_cpu, &mut replay_scheduler, &mut replay_ticks, 60);

    let original = snapshot(&cpu, &scheduler);
    if original != snapshot(&replay_cpu, &replay_scheduler) || ticks != replay_ticks {
        return None;
    }

    let mut hash = 0xCBF2_9CE4_8422_2325;
    hash_words(&mut hash, &original);
    hash ^= ticks;
    Some(hash)
}

fn main() {
    match fingerprint() {
        Some(hash) => println!("{hash:016x}"),
        None => {
            eprintln!("replay diverged from the original run");
            std::process::exit(1);
        }
    }
}
