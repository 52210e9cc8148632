//! Interpreter instance: register file, dispatch tables and the core step.

use crate::api::{Bus, CoreConfig};
use crate::condition::condition_passes;
use crate::decoder::DispatchTable;
use crate::execute::{execute_arm, execute_thumb};
use crate::fault::CoreError;
use crate::snapshot::{Persist, SnapshotError, SnapshotVersion, StateReader, StateWriter};
use crate::state::Registers;
use crate::timing::{cycle_cost, CycleCostKind};

const ARM_UNIT: u32 = 4;
const THUMB_UNIT: u32 = 2;

/// ARM7TDMI/ARM946E-S class interpreter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cpu {
    config: CoreConfig,
    table: DispatchTable,
    regs: Registers,
    irq_line: bool,
}

impl Cpu {
    /// Builds the dispatch tables for the configured variant and enters the
    /// reset state.
    #[must_use]
    pub fn new(config: &CoreConfig) -> Self {
        Self {
            config: config.clone(),
            table: DispatchTable::build(config.variant),
            regs: Registers::with_entry(config.entry_point, config.initial_mode),
            irq_line: false,
        }
    }

    /// Restores the configured reset state; the dispatch tables are kept.
    pub fn reset(&mut self) {
        self.regs = Registers::with_entry(self.config.entry_point, self.config.initial_mode);
        self.irq_line = false;
        tracing::debug!(entry_point = self.config.entry_point, "core reset");
    }

    /// Configuration the core was built with.
    #[must_use]
    pub const fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Register file.
    #[must_use]
    pub const fn registers(&self) -> &Registers {
        &self.regs
    }

    /// Mutable register file, for hosts that seed or patch state.
    pub const fn registers_mut(&mut self) -> &mut Registers {
        &mut self.regs
    }

    /// Level of the interrupt request line.
    #[must_use]
    pub const fn irq_line(&self) -> bool {
        self.irq_line
    }

    /// Drives the interrupt request line; sampled at the start of each step.
    pub const fn set_irq_line(&mut self, asserted: bool) {
        self.irq_line = asserted;
    }

    /// Executes one instruction and returns the cycles it consumed.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownInstruction`] for undecodable bits and
    /// [`CoreError::Bus`] for bus or callback failures. Both are terminal.
    pub fn step(&mut self, bus: &mut dyn Bus) -> Result<u32, CoreError> {
        if self.irq_line && !self.regs.irq_disabled() {
            bus.interrupt(&mut self.regs)?;
        }

        if self.regs.thumb() {
            let address = self.regs.begin_fetch(THUMB_UNIT);
            let instr = bus.read16(address)?;
            let op = self.table.thumb(instr);
            tracing::trace!(address, instr, ?op, "thumb step");
            return execute_thumb(op, &mut self.regs, bus, instr, self.config.variant);
        }

        let address = self.regs.begin_fetch(ARM_UNIT);
        let instr = bus.read32(address)?;
        #[allow(clippy::cast_possible_truncation)]
        let condition = (instr >> 28) as u8;
        if !condition_passes(condition, self.regs.cpsr())? {
            tracing::trace!(address, instr, "condition failed");
            return Ok(cycle_cost(CycleCostKind::ConditionFailed));
        }
        let op = self.table.arm(instr);
        tracing::trace!(address, instr, ?op, "arm step");
        execute_arm(op, &mut self.regs, bus, instr, self.config.variant)
    }

    /// Steps until at least `budget` cycles have elapsed; returns the cycles
    /// actually consumed.
    ///
    /// # Errors
    ///
    /// Stops at and returns the first [`CoreError`].
    pub fn run(&mut self, bus: &mut dyn Bus, budget: u64) -> Result<u64, CoreError> {
        let mut elapsed = 0;
        while elapsed < budget {
            elapsed += u64::from(self.step(bus)?);
        }
        Ok(elapsed)
    }
}

impl Persist for Cpu {
    fn save_state(&self, writer: &mut StateWriter) {
        writer.write(SnapshotVersion::V1 as u32);
        self.regs.save_state(writer);
        writer.write_bool(self.irq_line);
    }

    fn load_state(&mut self, reader: &mut StateReader<'_>) -> Result<(), SnapshotError> {
        let version = reader.read()?;
        if SnapshotVersion::from_u32(version).is_none() {
            return Err(SnapshotError::UnsupportedVersion(version));
        }
        let mut regs = self.regs.clone();
        regs.load_state(reader)?;
        let irq_line = reader.read_bool("irq_line")?;

        self.regs = regs;
        self.irq_line = irq_line;
        Ok(())
    }
}
