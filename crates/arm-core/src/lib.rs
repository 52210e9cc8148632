//! ARM7TDMI/ARM946E-S class interpreter core and cycle-driven event
//! scheduler for hardware emulation.
//!
//! The host owns a [`Cpu`], a [`Bus`] implementation and a [`Scheduler`],
//! calls [`Cpu::step`] and feeds the returned cycle count into
//! [`Scheduler::advance`].

/// Public host-facing API contract and integration types.
pub mod api;
pub use api::{Bus, BusError, CoreConfig, CpuVariant, VariantSet};

/// Architectural register file, modes and exceptions.
pub mod state;
pub use state::{Exception, Mode, Registers, GENERAL_REGISTER_COUNT};

/// Condition-code evaluation.
pub mod condition;
pub use condition::{condition_passes, Condition};

/// Opcode identifiers and ordered dispatch entry lists.
pub mod encoding;
pub use encoding::{
    arm_dispatch_entries, thumb_dispatch_entries, AluOp, ArmOp, DispatchEntry, ShiftKind,
    ThumbAluOp, ThumbOp, TransferKind,
};

/// Hashed dispatch tables.
pub mod decoder;
pub use decoder::{arm_hash, thumb_hash, DispatchTable, ARM_TABLE_SIZE, THUMB_TABLE_SIZE};

/// Error taxonomy.
pub mod fault;
pub use fault::{CoreError, FaultClass, InstructionSet};

/// Deterministic instruction cycle-cost table and lookup helpers.
pub mod timing;
pub use timing::{cycle_cost, CycleCostKind, CYCLE_COST_TABLE};

/// Instruction execution.
pub mod execute;

/// Interpreter instance and core step.
pub mod cpu;
pub use cpu::Cpu;

/// Cycle-driven event scheduler.
pub mod scheduler;
pub use scheduler::{
    ScheduledTask, Scheduler, SchedulerError, TaskCallback, TaskId, PENDING_TASK_CAPACITY,
};

/// Word-stream state persistence.
pub mod snapshot;
pub use snapshot::{Persist, SnapshotError, SnapshotVersion, StateReader, StateWriter};

#[cfg(test)]
use proptest as _;
#[cfg(test)]
use rstest as _;
