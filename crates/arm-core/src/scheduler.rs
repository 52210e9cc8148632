//! Cycle-driven event scheduler.
//!
//! Tasks are registered once by id and scheduled any number of times at a
//! delay relative to the current cycle counter. [`Scheduler::advance`] fires
//! due tasks in target order. Callbacks receive the scheduler itself and may
//! schedule, cancel, or call `advance` again; a task is removed from the
//! pending list before its callback runs.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

use crate::snapshot::{Persist, SnapshotError, StateReader, StateWriter};

/// Maximum number of simultaneously pending tasks.
pub const PENDING_TASK_CAPACITY: usize = 64;

/// Small integer naming a registered task.
pub type TaskId = u32;

/// Callback invoked when a task fires; the last argument is the overshoot
/// (cycles elapsed past the target).
pub type TaskCallback<C> =
    Box<dyn FnMut(&mut Scheduler<C>, &mut C, u64) -> Result<(), SchedulerError>>;

/// Scheduler failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum SchedulerError {
    /// The pending list is at capacity.
    #[error("pending task list is full; cannot schedule task {id}")]
    QueueFull {
        /// Task that could not be scheduled.
        id: TaskId,
    },
    /// No callback is registered for the id.
    #[error("task {0} has no registered callback")]
    UnregisteredTask(TaskId),
    /// The task fired while its own callback was still running.
    #[error("task {0} fired while its callback was already running")]
    TaskBusy(TaskId),
}

/// One pending entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScheduledTask {
    /// Task to fire.
    pub id: TaskId,
    /// Absolute cycle at which the task becomes due.
    pub target: u64,
}

/// Ordered delay queue.
pub struct Scheduler<C> {
    cycles: u64,
    /// Sorted by descending target; the soonest task is last.
    pending: Vec<ScheduledTask>,
    /// A present key with an empty slot marks a callback that is running.
    callbacks: BTreeMap<TaskId, Option<TaskCallback<C>>>,
}

impl<C> fmt::Debug for Scheduler<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("cycles", &self.cycles)
            .field("pending", &self.pending)
            .field("registered", &self.callbacks.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl<C> Default for Scheduler<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> Scheduler<C> {
    /// Creates an empty scheduler at cycle zero.
    #[must_use]
    pub fn new() -> Self {
        Self {
            cycles: 0,
            pending: Vec::with_capacity(PENDING_TASK_CAPACITY),
            callbacks: BTreeMap::new(),
        }
    }

    /// Current cycle counter.
    #[must_use]
    pub const fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Number of pending entries.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Pending entries, soonest last.
    #[must_use]
    pub fn pending(&self) -> &[ScheduledTask] {
        &self.pending
    }

    /// Installs `callback` for `id`, replacing any previous registration.
    pub fn register_task<F>(&mut self, id: TaskId, callback: F)
    where
        F: FnMut(&mut Self, &mut C, u64) -> Result<(), SchedulerError> + 'static,
    {
        self.callbacks.insert(id, Some(Box::new(callback)));
    }

    /// Returns true when `id` has a registered callback.
    #[must_use]
    pub fn is_registered(&self, id: TaskId) -> bool {
        self.callbacks.contains_key(&id)
    }

    /// Schedules `id` to fire `delay` cycles from now, ahead of tasks already
    /// due on the same cycle.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::UnregisteredTask`] or
    /// [`SchedulerError::QueueFull`].
    pub fn schedule_soon(&mut self, id: TaskId, delay: u64) -> Result<(), SchedulerError> {
        self.insert(id, delay, false)
    }

    /// Schedules `id` to fire `delay` cycles from now, behind tasks already
    /// due on the same cycle.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::UnregisteredTask`] or
    /// [`SchedulerError::QueueFull`].
    pub fn schedule_late(&mut self, id: TaskId, delay: u64) -> Result<(), SchedulerError> {
        self.insert(id, delay, true)
    }

    fn insert(&mut self, id: TaskId, delay: u64, late: bool) -> Result<(), SchedulerError> {
        if !self.is_registered(id) {
            return Err(SchedulerError::UnregisteredTask(id));
        }
        if self.pending.len() >= PENDING_TASK_CAPACITY {
            tracing::warn!(id, "pending task list full");
            return Err(SchedulerError::QueueFull { id });
        }

        let target = self.cycles.saturating_add(delay);
        let position = if late {
            self.pending.partition_point(|task| task.target > target)
        } else {
            self.pending.partition_point(|task| task.target >= target)
        };
        self.pending.insert(position, ScheduledTask { id, target });
        Ok(())
    }

    /// Removes the soonest pending entry for `id`; no-op when none exists.
    pub fn cancel(&mut self, id: TaskId) {
        if let Some(position) = self.pending.iter().rposition(|task| task.id == id) {
            self.pending.remove(position);
        }
    }

    /// Returns true when `id` has a pending entry.
    #[must_use]
    pub fn is_scheduled(&self, id: TaskId) -> bool {
        self.pending.iter().any(|task| task.id == id)
    }

    /// Cycles until the soonest pending entry for `id` is due (zero when
    /// already due), or `None` when it is not pending.
    #[must_use]
    pub fn cycles_until(&self, id: TaskId) -> Option<u64> {
        self.pending
            .iter()
            .rev()
            .find(|task| task.id == id)
            .map(|task| task.target.saturating_sub(self.cycles))
    }

    /// Adds `delta` to the counter and fires every task whose target has
    /// been reached, soonest first.
    ///
    /// # Errors
    ///
    /// Stops at the first failing callback and returns its error. Entries
    /// not yet fired stay pending, including one whose callback is still
    /// running further up the stack ([`SchedulerError::TaskBusy`]).
    pub fn advance(&mut self, ctx: &mut C, delta: u64) -> Result<(), SchedulerError> {
        self.cycles = self.cycles.saturating_add(delta);

        while let Some(&task) = self.pending.last() {
            if task.target > self.cycles {
                break;
            }
            let callback = self.take_callback(task.id)?;
            self.pending.pop();
            self.fire(task, callback, ctx)?;
        }
        Ok(())
    }

    fn take_callback(&mut self, id: TaskId) -> Result<TaskCallback<C>, SchedulerError> {
        match self.callbacks.get_mut(&id) {
            Some(slot) => slot.take().ok_or(SchedulerError::TaskBusy(id)),
            None => Err(SchedulerError::UnregisteredTask(id)),
        }
    }

    fn fire(
        &mut self,
        task: ScheduledTask,
        mut callback: TaskCallback<C>,
        ctx: &mut C,
    ) -> Result<(), SchedulerError> {
        let overshoot = self.cycles - task.target;
        tracing::trace!(id = task.id, target = task.target, overshoot, "task fired");
        let result = callback(self, ctx, overshoot);

        // A callback may re-register itself; keep the newer registration.
        if let Some(slot) = self.callbacks.get_mut(&task.id) {
            if slot.is_none() {
                *slot = Some(callback);
            }
        }
        result
    }
}

impl<C> Persist for Scheduler<C> {
    fn save_state(&self, writer: &mut StateWriter) {
        writer.write_u64(self.cycles);
        writer.write(u32::try_from(self.pending.len()).unwrap_or(u32::MAX));
        for task in &self.pending {
            writer.write(task.id);
            writer.write_u64(task.target);
        }
    }

    /// Callbacks are not part of the snapshot; every saved id must already be
    /// registered.
    fn load_state(&mut self, reader: &mut StateReader<'_>) -> Result<(), SnapshotError> {
        let cycles = reader.read_u64()?;
        let count = reader.read()?;
        if count as usize > PENDING_TASK_CAPACITY {
            return Err(SnapshotError::InvalidField {
                field: "pending_len",
                value: count,
            });
        }

        let mut pending = Vec::with_capacity(PENDING_TASK_CAPACITY);
        for _ in 0..count {
            let id = reader.read()?;
            if !self.is_registered(id) {
                return Err(SnapshotError::InvalidField {
                    field: "task_id",
                    value: id,
                });
            }
            let target = reader.read_u64()?;
            if pending
                .last()
                .is_some_and(|previous: &ScheduledTask| previous.target < target)
            {
                return Err(SnapshotError::InvalidField {
                    field: "task_target",
                    value: id,
                });
            }
            pending.push(ScheduledTask { id, target });
        }

        self.cycles = cycles;
        self.pending = pending;
        Ok(())
    }
}
