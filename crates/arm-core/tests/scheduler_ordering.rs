//! Scheduler ordering, re-entrant advance and failure reporting.

#![allow(
    clippy::pedantic,
    clippy::nursery,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::too_many_lines
)]

use arm_core::{ScheduledTask, Scheduler, SchedulerError, TaskId, PENDING_TASK_CAPACITY};
use proptest as _;
use rstest::rstest;
#[cfg(feature = "serde")]
use serde as _;
use thiserror as _;
use tracing as _;

#[derive(Debug, Default)]
struct Trace {
    events: Vec<(&'static str, u64)>,
    fired: Vec<TaskId>,
}

fn recording_scheduler(ids: &[TaskId]) -> Scheduler<Trace> {
    let mut scheduler = Scheduler::new();
    for &id in ids {
        scheduler.register_task(id, move |_, trace: &mut Trace, _| {
            trace.fired.push(id);
            Ok(())
        });
    }
    scheduler
}

#[test]
fn tasks_fire_in_target_order() {
    let mut scheduler = recording_scheduler(&[0, 1, 2]);
    let mut trace = Trace::default();
    scheduler.schedule_soon(0, 30).expect("schedule");
    scheduler.schedule_soon(1, 10).expect("schedule");
    scheduler.schedule_soon(2, 20).expect("schedule");

    scheduler.advance(&mut trace, 25).expect("advance");
    assert_eq!(trace.fired, vec![1, 2]);
    assert_eq!(scheduler.cycles_until(0), Some(5));

    scheduler.advance(&mut trace, 5).expect("advance");
    assert_eq!(trace.fired, vec![1, 2, 0]);
    assert_eq!(scheduler.pending_len(), 0);
}

#[rstest]
#[case::soon_then_soon(false, false, vec![1, 0])]
#[case::soon_then_late(false, true, vec![0, 1])]
#[case::late_then_soon(true, false, vec![1, 0])]
#[case::late_then_late(true, true, vec![0, 1])]
fn ties_follow_soon_and_late_placement(
    #[case] first_late: bool,
    #[case] second_late: bool,
    #[case] expected: Vec<TaskId>,
) {
    let mut scheduler = recording_scheduler(&[0, 1]);
    let mut trace = Trace::default();
    for (id, late) in [(0, first_late), (1, second_late)] {
        if late {
            scheduler.schedule_late(id, 8).expect("schedule");
        } else {
            scheduler.schedule_soon(id, 8).expect("schedule");
        }
    }

    scheduler.advance(&mut trace, 8).expect("advance");
    assert_eq!(trace.fired, expected);
}

#[test]
fn late_task_runs_after_every_task_due_on_the_same_cycle() {
    let mut scheduler = recording_scheduler(&[0, 1, 2]);
    let mut trace = Trace::default();
    scheduler.schedule_soon(0, 10).expect("schedule");
    scheduler.schedule_soon(1, 10).expect("schedule");
    scheduler.schedule_late(2, 10).expect("schedule");

    scheduler.advance(&mut trace, 10).expect("advance");
    assert_eq!(trace.fired, vec![1, 0, 2]);
}

#[test]
fn nothing_fires_before_its_target() {
    let mut scheduler = recording_scheduler(&[0]);
    let mut trace = Trace::default();
    scheduler.schedule_soon(0, 10).expect("schedule");

    scheduler.advance(&mut trace, 9).expect("advance");
    assert!(trace.fired.is_empty());
    assert!(scheduler.is_scheduled(0));
    scheduler.advance(&mut trace, 1).expect("advance");
    assert_eq!(trace.fired, vec![0]);
}

#[test]
fn reentrant_advance_fires_nested_task_once() {
    let mut scheduler: Scheduler<Trace> = Scheduler::new();
    scheduler.register_task(0, |scheduler, trace, _| {
        trace.events.push(("outer-start", scheduler.cycles()));
        scheduler.schedule_soon(1, 2)?;
        scheduler.advance(trace, 3)?;
        trace.events.push(("outer-end", scheduler.cycles()));
        Ok(())
    });
    scheduler.register_task(1, |scheduler, trace, overshoot| {
        trace.events.push(("inner", scheduler.cycles() - overshoot));
        Ok(())
    });
    scheduler.register_task(2, |scheduler, trace, _| {
        trace.events.push(("later", scheduler.cycles()));
        Ok(())
    });
    let mut trace = Trace::default();
    scheduler.schedule_soon(0, 10).expect("schedule");
    scheduler.schedule_soon(2, 20).expect("schedule");

    scheduler.advance(&mut trace, 10).expect("advance");
    assert_eq!(
        trace.events,
        vec![("outer-start", 10), ("inner", 12), ("outer-end", 13)]
    );
    assert_eq!(scheduler.cycles(), 13);
    assert_eq!(scheduler.cycles_until(2), Some(7));
    assert!(!scheduler.is_scheduled(1));

    scheduler.advance(&mut trace, 7).expect("advance");
    assert_eq!(trace.events.last(), Some(&("later", 20)));
    assert_eq!(trace.events.len(), 4);
}

#[test]
fn nested_advance_drains_entries_the_outer_loop_has_not_reached() {
    let mut scheduler: Scheduler<Trace> = Scheduler::new();
    scheduler.register_task(0, |scheduler, trace, _| {
        trace.fired.push(0);
        scheduler.advance(trace, 0)
    });
    for id in [1, 2] {
        scheduler.register_task(id, move |_, trace, _| {
            trace.fired.push(id);
            Ok(())
        });
    }
    let mut trace = Trace::default();
    scheduler.schedule_soon(0, 5).expect("schedule");
    scheduler.schedule_soon(1, 6).expect("schedule");
    scheduler.schedule_soon(2, 7).expect("schedule");

    scheduler.advance(&mut trace, 10).expect("advance");
    assert_eq!(trace.fired, vec![0, 1, 2]);
    assert_eq!(scheduler.pending_len(), 0);
}

#[test]
fn periodic_task_compensates_for_overshoot() {
    let mut scheduler: Scheduler<Vec<u64>> = Scheduler::new();
    scheduler.register_task(0, |scheduler, targets, overshoot| {
        targets.push(scheduler.cycles() - overshoot);
        scheduler.schedule_soon(0, 10 - overshoot)
    });
    let mut targets = Vec::new();
    scheduler.schedule_soon(0, 10).expect("schedule");

    for _ in 0..15 {
        scheduler.advance(&mut targets, 7).expect("advance");
    }
    assert_eq!(targets, (1..=10).map(|n| n * 10).collect::<Vec<u64>>());
    assert_eq!(scheduler.cycles(), 105);
    assert_eq!(scheduler.cycles_until(0), Some(5));
}

#[test]
fn task_advancing_into_itself_reports_busy() {
    let mut scheduler: Scheduler<()> = Scheduler::new();
    scheduler.register_task(3, |scheduler, ctx, _| {
        scheduler.schedule_soon(3, 0)?;
        scheduler.advance(ctx, 0)
    });
    scheduler.schedule_soon(3, 1).expect("schedule");

    assert_eq!(
        scheduler.advance(&mut (), 1),
        Err(SchedulerError::TaskBusy(3))
    );
    assert!(scheduler.is_registered(3));
    assert_eq!(scheduler.pending(), &[ScheduledTask { id: 3, target: 1 }]);
    assert_eq!(scheduler.cycles_until(3), Some(0));
}

#[test]
fn failing_callback_stops_the_drain() {
    let mut scheduler: Scheduler<Trace> = Scheduler::new();
    scheduler.register_task(0, |_, _, _| Err(SchedulerError::UnregisteredTask(99)));
    scheduler.register_task(1, |_, trace, _| {
        trace.fired.push(1);
        Ok(())
    });
    let mut trace = Trace::default();
    scheduler.schedule_soon(0, 1).expect("schedule");
    scheduler.schedule_soon(1, 2).expect("schedule");

    assert_eq!(
        scheduler.advance(&mut trace, 5),
        Err(SchedulerError::UnregisteredTask(99))
    );
    assert!(trace.fired.is_empty());
    assert!(scheduler.is_scheduled(1));

    scheduler.advance(&mut trace, 0).expect("advance");
    assert_eq!(trace.fired, vec![1]);
}

#[test]
fn unregistered_task_cannot_be_scheduled() {
    let mut scheduler = recording_scheduler(&[0]);
    assert_eq!(
        scheduler.schedule_soon(4, 1),
        Err(SchedulerError::UnregisteredTask(4))
    );
    assert_eq!(
        scheduler.schedule_late(4, 1),
        Err(SchedulerError::UnregisteredTask(4))
    );
}

#[test]
fn pending_list_is_bounded() {
    let mut scheduler = recording_scheduler(&[0]);
    for delay in 0..PENDING_TASK_CAPACITY as u64 {
        scheduler.schedule_late(0, delay).expect("within capacity");
    }
    assert_eq!(
        scheduler.schedule_soon(0, 1),
        Err(SchedulerError::QueueFull { id: 0 })
    );
    assert_eq!(scheduler.pending_len(), PENDING_TASK_CAPACITY);
}

#[test]
fn cancel_removes_only_the_soonest_entry() {
    let mut scheduler = recording_scheduler(&[0, 1]);
    let mut trace = Trace::default();
    scheduler.schedule_soon(0, 5).expect("schedule");
    scheduler.schedule_soon(0, 15).expect("schedule");
    scheduler.schedule_soon(1, 10).expect("schedule");

    scheduler.cancel(0);
    assert_eq!(scheduler.cycles_until(0), Some(15));

    scheduler.advance(&mut trace, 20).expect("advance");
    assert_eq!(trace.fired, vec![1, 0]);

    scheduler.cancel(0);
    assert_eq!(scheduler.pending_len(), 0);
}
