//! Waitables driven through the scheduler

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use framecoro::runtime::scheduler::{ManualClock, WaitForSeconds, WaitForTicks, WaitUntil};
use framecoro::{from_fn, Fault, Scheduler, Step, TaskState, Waitable};

use crate::common::{drain, log, RecordingReporter};

#[test]
fn test_wait_for_seconds_follows_manual_clock() {
    let mut scheduler = Scheduler::new();
    let clock = ManualClock::new();
    let values = log();
    let sink = Rc::clone(&values);
    let timer = clock.clone();
    let mut waited = false;
    let task = scheduler.start(from_fn(move |_cx, resumed| {
        resumed?;
        if waited {
            sink.borrow_mut().push(1);
            return Ok(Step::Complete);
        }
        waited = true;
        Ok(Step::wait(WaitForSeconds::with_clock(timer.clone(), Duration::from_millis(100))))
    }));

    let frame = Duration::from_millis(16);
    let mut frames = 0;
    while scheduler.has_live_tasks() {
        scheduler.advance_all();
        clock.advance(frame);
        frames += 1;
    }

    assert_eq!(*values.borrow(), vec![1]);
    assert_eq!(task.state(), TaskState::Completed);
    // 100ms at 16ms per frame is ready on the poll after the seventh advance.
    assert_eq!(frames, 8);
}

#[test]
fn test_wait_for_ticks_resumes_after_count() {
    let mut scheduler = Scheduler::new();
    let resumed_at = Rc::new(Cell::new(0));
    let probe = Rc::clone(&resumed_at);
    let ticks = Rc::new(Cell::new(0_u64));
    let counter = Rc::clone(&ticks);
    let mut waited = false;
    scheduler.start(from_fn(move |_cx, resumed| {
        resumed?;
        counter.set(counter.get() + 1);
        if waited {
            probe.set(counter.get());
            return Ok(Step::Complete);
        }
        waited = true;
        Ok(Step::wait(WaitForTicks(3)))
    }));

    drain(&mut scheduler);
    // Runs on tick 1, parks for ticks 2 and 3, resumes on tick 4.
    assert_eq!(ticks.get(), 2);
    assert_eq!(resumed_at.get(), 2);
    assert_eq!(scheduler.tick_count(), 4);
}

#[test]
fn test_wait_until_gate() {
    let mut scheduler = Scheduler::new();
    let gate = Rc::new(Cell::new(false));
    let open = Rc::clone(&gate);
    let mut waited = false;
    let task = scheduler.start(from_fn(move |_cx, resumed| {
        resumed?;
        if waited {
            return Ok(Step::Complete);
        }
        waited = true;
        let open = Rc::clone(&open);
        Ok(Step::wait(WaitUntil(move || open.get())))
    }));

    for _ in 0..10 {
        scheduler.advance_all();
    }
    assert_eq!(task.state(), TaskState::Pending);

    gate.set(true);
    scheduler.advance_all();
    assert_eq!(task.state(), TaskState::Completed);
}

struct Broken;

impl Waitable for Broken {
    fn is_ready(&mut self) -> bool {
        true
    }

    fn error(&mut self) -> Option<Fault> {
        Some(Fault::msg("request failed"))
    }
}

#[test]
fn test_waitable_error_faults_task_and_is_reported() {
    let reporter = RecordingReporter::default();
    let mut scheduler = Scheduler::new().with_reporter(reporter.clone());
    let mut waited = false;
    let task = scheduler.start(from_fn(move |_cx, resumed| {
        resumed?;
        if waited {
            return Ok(Step::Complete);
        }
        waited = true;
        Ok(Step::wait(Broken))
    }));

    drain(&mut scheduler);
    let fault = task.fault().expect("task faulted");
    assert!(!fault.is_propagated());
    assert_eq!(fault.to_string(), "request failed");
    assert_eq!(reporter.count.get(), 1);
}

#[test]
fn test_yielded_value_resumes_next_tick() {
    let mut scheduler = Scheduler::new();
    let values = log();
    let sink = Rc::clone(&values);
    let mut step = 0;
    scheduler.start(from_fn(move |_cx, resumed| {
        resumed?;
        step += 1;
        sink.borrow_mut().push(step);
        if step == 3 {
            return Ok(Step::Complete);
        }
        Ok(Step::value(format!("progress {}", step)))
    }));

    scheduler.advance_all();
    assert_eq!(*values.borrow(), vec![1]);
    scheduler.advance_all();
    assert_eq!(*values.borrow(), vec![1, 2]);
    scheduler.advance_all();
    assert!(!scheduler.has_live_tasks());
}
