//! Routines and collaborators shared by the integration tests

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use framecoro::{Cx, Fault, FaultReporter, Routine, Scheduler, Step, TaskId};

pub type Log = Rc<RefCell<Vec<i32>>>;

pub fn log() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

/// Drive ticks until nothing is live. Returns the number of ticks.
pub fn drain(scheduler: &mut Scheduler) -> usize {
    let mut ticks = 0;
    while scheduler.has_live_tasks() {
        scheduler.advance_all();
        ticks += 1;
        assert!(ticks < 10_000, "scheduler did not drain");
    }
    ticks
}

/// Appends `next..=until` with a plain yield after each value.
pub struct GenerateUsingYield {
    pub log: Log,
    pub next: i32,
    pub until: i32,
}

impl Routine for GenerateUsingYield {
    fn resume(
        &mut self,
        _cx: &mut Cx<'_>,
        resumed: Result<(), Fault>,
    ) -> Result<Step, Fault> {
        resumed?;
        if self.next > self.until {
            return Ok(Step::Complete);
        }
        self.log.borrow_mut().push(self.next);
        self.next += 1;
        Ok(Step::next())
    }
}

/// Appends `initial`, then awaits a nested copy of itself for `initial + 1`.
pub struct GenerateUsingNested {
    pub log: Log,
    pub initial: i32,
    pub until: i32,
    pub started: bool,
}

impl GenerateUsingNested {
    pub fn new(
        log: &Log,
        initial: i32,
        until: i32,
    ) -> Self {
        Self {
            log: Rc::clone(log),
            initial,
            until,
            started: false,
        }
    }
}

impl Routine for GenerateUsingNested {
    fn resume(
        &mut self,
        cx: &mut Cx<'_>,
        resumed: Result<(), Fault>,
    ) -> Result<Step, Fault> {
        resumed?;
        if self.started || self.initial > self.until {
            return Ok(Step::Complete);
        }
        self.started = true;
        self.log.borrow_mut().push(self.initial);
        let nested = cx.start(GenerateUsingNested::new(&self.log, self.initial + 1, self.until));
        Ok(Step::await_task(&nested))
    }
}

/// Appends `value` twice, yielding in between.
pub struct DoubleAdd {
    pub log: Log,
    pub value: i32,
    pub step: u8,
}

impl Routine for DoubleAdd {
    fn resume(
        &mut self,
        _cx: &mut Cx<'_>,
        resumed: Result<(), Fault>,
    ) -> Result<Step, Fault> {
        resumed?;
        self.step += 1;
        match self.step {
            1 => {
                self.log.borrow_mut().push(self.value);
                Ok(Step::next())
            }
            2 => {
                self.log.borrow_mut().push(self.value);
                Ok(Step::Complete)
            }
            _ => Ok(Step::Complete),
        }
    }
}

/// Error raised by [`AddAndThrow`].
#[derive(Debug, thiserror::Error)]
#[error("operation is not valid due to the current state of the object")]
pub struct InvalidOperation;

/// Appends `next..` and raises [`InvalidOperation`] on the step where `next == fail_at`.
pub struct AddAndThrow {
    pub log: Log,
    pub next: i32,
    pub fail_at: i32,
}

impl Routine for AddAndThrow {
    fn resume(
        &mut self,
        _cx: &mut Cx<'_>,
        resumed: Result<(), Fault>,
    ) -> Result<Step, Fault> {
        resumed?;
        if self.next == self.fail_at {
            return Err(Fault::new(InvalidOperation));
        }
        self.log.borrow_mut().push(self.next);
        self.next += 1;
        Ok(Step::next())
    }
}

/// Awaits an [`AddAndThrow`], then appends `after`. A nested fault is re-raised instead.
pub struct NestedAddAndThrow {
    pub log: Log,
    pub fail_at: i32,
    pub after: i32,
    pub started: bool,
}

impl Routine for NestedAddAndThrow {
    fn resume(
        &mut self,
        cx: &mut Cx<'_>,
        resumed: Result<(), Fault>,
    ) -> Result<Step, Fault> {
        resumed?;
        if !self.started {
            self.started = true;
            let nested = cx.start(AddAndThrow {
                log: Rc::clone(&self.log),
                next: 0,
                fail_at: self.fail_at,
            });
            return Ok(Step::await_task(&nested));
        }
        self.log.borrow_mut().push(self.after);
        Ok(Step::Complete)
    }
}

/// Records every reported fault.
#[derive(Clone, Default)]
pub struct RecordingReporter {
    pub reports: Rc<RefCell<Vec<(TaskId, Fault)>>>,
    pub count: Rc<Cell<usize>>,
}

impl FaultReporter for RecordingReporter {
    fn report(
        &self,
        task: TaskId,
        _name: &str,
        fault: &Fault,
    ) {
        self.count.set(self.count.get() + 1);
        self.reports.borrow_mut().push((task, fault.clone()));
    }
}
