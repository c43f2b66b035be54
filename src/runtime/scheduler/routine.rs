//! Routines: the resumable bodies tasks drive.
//!
//! A routine is an explicit state machine. Each call to
//! [`Routine::resume`] runs it up to its next suspension point and reports
//! one of three outcomes: it yielded, it finished, or it raised.
//!
//! ```
//! use framecoro::runtime::scheduler::{from_fn, Scheduler, Step};
//!
//! let mut scheduler = Scheduler::new();
//! let mut remaining = 3;
//! let task = scheduler.start(from_fn(move |_cx, resumed| {
//!     resumed?;
//!     if remaining == 0 {
//!         return Ok(Step::Complete);
//!     }
//!     remaining -= 1;
//!     Ok(Step::next())
//! }));
//!
//! while scheduler.has_live_tasks() {
//!     scheduler.advance_all();
//! }
//! assert!(task.is_completed());
//! ```

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::error::{Fault, SchedulerError};
use super::task::{Target, Task, TaskBuilder};
use super::wait::Waitable;
use super::Scheduler;

/// A value produced at a suspension point.
pub enum Yield {
    /// Plain yield; resume on the next tick.
    Next,
    /// Resume once the task completes. Its fault, if any, is raised in the
    /// awaiting routine.
    Task(Task),
    /// Resume once the host waitable is ready.
    Wait(Box<dyn Waitable>),
    /// Payload the scheduler does not interpret; behaves like [`Yield::Next`].
    Value(Box<dyn Any>),
}

impl fmt::Debug for Yield {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Yield::Next => f.write_str("Next"),
            Yield::Task(task) => f.debug_tuple("Task").field(task).finish(),
            Yield::Wait(_) => f.write_str("Wait"),
            Yield::Value(_) => f.write_str("Value"),
        }
    }
}

impl From<Task> for Yield {
    fn from(task: Task) -> Self {
        Yield::Task(task)
    }
}

impl From<&Task> for Yield {
    fn from(task: &Task) -> Self {
        Yield::Task(task.clone())
    }
}

/// Outcome of one resumption.
#[derive(Debug)]
pub enum Step {
    /// Suspended on the given value.
    Yield(Yield),
    /// The routine has no further steps.
    Complete,
}

impl Step {
    /// Plain yield.
    #[inline]
    pub fn next() -> Self {
        Step::Yield(Yield::Next)
    }

    /// Await another task.
    #[inline]
    pub fn await_task(task: &Task) -> Self {
        Step::Yield(Yield::Task(task.clone()))
    }

    /// Await a host waitable.
    #[inline]
    pub fn wait<W: Waitable + 'static>(waitable: W) -> Self {
        Step::Yield(Yield::Wait(Box::new(waitable)))
    }

    /// Yield an opaque payload.
    #[inline]
    pub fn value<T: Any>(value: T) -> Self {
        Step::Yield(Yield::Value(Box::new(value)))
    }
}

/// Body of a task.
pub trait Routine {
    /// Run to the next suspension point.
    ///
    /// `resumed` is `Err` when the suspension this routine was parked on
    /// completed with a fault. Handle it, or re-raise it with `resumed?`.
    fn resume(
        &mut self,
        cx: &mut Cx<'_>,
        resumed: Result<(), Fault>,
    ) -> Result<Step, Fault>;
}

/// Shared routine handle. Registration checks these by pointer identity.
pub type SharedRoutine = Rc<RefCell<dyn Routine>>;

/// Box a routine into a fresh shared handle.
pub fn shared<R: Routine + 'static>(routine: R) -> SharedRoutine {
    Rc::new(RefCell::new(routine))
}

/// Address used as the registration key of a shared routine.
#[inline]
pub(crate) fn routine_key(routine: &SharedRoutine) -> usize {
    Rc::as_ptr(routine) as *const () as usize
}

/// Routine backed by a closure.
pub struct FnRoutine<F>(pub F);

impl<F> Routine for FnRoutine<F>
where
    F: FnMut(&mut Cx<'_>, Result<(), Fault>) -> Result<Step, Fault>,
{
    fn resume(
        &mut self,
        cx: &mut Cx<'_>,
        resumed: Result<(), Fault>,
    ) -> Result<Step, Fault> {
        (self.0)(cx, resumed)
    }
}

/// Build a routine from a closure.
pub fn from_fn<F>(f: F) -> FnRoutine<F>
where
    F: FnMut(&mut Cx<'_>, Result<(), Fault>) -> Result<Step, Fault>,
{
    FnRoutine(f)
}

/// Routine that yields every item of an iterator, then completes.
///
/// A fault delivered from an awaited task is re-raised.
pub struct IterRoutine<I>(pub I);

impl<I> Routine for IterRoutine<I>
where
    I: Iterator<Item = Yield>,
{
    fn resume(
        &mut self,
        _cx: &mut Cx<'_>,
        resumed: Result<(), Fault>,
    ) -> Result<Step, Fault> {
        resumed?;
        Ok(self.0.next().map_or(Step::Complete, Step::Yield))
    }
}

/// Build a routine from an iterator of yields.
pub fn from_iter<I>(iter: I) -> IterRoutine<I::IntoIter>
where
    I: IntoIterator<Item = Yield>,
{
    IterRoutine(iter.into_iter())
}

/// Context handed to a routine while it runs.
pub struct Cx<'a> {
    scheduler: &'a mut Scheduler,
    task: &'a Task,
}

impl<'a> Cx<'a> {
    pub(crate) fn new(
        scheduler: &'a mut Scheduler,
        task: &'a Task,
    ) -> Self {
        Self { scheduler, task }
    }

    /// The task running this routine.
    #[inline]
    pub fn task(&self) -> &Task {
        self.task
    }

    /// The scheduler driving this routine.
    #[inline]
    pub fn scheduler(&mut self) -> &mut Scheduler {
        self.scheduler
    }

    /// Start a routine. It first runs on the next tick.
    pub fn start<R: Routine + 'static>(
        &mut self,
        routine: R,
    ) -> Task {
        self.scheduler.start(routine)
    }

    /// Start a routine grouped under `target`.
    pub fn start_for<R: Routine + 'static>(
        &mut self,
        target: Target,
        routine: R,
    ) -> Task {
        self.scheduler.start_for(target, routine)
    }

    /// Start a routine with builder options.
    pub fn start_with<R: Routine + 'static>(
        &mut self,
        builder: TaskBuilder,
        routine: R,
    ) -> Task {
        builder.start(self.scheduler, routine)
    }

    /// Start a shared routine handle.
    pub fn start_shared(
        &mut self,
        routine: SharedRoutine,
    ) -> Result<Task, SchedulerError> {
        self.scheduler.start_shared(routine)
    }

    /// Request that `task` stop at the start of the next tick.
    pub fn stop(
        &mut self,
        task: &Task,
    ) {
        self.scheduler.stop(task);
    }

    /// Request that every task under `target` stop at the start of the next tick.
    pub fn stop_target(
        &mut self,
        target: Target,
    ) {
        self.scheduler.stop_all_for_target(target);
    }

    /// Request that every live task stop at the start of the next tick.
    pub fn stop_all(&mut self) {
        self.scheduler.stop_all();
    }
}
