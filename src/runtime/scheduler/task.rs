//! Task definitions for the scheduler.
//!
//! A [`Task`] wraps one routine's progress: the suspension it is parked on,
//! whether it has completed, and the fault it finished with, if any.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::trace;

use super::error::Fault;
use super::routine::{Cx, SharedRoutine, Step};
use super::suspension::{Readiness, Suspension};
use super::Scheduler;

/// Unique task identifier within one scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub usize);

impl TaskId {
    /// Get the inner value.
    #[inline]
    pub fn inner(&self) -> usize {
        self.0
    }
}

impl From<usize> for TaskId {
    fn from(val: usize) -> Self {
        Self(val)
    }
}

impl From<TaskId> for usize {
    fn from(val: TaskId) -> Self {
        val.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        write!(f, "Task({})", self.0)
    }
}

/// Observable task state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Task is parked on a suspension and will be polled next tick.
    Pending,
    /// Routine ran to exhaustion.
    Completed,
    /// Routine raised, or re-raised a nested fault.
    Faulted,
    /// Task was cancelled before finishing.
    Cancelled,
}

impl TaskState {
    /// Whether the state is terminal.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskState::Pending)
    }
}

/// What happens to a task when the host tears the scheduler's context down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TeardownPolicy {
    /// Cancel synchronously on teardown.
    #[default]
    Cancel,
    /// Keep running across teardown.
    Persist,
}

static NEXT_TARGET: AtomicU64 = AtomicU64::new(1);

/// Opaque owner handle used to stop a group of tasks at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Target(u64);

impl Target {
    /// Allocate a fresh target, distinct from every other `Target::new()`.
    pub fn new() -> Self {
        Target(NEXT_TARGET.fetch_add(1, Ordering::Relaxed))
    }

    /// Use a host-chosen key. Keys are not checked against `Target::new()` values.
    #[inline]
    pub const fn from_raw(raw: u64) -> Self {
        Target(raw)
    }

    /// Get the raw key.
    #[inline]
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for Target {
    fn default() -> Self {
        Self::new()
    }
}

struct TaskInner {
    id: TaskId,
    name: String,
    target: Option<Target>,
    policy: TeardownPolicy,
    /// `None` once the task has left the scheduler.
    routine: Option<SharedRoutine>,
    suspension: Suspension,
    completed: bool,
    cancelled: bool,
    fault: Option<Fault>,
}

/// Handle to a scheduled routine.
///
/// Handles are cheap to clone and compare by identity.
#[derive(Clone)]
pub struct Task {
    inner: Rc<RefCell<TaskInner>>,
}

impl std::fmt::Debug for Task {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self.inner.try_borrow() {
            Ok(inner) => f
                .debug_struct("Task")
                .field("id", &inner.id)
                .field("name", &inner.name)
                .field("target", &inner.target)
                .field("completed", &inner.completed)
                .field("cancelled", &inner.cancelled)
                .field("fault", &inner.fault)
                .finish(),
            Err(_) => f.debug_struct("Task").finish_non_exhaustive(),
        }
    }
}

impl PartialEq for Task {
    fn eq(
        &self,
        other: &Self,
    ) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Task {}

impl Task {
    pub(crate) fn new(
        id: TaskId,
        builder: TaskBuilder,
        routine: SharedRoutine,
    ) -> Self {
        let name = builder.name.unwrap_or_else(|| id.to_string());
        Self {
            inner: Rc::new(RefCell::new(TaskInner {
                id,
                name,
                target: builder.target,
                policy: builder.policy,
                routine: Some(routine),
                suspension: Suspension::Immediate,
                completed: false,
                cancelled: false,
                fault: None,
            })),
        }
    }

    /// Get the task ID.
    #[inline]
    pub fn id(&self) -> TaskId {
        self.inner.borrow().id
    }

    /// Get the task name.
    pub fn name(&self) -> String {
        self.inner.borrow().name.clone()
    }

    /// Get the bulk-cancellation target, if any.
    #[inline]
    pub fn target(&self) -> Option<Target> {
        self.inner.borrow().target
    }

    /// Get the teardown policy.
    #[inline]
    pub fn policy(&self) -> TeardownPolicy {
        self.inner.borrow().policy
    }

    /// Whether the task has finished, for any reason.
    #[inline]
    pub fn is_completed(&self) -> bool {
        self.inner.borrow().completed
    }

    /// Whether the task was cancelled before it finished on its own.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.inner.borrow().cancelled
    }

    /// The fault the task finished with, if any.
    pub fn fault(&self) -> Option<Fault> {
        self.inner.borrow().fault.clone()
    }

    /// Get the current state.
    pub fn state(&self) -> TaskState {
        let inner = self.inner.borrow();
        if !inner.completed {
            TaskState::Pending
        } else if inner.fault.is_some() {
            TaskState::Faulted
        } else if inner.cancelled {
            TaskState::Cancelled
        } else {
            TaskState::Completed
        }
    }

    /// The task this one is currently awaiting, if any.
    pub fn awaiting(&self) -> Option<Task> {
        match &self.inner.borrow().suspension {
            Suspension::Nested(task) => Some(task.clone()),
            _ => None,
        }
    }

    /// Advance the routine by one step.
    ///
    /// Returns `false` once the task has completed. A task whose suspension
    /// is not ready stays pending and returns `true` without running.
    pub fn move_next(
        &self,
        scheduler: &mut Scheduler,
    ) -> bool {
        let routine = {
            let mut inner = self.inner.borrow_mut();
            if inner.completed {
                return false;
            }
            match inner.routine.clone() {
                Some(routine) => routine,
                None => {
                    inner.completed = true;
                    return false;
                }
            }
        };

        // A routine that is already running further up the stack (the host
        // loop re-entered through `Cx::scheduler`) reads as pending.
        let Ok(mut body) = routine.try_borrow_mut() else {
            return true;
        };

        let resumed = match self.inner.borrow_mut().suspension.poll() {
            Readiness::Pending => return true,
            Readiness::Ready(None) => Ok(()),
            Readiness::Ready(Some(fault)) => Err(fault),
        };

        // No borrow on this task is held while the routine runs.
        let step = {
            let mut cx = Cx::new(scheduler, self);
            body.resume(&mut cx, resumed)
        };
        drop(body);

        let id = self.id();
        let fresh_fault = {
            let mut inner = self.inner.borrow_mut();
            match step {
                // Cancelled from inside its own step.
                Ok(_) if inner.completed => return false,
                Ok(Step::Yield(value)) => {
                    inner.suspension = Suspension::resolve(value);
                    trace!("{} yielded {:?}", id, inner.suspension);
                    return true;
                }
                Ok(Step::Complete) => {
                    inner.completed = true;
                    inner.suspension = Suspension::Immediate;
                    trace!("{} completed", id);
                    return false;
                }
                Err(fault) => {
                    if !inner.completed {
                        inner.completed = true;
                        inner.suspension = Suspension::Immediate;
                    }
                    let fresh = (!fault.is_propagated()).then(|| (inner.name.clone(), fault.clone()));
                    if inner.fault.is_none() {
                        inner.fault = Some(fault);
                    }
                    fresh
                }
            }
        };

        if let Some((name, fault)) = fresh_fault {
            scheduler.report_fault(id, &name, &fault);
        }
        false
    }

    /// Cancel the task and, depth-first, whatever it is awaiting.
    ///
    /// Never records a fault. Cancelling a finished task is a no-op.
    pub fn cancel(&self) {
        let nested = {
            let mut inner = self.inner.borrow_mut();
            if inner.completed {
                return;
            }
            // Marked before descending so await cycles terminate.
            inner.completed = true;
            inner.cancelled = true;
            trace!("{} cancelled", inner.id);
            match std::mem::replace(&mut inner.suspension, Suspension::Immediate) {
                Suspension::Nested(task) => Some(task),
                _ => None,
            }
        };
        if let Some(task) = nested {
            task.cancel();
        }
    }

    /// `Some(fault)` once completed, `None` while pending.
    ///
    /// A task that is mid-step reads as pending, so a task awaiting itself
    /// stays parked instead of resuming.
    pub(crate) fn completion(&self) -> Option<Option<Fault>> {
        let inner = self.inner.try_borrow().ok()?;
        inner.completed.then(|| inner.fault.clone())
    }

    /// Identity key, stable for as long as this handle lives.
    #[inline]
    pub(crate) fn key(&self) -> usize {
        Rc::as_ptr(&self.inner) as usize
    }

    pub(crate) fn try_id(&self) -> Option<TaskId> {
        self.inner.try_borrow().ok().map(|inner| inner.id)
    }

    /// Drop the routine once the task has left the live set.
    pub(crate) fn release(&self) -> Option<SharedRoutine> {
        self.inner.borrow_mut().routine.take()
    }
}

/// Task builder for starting tasks with non-default options.
#[derive(Debug, Default, Clone)]
pub struct TaskBuilder {
    name: Option<String>,
    target: Option<Target>,
    policy: TeardownPolicy,
}

impl TaskBuilder {
    /// Create a new task builder.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the task name.
    #[inline]
    pub fn name(
        mut self,
        name: impl Into<String>,
    ) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Group the task under a bulk-cancellation target.
    #[inline]
    pub fn target(
        mut self,
        target: Target,
    ) -> Self {
        self.target = Some(target);
        self
    }

    /// Set the teardown policy.
    #[inline]
    pub fn policy(
        mut self,
        policy: TeardownPolicy,
    ) -> Self {
        self.policy = policy;
        self
    }

    /// Start `routine` on `scheduler` with these options.
    pub fn start<R>(
        self,
        scheduler: &mut Scheduler,
        routine: R,
    ) -> Task
    where
        R: super::routine::Routine + 'static,
    {
        scheduler.insert(self, super::routine::shared(routine))
    }

    /// Start a shared routine handle, rejecting one that is already live.
    pub fn start_shared(
        self,
        scheduler: &mut Scheduler,
        routine: SharedRoutine,
    ) -> Result<Task, super::SchedulerError> {
        scheduler.register(self, routine)
    }
}

/// Generator for task IDs.
#[derive(Debug)]
pub struct TaskIdGenerator {
    next_id: usize,
}

impl TaskIdGenerator {
    /// Create a new task ID generator.
    #[inline]
    pub fn new() -> Self {
        Self { next_id: 0 }
    }

    /// Generate the next task ID.
    #[inline]
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> TaskId {
        let id = self.next_id;
        self.next_id += 1;
        TaskId(id)
    }
}

impl Default for TaskIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}
