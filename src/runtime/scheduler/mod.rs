//! Cooperative task scheduler
//!
//! This module provides the [`Scheduler`], a single-threaded cooperative
//! scheduler driven by the host once per frame through
//! [`Scheduler::advance_all`].
//!
//! # Architecture
//!
//! - [`Task`](task::Task) - One scheduled routine: progress, completion and fault
//! - [`Routine`](routine::Routine) - The resumable body a task drives
//! - [`Suspension`](suspension::Suspension) - What a parked task is waiting on
//! - [`Waitable`](wait::Waitable) - Host-provided suspension points
//! - [`Fault`](error::Fault) - Errors captured on tasks
//! - [`FaultReporter`](report::FaultReporter) - Host hook for uncaught faults
//!
//! Every task live at the start of a tick is resumed exactly once during it,
//! in the order tasks were started. Stop requests are applied at the start
//! of the next tick; host teardown is applied immediately.

pub mod error;
pub mod report;
pub mod routine;
pub mod suspension;
pub mod task;
pub mod wait;

pub use error::{Fault, SchedulerError};
pub use report::{FaultReporter, TracingReporter};
pub use routine::{from_fn, from_iter, shared, Cx, FnRoutine, IterRoutine, Routine, SharedRoutine, Step, Yield};
pub use suspension::{Readiness, Suspension};
pub use task::{Target, Task, TaskBuilder, TaskId, TaskIdGenerator, TaskState, TeardownPolicy};
pub use wait::{Clock, ManualClock, SystemClock, WaitForSeconds, WaitForTicks, WaitUntil, Waitable};

use hashbrown::{HashMap, HashSet};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tracing::{debug, trace};

use routine::routine_key;

/// Scheduler configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Capacity reserved for the live task list.
    #[serde(default = "default_initial_capacity")]
    pub initial_capacity: usize,
    /// Whether uncaught routine faults are handed to the reporter.
    #[serde(default = "default_report_faults")]
    pub report_faults: bool,
    /// Emit a trace event for every tick.
    #[serde(default)]
    pub trace_ticks: bool,
}

fn default_initial_capacity() -> usize {
    64
}

fn default_report_faults() -> bool {
    true
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            initial_capacity: default_initial_capacity(),
            report_faults: default_report_faults(),
            trace_ticks: false,
        }
    }
}

/// Scheduler statistics.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
    /// Total tasks started.
    pub tasks_started: u64,
    /// Tasks removed after running to exhaustion.
    pub tasks_completed: u64,
    /// Tasks removed after faulting.
    pub tasks_faulted: u64,
    /// Tasks removed after being cancelled.
    pub tasks_cancelled: u64,
    /// Calls to `advance_all`.
    pub ticks: u64,
}

impl SchedulerStats {
    /// Record a started task.
    #[inline]
    pub fn record_started(&mut self) {
        self.tasks_started += 1;
    }

    /// Record a task leaving the live set.
    pub fn record_finished(
        &mut self,
        state: TaskState,
    ) {
        match state {
            TaskState::Completed => self.tasks_completed += 1,
            TaskState::Faulted => self.tasks_faulted += 1,
            TaskState::Cancelled | TaskState::Pending => self.tasks_cancelled += 1,
        }
    }

    /// Tasks that have left the live set.
    #[inline]
    pub fn tasks_finished(&self) -> u64 {
        self.tasks_completed + self.tasks_faulted + self.tasks_cancelled
    }
}

/// Single-threaded cooperative scheduler.
///
/// Owned by the host for the lifetime of the context it drives; the host
/// calls [`advance_all`](Self::advance_all) once per frame and
/// [`on_host_teardown`](Self::on_host_teardown) when that context goes away.
pub struct Scheduler {
    /// Configuration.
    config: SchedulerConfig,
    /// Live tasks in start order.
    live: Vec<Task>,
    /// Routine address to the live task driving it.
    registered: HashMap<usize, TaskId>,
    /// Targets to stop on the next tick.
    stop_targets: HashSet<Target>,
    /// Tasks to stop on the next tick, keyed by handle identity.
    stop_tasks: IndexMap<usize, Task>,
    /// Task ID generator.
    ids: TaskIdGenerator,
    /// Receives uncaught routine faults.
    reporter: Box<dyn FaultReporter>,
    /// Statistics.
    stats: SchedulerStats,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("config", &self.config)
            .field("live", &self.live.len())
            .field("stop_targets", &self.stop_targets.len())
            .field("stop_tasks", &self.stop_tasks.len())
            .field("stats", &self.stats)
            .finish()
    }
}

impl Scheduler {
    /// Create a new scheduler with default config.
    #[inline]
    pub fn new() -> Self {
        Self::with_config(SchedulerConfig::default())
    }

    /// Create a scheduler with custom configuration.
    pub fn with_config(config: SchedulerConfig) -> Self {
        Self {
            live: Vec::with_capacity(config.initial_capacity),
            registered: HashMap::with_capacity(config.initial_capacity),
            stop_targets: HashSet::new(),
            stop_tasks: IndexMap::new(),
            ids: TaskIdGenerator::new(),
            reporter: Box::new(TracingReporter),
            stats: SchedulerStats::default(),
            config,
        }
    }

    /// Replace the fault reporter.
    pub fn with_reporter<R: FaultReporter + 'static>(
        mut self,
        reporter: R,
    ) -> Self {
        self.reporter = Box::new(reporter);
        self
    }

    /// Start a routine. It first runs on the next tick.
    pub fn start<R: Routine + 'static>(
        &mut self,
        routine: R,
    ) -> Task {
        self.insert(TaskBuilder::new(), shared(routine))
    }

    /// Start a routine grouped under `target`.
    pub fn start_for<R: Routine + 'static>(
        &mut self,
        target: Target,
        routine: R,
    ) -> Task {
        self.insert(TaskBuilder::new().target(target), shared(routine))
    }

    /// Start a shared routine handle.
    ///
    /// Fails if the same handle is already driven by a live task.
    pub fn start_shared(
        &mut self,
        routine: SharedRoutine,
    ) -> Result<Task, SchedulerError> {
        self.register(TaskBuilder::new(), routine)
    }

    /// Whether a shared routine handle is currently driven by a live task.
    pub fn is_registered(
        &self,
        routine: &SharedRoutine,
    ) -> bool {
        self.registered.contains_key(&routine_key(routine))
    }

    pub(crate) fn register(
        &mut self,
        builder: TaskBuilder,
        routine: SharedRoutine,
    ) -> Result<Task, SchedulerError> {
        if let Some(&task) = self.registered.get(&routine_key(&routine)) {
            return Err(SchedulerError::DuplicateRoutine { task });
        }
        Ok(self.insert(builder, routine))
    }

    /// Register a routine known not to be live.
    pub(crate) fn insert(
        &mut self,
        builder: TaskBuilder,
        routine: SharedRoutine,
    ) -> Task {
        let id = self.ids.next();
        self.registered.insert(routine_key(&routine), id);
        let task = Task::new(id, builder, routine);
        self.live.push(task.clone());
        self.stats.record_started();
        debug!("started {}", task.name());
        task
    }

    /// Request that `task` stop at the start of the next tick.
    ///
    /// Matched by handle identity; a task owned by another scheduler is
    /// never stopped here.
    pub fn stop(
        &mut self,
        task: &Task,
    ) {
        self.stop_tasks.insert(task.key(), task.clone());
    }

    /// Request that every task under `target` stop at the start of the next tick.
    pub fn stop_all_for_target(
        &mut self,
        target: Target,
    ) {
        self.stop_targets.insert(target);
    }

    /// Request that every task live right now stop at the start of the next tick.
    ///
    /// Tasks started after this call are not affected.
    pub fn stop_all(&mut self) {
        for task in &self.live {
            self.stop_tasks.insert(task.key(), task.clone());
        }
    }

    /// Whether any task is still live.
    #[inline]
    pub fn has_live_tasks(&self) -> bool {
        !self.live.is_empty()
    }

    /// Number of live tasks.
    #[inline]
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Live tasks in start order.
    #[inline]
    pub fn live_tasks(&self) -> &[Task] {
        &self.live
    }

    /// Get statistics.
    #[inline]
    pub fn stats(&self) -> &SchedulerStats {
        &self.stats
    }

    /// Number of `advance_all` calls made so far.
    ///
    /// Counted when a pass starts, so a routine sees the tick it runs in.
    #[inline]
    pub fn tick_count(&self) -> u64 {
        self.stats.ticks
    }

    /// Get the configuration.
    #[inline]
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Advance every live task by one step.
    ///
    /// Pending stop requests are applied first. Tasks started while this
    /// runs are first resumed on the next call. Finished tasks are removed
    /// at the end.
    pub fn advance_all(&mut self) {
        self.stats.ticks += 1;
        let stop_targets = std::mem::take(&mut self.stop_targets);
        let stop_tasks = std::mem::take(&mut self.stop_tasks);
        let snapshot: SmallVec<[Task; 16]> = self.live.iter().cloned().collect();

        if self.config.trace_ticks {
            trace!(
                "tick {}: {} live, {} stop requests, {} stopped targets",
                self.stats.ticks,
                snapshot.len(),
                stop_tasks.len(),
                stop_targets.len()
            );
        }

        let mut finished: HashSet<TaskId> = HashSet::new();
        for task in &snapshot {
            let id = task.id();
            let stopped = stop_tasks.contains_key(&task.key())
                || task.target().is_some_and(|target| stop_targets.contains(&target));
            if stopped {
                task.cancel();
                finished.insert(id);
            } else if !task.move_next(self) {
                finished.insert(id);
            }
        }

        if !finished.is_empty() {
            self.remove_where(|task| finished.contains(&task.id()));
        }
    }

    /// Cancel every task with [`TeardownPolicy::Cancel`] right now.
    ///
    /// Cancelled tasks leave the live set immediately and pending stop
    /// requests are dropped. Cancellation still cascades through await
    /// chains, so a persistent task awaited by a cancelled one is cancelled
    /// too and removed on the next tick.
    pub fn on_host_teardown(&mut self) {
        self.stop_targets.clear();
        self.stop_tasks.clear();
        let before = self.live.len();
        self.remove_where(|task| {
            if task.policy() == TeardownPolicy::Persist {
                return false;
            }
            task.cancel();
            true
        });
        debug!(
            "host teardown cancelled {} tasks, {} persist",
            before - self.live.len(),
            self.live.len()
        );
    }

    /// Cancel every live task regardless of policy and clear all registries.
    pub fn shutdown(&mut self) {
        self.stop_targets.clear();
        self.stop_tasks.clear();
        self.remove_where(|task| {
            task.cancel();
            true
        });
        self.registered.clear();
    }

    /// Hand an uncaught routine fault to the reporter.
    pub(crate) fn report_fault(
        &self,
        task: TaskId,
        name: &str,
        fault: &Fault,
    ) {
        if self.config.report_faults {
            self.reporter.report(task, name, fault);
        }
    }

    /// Drop matching tasks from the live set and release their routines.
    fn remove_where<F>(
        &mut self,
        mut remove: F,
    ) where
        F: FnMut(&Task) -> bool,
    {
        let registered = &mut self.registered;
        let stats = &mut self.stats;
        self.live.retain(|task| {
            if !remove(task) {
                return true;
            }
            if let Some(routine) = task.release() {
                registered.remove(&routine_key(&routine));
            }
            stats.record_finished(task.state());
            false
        });
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if self.has_live_tasks() {
            self.shutdown();
        }
    }
}
