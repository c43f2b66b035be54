//! Resolved suspension points.
//!
//! Every value a routine yields is resolved exactly once, right after it is
//! produced, into one of a small closed set of suspensions that the task
//! polls on later ticks.

use std::fmt;

use super::error::Fault;
use super::routine::Yield;
use super::task::Task;
use super::wait::Waitable;

/// Result of polling a suspension.
#[derive(Debug, Clone)]
pub enum Readiness {
    /// Not ready; the task stays parked this tick.
    Pending,
    /// Ready to resume, carrying the error to raise in the routine, if any.
    Ready(Option<Fault>),
}

/// What a task is currently parked on.
pub enum Suspension {
    /// Always ready.
    Immediate,
    /// Ready once the awaited task completes.
    Nested(Task),
    /// Host-provided waitable.
    Waitable(Box<dyn Waitable>),
}

impl Suspension {
    /// Resolve a yielded value.
    pub fn resolve(value: Yield) -> Self {
        match value {
            Yield::Next | Yield::Value(_) => Suspension::Immediate,
            Yield::Task(task) => Suspension::Nested(task),
            Yield::Wait(waitable) => Suspension::Waitable(waitable),
        }
    }

    /// Check whether the task parked here may resume.
    pub fn poll(&mut self) -> Readiness {
        match self {
            Suspension::Immediate => Readiness::Ready(None),
            Suspension::Nested(task) => match task.completion() {
                Some(fault) => Readiness::Ready(fault.map(|f| f.propagated())),
                None => Readiness::Pending,
            },
            Suspension::Waitable(waitable) => {
                if waitable.is_ready() {
                    Readiness::Ready(waitable.error())
                } else {
                    Readiness::Pending
                }
            }
        }
    }
}

impl fmt::Debug for Suspension {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Suspension::Immediate => f.write_str("Immediate"),
            Suspension::Nested(task) => match task.try_id() {
                Some(id) => write!(f, "Nested({})", id),
                None => f.write_str("Nested(<self>)"),
            },
            Suspension::Waitable(_) => f.write_str("Waitable"),
        }
    }
}
