//! Errors raised by the scheduler and faults captured on tasks.

use std::fmt;
use std::sync::Arc;

use super::task::TaskId;

/// Errors returned synchronously by scheduler operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchedulerError {
    /// The routine instance is already driven by a live task.
    #[error("routine is already registered with {task}")]
    DuplicateRoutine { task: TaskId },
}

/// A terminal error captured on a task.
///
/// The underlying error is shared, so every level of an await chain refers to
/// the same value. `Routine` marks a fault raised by a routine body (reported
/// once); `Propagated` marks one re-surfaced from a nested task that has
/// already been reported.
#[derive(Clone, thiserror::Error)]
pub enum Fault {
    /// Raised by the routine body itself.
    #[error("{0}")]
    Routine(Arc<anyhow::Error>),
    /// Re-surfaced from an awaited task.
    #[error("nested task faulted: {0}")]
    Propagated(Arc<anyhow::Error>),
}

impl Fault {
    /// Wrap an error raised by a routine body.
    pub fn new(err: impl Into<anyhow::Error>) -> Self {
        Fault::Routine(Arc::new(err.into()))
    }

    /// Build a fault from a plain message.
    pub fn msg<M>(msg: M) -> Self
    where
        M: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        Fault::Routine(Arc::new(anyhow::Error::msg(msg)))
    }

    /// The underlying error.
    #[inline]
    pub fn error(&self) -> &anyhow::Error {
        match self {
            Fault::Routine(e) | Fault::Propagated(e) => e,
        }
    }

    /// Whether this fault was re-surfaced from a nested task.
    #[inline]
    pub fn is_propagated(&self) -> bool {
        matches!(self, Fault::Propagated(_))
    }

    /// The form this fault takes when raised inside an awaiting routine.
    pub fn propagated(&self) -> Fault {
        match self {
            Fault::Routine(e) | Fault::Propagated(e) => Fault::Propagated(Arc::clone(e)),
        }
    }

    /// True if both faults carry the same underlying error instance.
    pub fn same_origin(
        &self,
        other: &Fault,
    ) -> bool {
        Arc::ptr_eq(self.shared(), other.shared())
    }

    /// Downcast the underlying error.
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        self.error().downcast_ref::<E>()
    }

    fn shared(&self) -> &Arc<anyhow::Error> {
        match self {
            Fault::Routine(e) | Fault::Propagated(e) => e,
        }
    }
}

impl fmt::Debug for Fault {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Fault::Routine(e) => f.debug_tuple("Routine").field(&format_args!("{:#}", e)).finish(),
            Fault::Propagated(e) => f
                .debug_tuple("Propagated")
                .field(&format_args!("{:#}", e))
                .finish(),
        }
    }
}
