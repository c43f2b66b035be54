//! Reporting of uncaught routine faults.

use tracing::error;

use super::error::Fault;
use super::task::TaskId;

/// Host collaborator notified of faults raised by routine bodies.
///
/// Faults re-surfaced from a nested task are not reported again, so one
/// failure bubbling through an await chain is reported once.
pub trait FaultReporter {
    fn report(
        &self,
        task: TaskId,
        name: &str,
        fault: &Fault,
    );
}

/// Reports faults as `tracing` error events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl FaultReporter for TracingReporter {
    fn report(
        &self,
        task: TaskId,
        name: &str,
        fault: &Fault,
    ) {
        error!("{} ({}) faulted: {:#}", name, task, fault.error());
    }
}
