//! framecoro
//!
//! A single-threaded cooperative coroutine scheduler meant to be embedded in
//! a host loop. The host calls [`Scheduler::advance_all`] once per frame;
//! every live task is resumed exactly once per call, in start order.
//!
//! # Example
//!
//! ```
//! use framecoro::{from_fn, Scheduler, Step};
//!
//! let mut scheduler = Scheduler::new();
//! let child = scheduler.start(from_fn(|_cx, _| Ok(Step::Complete)));
//! let mut awaited = false;
//! scheduler.start(from_fn(move |_cx, resumed| {
//!     resumed?;
//!     if awaited {
//!         return Ok(Step::Complete);
//!     }
//!     awaited = true;
//!     Ok(Step::await_task(&child))
//! }));
//!
//! while scheduler.has_live_tasks() {
//!     scheduler.advance_all();
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/framecoro")]
#![warn(rust_2018_idioms)]

// Public modules
pub mod runtime;

// Utility modules
pub mod util;

// Re-exports
pub use runtime::scheduler::{
    from_fn, from_iter, Cx, Fault, FaultReporter, Routine, Scheduler, SchedulerConfig, SchedulerError,
    SchedulerStats, Step, Target, Task, TaskBuilder, TaskId, TaskState, TeardownPolicy, Waitable, Yield,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = "framecoro";
