//! Host-provided waitables.
//!
//! Anything a routine yields through [`Yield::Wait`](super::routine::Yield::Wait)
//! satisfies the minimal [`Waitable`] contract: a readiness flag and an
//! optional error slot. The scheduler only ever polls them.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use std::time::{Duration, Instant};

use super::error::Fault;

/// A pollable suspension supplied by the host.
pub trait Waitable {
    /// Polled once per tick while a task is parked on this waitable.
    fn is_ready(&mut self) -> bool;

    /// Error to raise inside the routine once ready.
    fn error(&mut self) -> Option<Fault> {
        None
    }
}

/// Source of elapsed time for [`WaitForSeconds`].
pub trait Clock {
    /// Monotonic time since an arbitrary origin.
    fn now(&self) -> Duration;
}

/// Wall clock backed by [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Clock advanced explicitly by the host, typically once per frame.
///
/// Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move time forward.
    pub fn advance(
        &self,
        by: Duration,
    ) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }
}

/// Ready once `duration` has elapsed on `clock`, measured from creation.
pub struct WaitForSeconds<C: Clock = SystemClock> {
    clock: C,
    deadline: Duration,
}

impl WaitForSeconds<SystemClock> {
    /// Wait on the wall clock.
    ///
    /// Negative or NaN durations are ready at once; durations too long to
    /// represent never become ready.
    pub fn new(seconds: f64) -> Self {
        let duration = Duration::try_from_secs_f64(seconds.max(0.0)).unwrap_or(Duration::MAX);
        Self::with_clock(SystemClock::new(), duration)
    }
}

impl<C: Clock> WaitForSeconds<C> {
    /// Wait on a host clock.
    pub fn with_clock(
        clock: C,
        duration: Duration,
    ) -> Self {
        let deadline = clock.now().saturating_add(duration);
        Self { clock, deadline }
    }

    /// Time left before the wait is ready.
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_sub(self.clock.now())
    }
}

impl<C: Clock> Waitable for WaitForSeconds<C> {
    fn is_ready(&mut self) -> bool {
        self.clock.now() >= self.deadline
    }
}

impl<C: Clock> fmt::Debug for WaitForSeconds<C> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("WaitForSeconds")
            .field("remaining", &self.remaining())
            .finish()
    }
}

/// Ready on the `n`-th poll. `WaitForTicks(1)` behaves like a plain yield.
#[derive(Debug, Clone, Copy)]
pub struct WaitForTicks(pub u32);

impl Waitable for WaitForTicks {
    fn is_ready(&mut self) -> bool {
        self.0 = self.0.saturating_sub(1);
        self.0 == 0
    }
}

/// Ready as soon as the predicate returns `true`.
pub struct WaitUntil<F>(pub F);

impl<F> Waitable for WaitUntil<F>
where
    F: FnMut() -> bool,
{
    fn is_ready(&mut self) -> bool {
        (self.0)()
    }
}
