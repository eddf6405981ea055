//! Kernel clock
//!
//! Monotonic tick source consulted by the scheduler for wait/run
//! accounting and aging. Ticks count from kernel start.

use core::sync::atomic::{AtomicU64, Ordering};

/// Clock ticks since kernel start
pub type Ticks = u64;

/// Monotonic time source
pub trait Clock: Send + Sync {
    /// Ticks elapsed since kernel start; never decreases
    fn now(&self) -> Ticks;
}

/// Manually driven clock for simulation and tests
///
/// Time only moves when the harness says so, which keeps aging and
/// accounting results exact.
#[derive(Debug, Default)]
pub struct ManualClock {
    ticks: AtomicU64,
}

impl ManualClock {
    /// Create a clock at tick 0
    pub const fn new() -> Self {
        Self {
            ticks: AtomicU64::new(0),
        }
    }

    /// Create a clock starting at `ticks`
    pub const fn starting_at(ticks: Ticks) -> Self {
        Self {
            ticks: AtomicU64::new(ticks),
        }
    }

    /// Move time forward by `delta` ticks, returning the new time
    pub fn advance(&self, delta: Ticks) -> Ticks {
        self.ticks.fetch_add(delta, Ordering::AcqRel) + delta
    }

    /// Jump to `ticks`; earlier values are ignored to stay monotonic
    pub fn set(&self, ticks: Ticks) {
        self.ticks.fetch_max(ticks, Ordering::AcqRel);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Ticks {
        self.ticks.load(Ordering::Acquire)
    }
}
