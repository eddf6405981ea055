//! Statistics - run accounting for finished threads
//!
//! Owned by the scheduler: reset when it is built, folded into on every
//! thread finish, finalized into a `StatsReport` at shutdown.

use crate::time::Ticks;
use core::fmt;

/// Aggregated run statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStatistics {
    /// Threads that finished
    pub finished: u64,

    /// Sum of per-thread total wait time
    pub total_wait: Ticks,

    /// Sum of per-thread turnaround (finish - arrival)
    pub total_turnaround: Ticks,

    /// Largest total wait of a single finished thread
    pub max_wait: Ticks,
}

impl RunStatistics {
    pub const fn new() -> Self {
        Self {
            finished: 0,
            total_wait: 0,
            total_turnaround: 0,
            max_wait: 0,
        }
    }

    /// Forget everything recorded so far
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Count a finished thread that never reached a queue
    pub fn record_unarrived(&mut self) {
        self.finished += 1;
    }

    /// Fold one finished thread into the totals
    pub fn record_finish(&mut self, wait: Ticks, turnaround: Ticks) {
        self.finished += 1;
        self.total_wait += wait;
        self.total_turnaround += turnaround;
        self.max_wait = self.max_wait.max(wait);
    }

    /// Average wait, rounded to nearest
    pub fn avg_wait(&self) -> Ticks {
        rounded_div(self.total_wait, self.finished)
    }

    /// Average turnaround, rounded to nearest
    pub fn avg_turnaround(&self) -> Ticks {
        rounded_div(self.total_turnaround, self.finished)
    }

    /// Freeze the current totals
    pub fn report(&self) -> StatsReport {
        StatsReport {
            finished: self.finished,
            avg_wait: self.avg_wait(),
            max_wait: self.max_wait,
            avg_turnaround: self.avg_turnaround(),
        }
    }
}

fn rounded_div(total: u64, count: u64) -> u64 {
    if count > 0 {
        (total + count / 2) / count
    } else {
        0
    }
}

/// End-of-run summary
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsReport {
    pub finished: u64,
    pub avg_wait: Ticks,
    pub max_wait: Ticks,
    pub avg_turnaround: Ticks,
}

impl fmt::Display for StatsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "System,{},{},{},{}",
            self.finished, self.avg_wait, self.max_wait, self.avg_turnaround
        )
    }
}
