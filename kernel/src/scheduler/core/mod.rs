//! Scheduler core module
//!
//! - `scheduler`: the dispatcher facade owning every registry
//! - `statistics`: run accounting, finalized at shutdown
//! - `error`: typed errors and the fatal assertion macro

pub mod error;
pub mod scheduler;
pub mod statistics;

pub use error::{SchedulerError, SchedulerResult};
pub use scheduler::Scheduler;
pub use statistics::{RunStatistics, StatsReport};
