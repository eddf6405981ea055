//! Scheduler subsystem
//!
//! Priority scheduling for one cooperative CPU: strict, aging and
//! multi-level feedback ready queues, aging-based anti-starvation and
//! priority donation through locks.
//!
//! Lower priority value = more urgent, everywhere.

pub mod aging;
pub mod core;
pub mod donation;
pub mod events;
pub mod idle;
pub mod queue;
pub mod switch;
pub mod thread;

/// Scheduling priority; lower is more urgent
pub type Priority = i32;

// Re-exports
pub use self::core::{
    RunStatistics, Scheduler, SchedulerError, SchedulerResult, StatsReport,
};
pub use aging::AgingEngine;
pub use donation::{AcquireOutcome, LockId};
pub use events::{BufferSink, LockAction, LogSink, NullSink, SchedEvent, StatsSink};
pub use idle::IdleTask;
pub use queue::{Band, PriorityWaitQueue, QueueId, QueuePolicy};
pub use switch::{RunState, SimCpu, ThreadControl};
pub use thread::{SchedulingState, ThreadFlags, ThreadHandle, ThreadId};
