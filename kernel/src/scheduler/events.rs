//! Scheduler events and statistics sinks
//!
//! Every enqueue, dispatch, finish and lock transition produces a
//! `SchedEvent`. Its `Display` form is the line written to the statistics
//! log; where the lines go is up to the `StatsSink`.

use crate::scheduler::donation::LockId;
use crate::scheduler::thread::{FinishRecord, ThreadHandle, ThreadId};
use crate::scheduler::{Priority, StatsReport};
use crate::time::Ticks;
use alloc::string::{String, ToString};
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;
use spin::Mutex;

/// Lock transition kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockAction {
    /// Thread started waiting
    Wait,
    /// Thread became holder
    Acquired,
    /// Holder gave the lock up
    Released,
}

impl LockAction {
    fn tag(&self) -> char {
        match self {
            Self::Wait => 'W',
            Self::Acquired => 'A',
            Self::Released => 'R',
        }
    }
}

/// One statistics record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedEvent {
    Scheduled {
        time: Ticks,
        thread: ThreadHandle,
        priority: Priority,
    },
    Enqueued {
        time: Ticks,
        thread: ThreadHandle,
        priority: Priority,
    },
    Finished {
        thread: ThreadHandle,
        record: FinishRecord,
    },
    Lock {
        action: LockAction,
        lock: LockId,
        time: Ticks,
        thread: ThreadId,
        priority: Priority,
    },
    System(StatsReport),
}

impl fmt::Display for SchedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scheduled { time, thread, priority } => {
                write!(f, "{},{},{}", time, thread, priority)
            }
            Self::Enqueued { time, thread, priority } => {
                write!(f, "Q,{},{},{}", time, thread, priority)
            }
            Self::Finished { thread, record } => write!(
                f,
                "{},{},{},{},{}",
                thread, record.arrival, record.run, record.wait, record.finish
            ),
            Self::Lock { action, lock, time, thread, priority } => write!(
                f,
                "{},lock#{},{},{},{}",
                action.tag(),
                lock.0,
                time,
                thread,
                priority
            ),
            Self::System(report) => write!(f, "{}", report),
        }
    }
}

/// Destination of statistics records
pub trait StatsSink: Send {
    fn record(&mut self, event: &SchedEvent);
}

/// Forwards records to the `log` facade (target `sched::stats`)
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl StatsSink for LogSink {
    fn record(&mut self, event: &SchedEvent) {
        log::info!(target: "sched::stats", "{}", event);
    }
}

/// Drops everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl StatsSink for NullSink {
    fn record(&mut self, _event: &SchedEvent) {}
}

/// Keeps rendered lines in a shared buffer
///
/// Clones share the buffer, so a test can hand one clone to the scheduler
/// and read the lines back through another.
#[derive(Debug, Default, Clone)]
pub struct BufferSink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every line recorded so far
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    /// Take every line recorded so far
    pub fn drain(&self) -> Vec<String> {
        core::mem::take(&mut *self.lines.lock())
    }

    pub fn len(&self) -> usize {
        self.lines.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.lock().is_empty()
    }
}

impl StatsSink for BufferSink {
    fn record(&mut self, event: &SchedEvent) {
        self.lines.lock().push(event.to_string());
    }
}
