//! Scheduler Error Handling
//!
//! Recoverable failures (unknown identifiers, bad configuration) are typed
//! errors. Broken preconditions are not: they go through `sched_assert!` and
//! take the kernel down, since scheduler invariants can no longer be trusted.

use core::fmt;

/// Scheduler error types with detailed context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerError {
    // ═══════════════════════════════════════════════════════════════
    // Priority Errors
    // ═══════════════════════════════════════════════════════════════
    /// Priority outside the configured range
    InvalidPriority { value: i32, min: i32, max: i32 },

    // ═══════════════════════════════════════════════════════════════
    // Registry Errors
    // ═══════════════════════════════════════════════════════════════
    /// Thread has no scheduling state (never seen or already finished)
    ThreadNotFound { thread_id: u64 },

    /// Wait queue unknown to this scheduler
    QueueNotFound { queue_id: u64 },

    /// Lock unknown to this scheduler
    LockNotFound { lock_id: u64 },

    // ═══════════════════════════════════════════════════════════════
    // Configuration Errors
    // ═══════════════════════════════════════════════════════════════
    /// Configuration rejected
    InvalidConfig { reason: &'static str },

    // ═══════════════════════════════════════════════════════════════
    // Internal Errors (should never happen)
    // ═══════════════════════════════════════════════════════════════
    /// Internal scheduler invariant violated
    InternalError { reason: &'static str },
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidPriority { value, min, max } => {
                write!(f, "Priority {} outside [{}, {}]", value, min, max)
            }
            Self::ThreadNotFound { thread_id } => {
                write!(f, "Thread {} not found", thread_id)
            }
            Self::QueueNotFound { queue_id } => {
                write!(f, "Wait queue {} not found", queue_id)
            }
            Self::LockNotFound { lock_id } => {
                write!(f, "Lock {} not found", lock_id)
            }
            Self::InvalidConfig { reason } => {
                write!(f, "Invalid scheduler config: {}", reason)
            }
            Self::InternalError { reason } => {
                write!(f, "Internal scheduler error: {}", reason)
            }
        }
    }
}

impl SchedulerError {
    /// Get recovery hint for this error
    pub fn recovery_hint(&self) -> &'static str {
        match self {
            Self::InvalidPriority { .. } => "Clamp the value or use set_clamped_priority",
            Self::ThreadNotFound { .. } => "Thread may have already terminated",
            Self::QueueNotFound { .. } => "Queue ids are only valid for the scheduler that created them",
            Self::LockNotFound { .. } => "Lock ids are only valid for the scheduler that created them",
            Self::InvalidConfig { .. } => "Check the scheduler.* keys of the kernel config",
            Self::InternalError { .. } => "Report a scheduler bug",
        }
    }

    /// Is this a recoverable error?
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::InternalError { .. })
    }

    /// Should this error be logged?
    pub fn should_log(&self) -> bool {
        match self {
            Self::ThreadNotFound { .. } => false, // Common during cleanup
            _ => true,
        }
    }

    /// Get error severity (0-3)
    pub fn severity(&self) -> u8 {
        match self {
            Self::InternalError { .. } => 3, // Critical
            Self::InvalidConfig { .. } => 2, // Severe
            Self::QueueNotFound { .. } | Self::LockNotFound { .. } => 1, // Warning
            _ => 0,                          // Info
        }
    }
}

/// Result type for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Macro to log scheduler errors with context
#[macro_export]
macro_rules! sched_error {
    ($err:expr) => {{
        let err = $err;
        if err.should_log() {
            log::error!("[SCHED] Error: {} (hint: {})", err, err.recovery_hint());
        }
        err
    }};
}

/// Macro for critical scheduler assertions
#[macro_export]
macro_rules! sched_assert {
    ($cond:expr, $reason:expr) => {
        if !$cond {
            panic!("[SCHED CRITICAL] Invariant violated: {}", $reason);
        }
    };
    ($cond:expr, $fmt:expr, $($arg:tt)+) => {
        if !$cond {
            panic!("[SCHED CRITICAL] Invariant violated: {}", format_args!($fmt, $($arg)+));
        }
    };
}
