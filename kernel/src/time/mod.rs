//! Time management subsystem
//!
//! Provides the monotonic tick source used by the scheduler

pub mod clock;

// Re-exports
pub use clock::{Clock, ManualClock, Ticks};
