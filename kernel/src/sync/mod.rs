//! Synchronization primitives
//!
//! The scheduler's only synchronization is the atomic region: interrupts
//! off while its structures are touched. Mutual-exclusion locks with
//! priority donation live in `scheduler::donation`.

pub mod interrupt;

pub use interrupt::{InterruptController, InterruptGuard, SimInterrupts};
