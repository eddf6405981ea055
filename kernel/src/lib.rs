// src/lib.rs
// Point d'entrée de la bibliothèque du noyau
//! TeachOS kernel library.
//!
//! Cooperative, single-CPU priority scheduler for a teaching kernel:
//! - strict, aging and multi-level feedback wait queues
//! - per-thread scheduling state with wait/run accounting
//! - lock-mediated priority donation
//!
//! Hardware concerns (interrupt masking, clock, context switch) are reached
//! through the traits in [`sync`], [`time`] and [`scheduler::switch`]; host
//! simulations of each ship with the crate.

#![cfg_attr(not(test), no_std)] // Pas de bibliothèque standard (sauf tests unitaires)

// Import de alloc pour les allocations dynamiques
extern crate alloc;

pub mod config;
pub mod logger;
pub mod scheduler;
pub mod sync;
pub mod time;

pub use config::{QueuePolicyKind, SchedulerConfig};
pub use scheduler::{
    Priority, QueueId, Scheduler, SchedulerError, SchedulerResult, StatsReport, ThreadHandle,
    ThreadId,
};
