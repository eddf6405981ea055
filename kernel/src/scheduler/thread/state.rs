//! State - per-thread scheduling record
//!
//! Base and effective priority, wait/run accounting and the registry links
//! (held locks, blocking lock, queue) of one thread. Created lazily on first
//! access, dropped when the thread finishes.
//!
//! Invariant: `effective == min(base, donation floor)`, where the floor is
//! the best priority donated through any held lock.

use super::thread::ThreadHandle;
use crate::config::SchedulerConfig;
use crate::scheduler::core::statistics::RunStatistics;
use crate::scheduler::donation::LockId;
use crate::scheduler::queue::QueueId;
use crate::scheduler::Priority;
use crate::time::Ticks;
use alloc::vec::Vec;

/// Accounting snapshot produced when a thread finishes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinishRecord {
    pub arrival: Ticks,
    pub run: Ticks,
    pub wait: Ticks,
    pub finish: Ticks,
}

/// Scheduling state of one thread
#[derive(Debug, Clone)]
pub struct SchedulingState {
    handle: ThreadHandle,

    base_priority: Priority,
    effective_priority: Priority,

    /// Best donated priority and the held lock providing it
    donation: Option<(Priority, LockId)>,

    // Accounting (None = never happened)
    arrival_time: Option<Ticks>,
    last_scheduled: Option<Ticks>,
    last_enqueued: Option<Ticks>,
    total_run_time: Ticks,
    total_wait_time: Ticks,

    // Aging carry; always < aging interval
    pub(crate) uncounted_run_time: Ticks,
    pub(crate) uncounted_wait_time: Ticks,
    pub(crate) last_run_age: Option<Ticks>,
    pub(crate) last_wait_age: Option<Ticks>,

    // Registry links
    held_locks: Vec<LockId>,
    blocked_on: Option<LockId>,
    queued_on: Option<QueueId>,
}

impl SchedulingState {
    pub fn new(handle: ThreadHandle, priority: Priority) -> Self {
        Self {
            handle,
            base_priority: priority,
            effective_priority: priority,
            donation: None,
            arrival_time: None,
            last_scheduled: None,
            last_enqueued: None,
            total_run_time: 0,
            total_wait_time: 0,
            uncounted_run_time: 0,
            uncounted_wait_time: 0,
            last_run_age: None,
            last_wait_age: None,
            held_locks: Vec::new(),
            blocked_on: None,
            queued_on: None,
        }
    }

    #[inline]
    pub fn handle(&self) -> &ThreadHandle {
        &self.handle
    }

    #[inline]
    pub fn priority(&self) -> Priority {
        self.base_priority
    }

    #[inline]
    pub fn effective_priority(&self) -> Priority {
        self.effective_priority
    }

    /// Set base priority; `priority` must lie in the configured range
    ///
    /// Returns true if the effective priority changed.
    pub fn set_priority(&mut self, priority: Priority, config: &SchedulerConfig) -> bool {
        crate::sched_assert!(
            config.in_range(priority),
            "priority {} outside [{}, {}] for {}",
            priority,
            config.priority_min,
            config.priority_max,
            self.handle
        );
        self.base_priority = priority;
        self.refresh_effective()
    }

    /// Set base priority after clamping into the configured range
    pub fn set_clamped_priority(&mut self, priority: Priority, config: &SchedulerConfig) -> bool {
        self.set_priority(config.clamp(priority), config)
    }

    /// Install the donation floor computed from the held locks
    ///
    /// Returns true if the effective priority changed.
    pub(crate) fn set_donation(&mut self, donation: Option<(Priority, LockId)>) -> bool {
        self.donation = donation;
        self.refresh_effective()
    }

    fn refresh_effective(&mut self) -> bool {
        let effective = match self.donation {
            Some((donated, _)) => self.base_priority.min(donated),
            None => self.base_priority,
        };
        let changed = effective != self.effective_priority;
        self.effective_priority = effective;
        changed
    }

    /// Held lock currently lowering this thread's effective priority
    pub fn min_priority_lock(&self) -> Option<LockId> {
        match self.donation {
            Some((donated, lock)) if donated < self.base_priority => Some(lock),
            _ => None,
        }
    }

    // ═══════════════════════════════════════════════════════════════
    // Accounting
    // ═══════════════════════════════════════════════════════════════

    /// Thread admitted to a wait queue
    pub fn log_enqueued(&mut self, now: Ticks) {
        match (self.arrival_time, self.last_scheduled) {
            (None, _) => {
                // First admission: arrival, and run accounting starts here.
                self.arrival_time = Some(now);
                self.last_scheduled = Some(now);
            }
            (Some(_), Some(scheduled)) => {
                // Only count the run if it happened after the last admission
                if self.last_enqueued.map_or(true, |enq| scheduled >= enq) {
                    self.total_run_time += now.saturating_sub(scheduled);
                }
            }
            (Some(_), None) => {}
        }
        self.last_enqueued = Some(now);
    }

    /// Thread dispatched onto the CPU
    pub fn log_scheduled(&mut self, now: Ticks) {
        if let Some(enqueued) = self.last_enqueued {
            if self.last_scheduled.map_or(true, |scheduled| enqueued >= scheduled) {
                self.total_wait_time += now.saturating_sub(enqueued);
            }
        }
        self.last_scheduled = Some(now);
    }

    /// Thread terminated; folds its totals into `stats`
    ///
    /// Returns `None` for threads that never arrived on a queue (and for
    /// main/idle, which are never accounted).
    pub fn log_finished(&self, now: Ticks, stats: &mut RunStatistics) -> Option<FinishRecord> {
        if self.handle.flags().is_exempt() {
            return None;
        }
        let arrival = match self.arrival_time {
            Some(arrival) => arrival,
            None => {
                stats.record_unarrived();
                return None;
            }
        };

        let turnaround = now.saturating_sub(arrival);
        stats.record_finish(self.total_wait_time, turnaround);

        let running_since = self.last_scheduled.unwrap_or(arrival);
        Some(FinishRecord {
            arrival,
            run: self.total_run_time + now.saturating_sub(running_since),
            wait: self.total_wait_time,
            finish: now,
        })
    }

    pub fn arrival_time(&self) -> Option<Ticks> {
        self.arrival_time
    }

    pub fn last_scheduled(&self) -> Option<Ticks> {
        self.last_scheduled
    }

    pub fn last_enqueued(&self) -> Option<Ticks> {
        self.last_enqueued
    }

    pub fn total_run_time(&self) -> Ticks {
        self.total_run_time
    }

    pub fn total_wait_time(&self) -> Ticks {
        self.total_wait_time
    }

    pub fn uncounted_run_time(&self) -> Ticks {
        self.uncounted_run_time
    }

    pub fn uncounted_wait_time(&self) -> Ticks {
        self.uncounted_wait_time
    }

    // ═══════════════════════════════════════════════════════════════
    // Registry links
    // ═══════════════════════════════════════════════════════════════

    pub fn held_locks(&self) -> &[LockId] {
        &self.held_locks
    }

    pub(crate) fn add_held_lock(&mut self, lock: LockId) {
        if !self.held_locks.contains(&lock) {
            self.held_locks.push(lock);
        }
    }

    pub(crate) fn remove_held_lock(&mut self, lock: LockId) -> bool {
        match self.held_locks.iter().position(|&l| l == lock) {
            Some(pos) => {
                self.held_locks.swap_remove(pos);
                true
            }
            None => false,
        }
    }

    pub fn blocked_on(&self) -> Option<LockId> {
        self.blocked_on
    }

    pub(crate) fn set_blocked_on(&mut self, lock: Option<LockId>) {
        self.blocked_on = lock;
    }

    pub fn queued_on(&self) -> Option<QueueId> {
        self.queued_on
    }

    pub(crate) fn set_queued_on(&mut self, queue: Option<QueueId>) {
        self.queued_on = queue;
    }
}
