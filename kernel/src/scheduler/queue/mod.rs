//! Priority wait queues
//!
//! A `PriorityWaitQueue` holds threads waiting for some resource (the CPU for
//! the ready queue). Ordering is delegated to one `QueuePolicy`, chosen once
//! from the scheduler config:
//! - `StrictQueue`: effective priority, FIFO among equals
//! - `AgingQueue`: strict, re-ranked by wait time on every selection
//! - `MultiLevelQueue`: three FIFO bands with migration
//!
//! The main thread never enters the policy. It has its own slot and is only
//! handed out when nothing else waits (kernel-idle fallback).

pub mod aging;
pub mod multilevel;
pub mod strict;

pub use aging::AgingQueue;
pub use multilevel::{Band, MultiLevelQueue};
pub use strict::StrictQueue;

use crate::config::{QueuePolicyKind, SchedulerConfig};
use crate::scheduler::thread::{ThreadHandle, ThreadId, ThreadTable};
use crate::time::Ticks;
use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt;

/// Wait queue identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QueueId(pub u64);

impl QueueId {
    /// The scheduler's ready queue
    pub const READY: QueueId = QueueId(0);
}

impl fmt::Display for QueueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "queue#{}", self.0)
    }
}

/// Ordering strategy of a wait queue
///
/// Priorities are always read through the `ThreadTable`; policies only keep
/// thread ids.
pub trait QueuePolicy: Send {
    /// Add a waiter (repositions it if already present)
    fn admit(&mut self, id: ThreadId, threads: &ThreadTable);

    /// Remove and return the next thread to dispatch
    fn select_next(&mut self, threads: &mut ThreadTable, now: Ticks) -> Option<ThreadId>;

    /// Re-sort `id` after its effective priority changed
    fn reposition(&mut self, id: ThreadId, threads: &ThreadTable);

    /// A waiter's holder gained a donation
    fn notify_lock_acquired(&mut self, id: ThreadId, threads: &ThreadTable) {
        self.reposition(id, threads);
    }

    /// A waiter released a lock and may have lost a donation
    fn notify_lock_released(&mut self, id: ThreadId, threads: &ThreadTable) {
        self.reposition(id, threads);
    }

    fn remove(&mut self, id: ThreadId) -> bool;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn contains(&self, id: ThreadId) -> bool;

    /// Waiters in dispatch order (aging not applied)
    fn waiters(&self) -> Vec<ThreadId>;
}

/// Build the policy selected by `config`
pub fn build_policy(config: &SchedulerConfig) -> Box<dyn QueuePolicy> {
    match config.policy {
        QueuePolicyKind::Strict => Box::new(StrictQueue::new(config.capacity_hint)),
        QueuePolicyKind::Aging => Box::new(AgingQueue::new(config.capacity_hint)),
        QueuePolicyKind::MultiLevel => {
            Box::new(MultiLevelQueue::new(config.band_limits, config.capacity_hint))
        }
    }
}

/// A wait queue with owner tracking and the main-thread fallback slot
pub struct PriorityWaitQueue {
    id: QueueId,
    policy: Box<dyn QueuePolicy>,
    kind: QueuePolicyKind,
    transfer_priority: bool,
    owner: Option<ThreadId>,
    main_waiting: bool,
}

impl PriorityWaitQueue {
    pub fn new(id: QueueId, transfer_priority: bool, config: &SchedulerConfig) -> Self {
        Self {
            id,
            policy: build_policy(config),
            kind: config.policy,
            transfer_priority,
            owner: None,
            main_waiting: false,
        }
    }

    #[inline]
    pub fn id(&self) -> QueueId {
        self.id
    }

    #[inline]
    pub fn kind(&self) -> QueuePolicyKind {
        self.kind
    }

    #[inline]
    pub fn transfer_priority(&self) -> bool {
        self.transfer_priority
    }

    #[inline]
    pub fn owner(&self) -> Option<ThreadId> {
        self.owner
    }

    /// Admit `handle`; records the enqueue time
    ///
    /// Fatal if the thread's priority lies outside the configured range.
    pub fn wait_for_access(&mut self, handle: &ThreadHandle, threads: &mut ThreadTable, now: Ticks) {
        let config = *threads.config();
        let state = threads.get_or_create(handle);
        crate::sched_assert!(
            config.in_range(state.priority()),
            "{} admitted to {} with priority {} outside [{}, {}]",
            handle,
            self.id,
            state.priority(),
            config.priority_min,
            config.priority_max
        );
        state.log_enqueued(now);
        state.set_queued_on(Some(self.id));

        if handle.is_main() {
            self.main_waiting = true;
        } else {
            self.policy.admit(handle.id(), threads);
        }
    }

    /// Take the next thread; main only when nothing else waits
    ///
    /// With `transfer_priority` the returned thread becomes the owner.
    pub fn next_thread(&mut self, threads: &mut ThreadTable, now: Ticks) -> Option<ThreadId> {
        let next = match self.policy.select_next(threads, now) {
            Some(id) => Some(id),
            None if self.main_waiting => {
                self.main_waiting = false;
                Some(ThreadId::MAIN)
            }
            None => None,
        };

        if let Some(id) = next {
            if let Some(state) = threads.get_mut(id) {
                state.set_queued_on(None);
            }
        }
        if self.transfer_priority {
            self.owner = next;
        }
        next
    }

    /// Make `id` the owner; only legal while nobody waits
    pub fn acquire(&mut self, id: ThreadId) {
        crate::sched_assert!(
            self.is_empty(),
            "acquire of {} by thread {} with {} waiter(s)",
            self.id,
            id,
            self.len()
        );
        self.owner = Some(id);
    }

    /// Re-sort a waiter whose effective priority changed
    pub fn reposition(&mut self, id: ThreadId, threads: &ThreadTable) {
        if id != ThreadId::MAIN {
            self.policy.reposition(id, threads);
        }
    }

    pub fn notify_lock_acquired(&mut self, id: ThreadId, threads: &ThreadTable) {
        if id != ThreadId::MAIN {
            self.policy.notify_lock_acquired(id, threads);
        }
    }

    pub fn notify_lock_released(&mut self, id: ThreadId, threads: &ThreadTable) {
        if id != ThreadId::MAIN {
            self.policy.notify_lock_released(id, threads);
        }
    }

    /// Withdraw a waiter without dispatching it
    pub fn remove(&mut self, id: ThreadId, threads: &mut ThreadTable) -> bool {
        let removed = if id == ThreadId::MAIN {
            core::mem::replace(&mut self.main_waiting, false)
        } else {
            self.policy.remove(id)
        };
        if removed {
            if let Some(state) = threads.get_mut(id) {
                state.set_queued_on(None);
            }
        }
        removed
    }

    /// Waiters, main included
    pub fn len(&self) -> usize {
        self.policy.len() + usize::from(self.main_waiting)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: ThreadId) -> bool {
        if id == ThreadId::MAIN {
            self.main_waiting
        } else {
            self.policy.contains(id)
        }
    }

    /// Dispatch-order snapshot, main last
    pub fn waiters(&self) -> Vec<ThreadId> {
        let mut waiters = self.policy.waiters();
        if self.main_waiting {
            waiters.push(ThreadId::MAIN);
        }
        waiters
    }
}

impl fmt::Debug for PriorityWaitQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PriorityWaitQueue")
            .field("id", &self.id.0)
            .field("kind", &self.kind)
            .field("transfer_priority", &self.transfer_priority)
            .field("owner", &self.owner)
            .field("waiters", &self.waiters())
            .finish()
    }
}
