//! Donation Protocol - lock-mediated priority inheritance
//!
//! A lock's donated priority is the best effective priority among its
//! waiters. A holder runs at `min(base, donated priority of every held
//! lock)`. When a holder is itself blocked on another lock, the change is
//! carried along the `blocked_on` chain until a thread's effective priority
//! stops changing.
//!
//! Locks and threads refer to each other by id only. This table owns the
//! locks; scheduling states live in the `ThreadTable`.
//!
//! With donation disabled locks are plain FIFO mutexes: no donated priority
//! is computed and `held_locks` stays empty.

use crate::scheduler::core::error::{SchedulerError, SchedulerResult};
use crate::scheduler::thread::{ThreadId, ThreadTable};
use crate::scheduler::Priority;
use alloc::collections::{BTreeMap, VecDeque};
use alloc::vec::Vec;
use core::fmt;

/// Lock identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LockId(pub u64);

impl fmt::Display for LockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lock#{}", self.0)
    }
}

/// Bookkeeping of one lock
#[derive(Debug, Clone)]
pub struct LockState {
    id: LockId,
    holder: Option<ThreadId>,
    waiters: VecDeque<ThreadId>,
    donated: Option<Priority>,
    max_priority_thread: Option<ThreadId>,
}

impl LockState {
    fn new(id: LockId) -> Self {
        Self {
            id,
            holder: None,
            waiters: VecDeque::new(),
            donated: None,
            max_priority_thread: None,
        }
    }

    pub fn id(&self) -> LockId {
        self.id
    }

    pub fn holder(&self) -> Option<ThreadId> {
        self.holder
    }

    /// Best effective priority among waiters (`None` when nobody waits)
    pub fn donated_priority(&self) -> Option<Priority> {
        self.donated
    }

    /// Oldest waiter carrying `donated_priority`
    pub fn max_priority_thread(&self) -> Option<ThreadId> {
        self.max_priority_thread
    }

    /// Waiters in hand-off order
    pub fn waiters(&self) -> impl Iterator<Item = ThreadId> + '_ {
        self.waiters.iter().copied()
    }

    pub fn waiter_count(&self) -> usize {
        self.waiters.len()
    }
}

/// Result of an acquire attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// Lock was free and now belongs to the caller
    Acquired,
    /// Caller queued behind `holder` and must block
    Blocked { holder: ThreadId },
}

/// Result of a release
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    /// Waiter the lock was handed to, to be made ready
    pub next_holder: Option<ThreadId>,
    /// Threads whose effective priority changed
    pub changed: Vec<ThreadId>,
}

/// Registry of locks
pub struct LockTable {
    locks: BTreeMap<LockId, LockState>,
    next_id: u64,
    donation: bool,
}

impl LockTable {
    pub fn new(donation: bool) -> Self {
        Self {
            locks: BTreeMap::new(),
            next_id: 1,
            donation,
        }
    }

    #[inline]
    pub fn donation_enabled(&self) -> bool {
        self.donation
    }

    /// Register a new, free lock
    pub fn create(&mut self) -> LockId {
        let id = LockId(self.next_id);
        self.next_id += 1;
        self.locks.insert(id, LockState::new(id));
        id
    }

    pub fn get(&self, id: LockId) -> SchedulerResult<&LockState> {
        self.locks
            .get(&id)
            .ok_or(SchedulerError::LockNotFound { lock_id: id.0 })
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    /// Locks currently held by `thread`
    pub fn held_by(&self, thread: ThreadId) -> Vec<LockId> {
        self.locks
            .values()
            .filter(|lock| lock.holder == Some(thread))
            .map(LockState::id)
            .collect()
    }

    /// Take `lock` for `thread`, or queue `thread` behind the holder
    ///
    /// On `Blocked`, the returned list holds every thread whose effective
    /// priority the donation changed. Acquiring a lock already held by the
    /// caller is fatal.
    pub fn acquire(
        &mut self,
        lock: LockId,
        thread: ThreadId,
        threads: &mut ThreadTable,
    ) -> SchedulerResult<(AcquireOutcome, Vec<ThreadId>)> {
        let donation = self.donation;
        let state = self
            .locks
            .get_mut(&lock)
            .ok_or(SchedulerError::LockNotFound { lock_id: lock.0 })?;
        crate::sched_assert!(
            state.holder != Some(thread),
            "thread {} acquiring {} it already holds",
            thread,
            lock
        );

        let mut changed = Vec::new();
        match state.holder {
            None => {
                state.holder = Some(thread);
                if donation {
                    if let Some(holder) = threads.get_mut(thread) {
                        holder.add_held_lock(lock);
                    }
                    if self.refresh_thread(thread, threads) {
                        changed.push(thread);
                    }
                }
                Ok((AcquireOutcome::Acquired, changed))
            }
            Some(holder) => {
                state.waiters.push_back(thread);
                if let Some(waiter) = threads.get_mut(thread) {
                    waiter.set_blocked_on(Some(lock));
                }
                if donation {
                    self.propagate(lock, threads, &mut changed);
                }
                Ok((AcquireOutcome::Blocked { holder }, changed))
            }
        }
    }

    /// Give up `lock`; hands it to the oldest waiter
    ///
    /// Release by anyone but the holder is fatal.
    pub fn release(
        &mut self,
        lock: LockId,
        thread: ThreadId,
        threads: &mut ThreadTable,
    ) -> SchedulerResult<Release> {
        let donation = self.donation;
        let state = self
            .locks
            .get_mut(&lock)
            .ok_or(SchedulerError::LockNotFound { lock_id: lock.0 })?;
        crate::sched_assert!(
            state.holder == Some(thread),
            "thread {} releasing {} held by {:?}",
            thread,
            lock,
            state.holder
        );

        let next_holder = state.waiters.pop_front();
        state.holder = next_holder;

        let mut changed = Vec::new();
        if let Some(releaser) = threads.get_mut(thread) {
            releaser.remove_held_lock(lock);
        }
        if let Some(next) = next_holder {
            if let Some(waiter) = threads.get_mut(next) {
                waiter.set_blocked_on(None);
                if donation {
                    waiter.add_held_lock(lock);
                }
            }
        }

        if donation {
            self.refresh_lock(lock, threads);
            self.settle(thread, threads, &mut changed);
            if let Some(next) = next_holder {
                self.settle(next, threads, &mut changed);
            }
        }

        Ok(Release { next_holder, changed })
    }

    /// Re-derive donations after `thread`'s own priority changed
    ///
    /// Only matters while `thread` waits on a lock; returns every holder
    /// whose effective priority moved as a result.
    pub fn thread_priority_changed(&mut self, thread: ThreadId, threads: &mut ThreadTable) -> Vec<ThreadId> {
        let mut changed = Vec::new();
        if !self.donation {
            return changed;
        }
        if let Some(lock) = threads.get(thread).and_then(|state| state.blocked_on()) {
            self.propagate(lock, threads, &mut changed);
        }
        changed
    }

    /// Forget a finished thread's pending wait
    pub fn withdraw(&mut self, thread: ThreadId, threads: &mut ThreadTable) -> Vec<ThreadId> {
        let mut changed = Vec::new();
        let Some(lock) = threads.get(thread).and_then(|state| state.blocked_on()) else {
            return changed;
        };
        if let Some(state) = self.locks.get_mut(&lock) {
            state.waiters.retain(|&waiter| waiter != thread);
        }
        if let Some(state) = threads.get_mut(thread) {
            state.set_blocked_on(None);
        }
        if self.donation {
            self.propagate(lock, threads, &mut changed);
        }
        changed
    }

    /// Check the donation invariants for every lock and holder
    pub fn verify(&self, threads: &ThreadTable) -> bool {
        if !self.donation {
            return true;
        }
        let locks_ok = self.locks.values().all(|lock| {
            let best = lock
                .waiters
                .iter()
                .map(|&waiter| threads.effective_priority(waiter))
                .min();
            best == lock.donated
        });
        let holders_ok = threads.iter().all(|state| {
            let floor = state
                .held_locks()
                .iter()
                .filter_map(|id| self.locks.get(id).and_then(|lock| lock.donated))
                .min();
            let expected = floor.map_or(state.priority(), |p| p.min(state.priority()));
            state.effective_priority() == expected
        });
        locks_ok && holders_ok
    }

    // ═══════════════════════════════════════════════════════════════
    // Internals
    // ═══════════════════════════════════════════════════════════════

    /// Recompute a lock's donated priority from its waiters
    fn refresh_lock(&mut self, lock: LockId, threads: &ThreadTable) {
        let Some(state) = self.locks.get_mut(&lock) else {
            return;
        };
        let mut best: Option<(Priority, ThreadId)> = None;
        for &waiter in state.waiters.iter() {
            let priority = threads.effective_priority(waiter);
            if best.map_or(true, |(p, _)| priority < p) {
                best = Some((priority, waiter));
            }
        }
        state.donated = best.map(|(p, _)| p);
        state.max_priority_thread = best.map(|(_, t)| t);
    }

    /// Recompute a thread's donation floor from its held locks
    fn refresh_thread(&self, thread: ThreadId, threads: &mut ThreadTable) -> bool {
        let Some(state) = threads.get_mut(thread) else {
            return false;
        };
        let mut floor: Option<(Priority, LockId)> = None;
        for id in state.held_locks() {
            if let Some(donated) = self.locks.get(id).and_then(|lock| lock.donated) {
                if floor.map_or(true, |(p, _)| donated < p) {
                    floor = Some((donated, *id));
                }
            }
        }
        state.set_donation(floor)
    }

    /// Refresh `thread` and carry any change along its wait chain
    fn settle(&mut self, thread: ThreadId, threads: &mut ThreadTable, changed: &mut Vec<ThreadId>) {
        if !self.refresh_thread(thread, threads) {
            return;
        }
        changed.push(thread);
        if let Some(lock) = threads.get(thread).and_then(|state| state.blocked_on()) {
            self.propagate(lock, threads, changed);
        }
    }

    /// Walk holder -> blocked_on -> holder from `lock` while priorities move
    fn propagate(&mut self, start: LockId, threads: &mut ThreadTable, changed: &mut Vec<ThreadId>) {
        let max_hops = self.locks.len();
        let mut lock = start;

        for _ in 0..max_hops {
            self.refresh_lock(lock, threads);

            let Some(holder) = self.locks.get(&lock).and_then(|state| state.holder) else {
                return;
            };
            if !self.refresh_thread(holder, threads) {
                return;
            }
            log::trace!(
                "donation: {} -> thread {} now {}",
                lock,
                holder,
                threads.effective_priority(holder)
            );
            if !changed.contains(&holder) {
                changed.push(holder);
            }

            match threads.get(holder).and_then(|state| state.blocked_on()) {
                Some(next) => lock = next,
                None => return,
            }
        }

        log::warn!("donation: wait cycle through {}, propagation stopped", start);
    }
}
