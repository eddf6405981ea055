//! Aging priority queue
//!
//! Strict ordering, but every selection first ages all waiters and re-ranks
//! them. The rebuild is O(n log n) in the number of waiters.

use super::strict::StrictQueue;
use super::QueuePolicy;
use crate::scheduler::thread::{ThreadId, ThreadTable};
use crate::time::Ticks;
use alloc::vec::Vec;

pub struct AgingQueue {
    inner: StrictQueue,
}

impl AgingQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: StrictQueue::new(capacity),
        }
    }
}

impl QueuePolicy for AgingQueue {
    fn admit(&mut self, id: ThreadId, threads: &ThreadTable) {
        self.inner.admit(id, threads);
    }

    fn select_next(&mut self, threads: &mut ThreadTable, now: Ticks) -> Option<ThreadId> {
        let mut changed = false;
        for id in self.inner.waiters() {
            changed |= threads.age_down(id, now);
        }
        if changed {
            self.inner.rebuild(threads);
        }
        self.inner.select_next(threads, now)
    }

    fn reposition(&mut self, id: ThreadId, threads: &ThreadTable) {
        self.inner.reposition(id, threads);
    }

    fn remove(&mut self, id: ThreadId) -> bool {
        self.inner.remove(id)
    }

    fn len(&self) -> usize {
        self.inner.len()
    }

    fn contains(&self, id: ThreadId) -> bool {
        self.inner.contains(id)
    }

    fn waiters(&self) -> Vec<ThreadId> {
        self.inner.waiters()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{QueuePolicyKind, SchedulerConfig};
    use crate::scheduler::thread::ThreadHandle;
    use crate::scheduler::Priority;

    fn spawn(table: &mut ThreadTable, priority: Priority, enqueued: Ticks) -> ThreadId {
        let config = *table.config();
        let handle = ThreadHandle::new("aging");
        let state = table.get_or_create(&handle);
        state.set_priority(priority, &config);
        state.log_enqueued(enqueued);
        handle.id()
    }

    #[test]
    fn test_long_waiter_overtakes() {
        let config = SchedulerConfig::new()
            .with_policy(QueuePolicyKind::Aging)
            .with_aging_interval(10);
        let mut table = ThreadTable::new(config);
        let mut queue = AgingQueue::new(4);

        // Old thread at 12 has waited 100 ticks, newcomer at 5 just arrived
        let old = spawn(&mut table, 12, 0);
        let new = spawn(&mut table, 5, 100);
        queue.admit(old, &table);
        queue.admit(new, &table);
        assert_eq!(queue.waiters(), [new, old]);

        assert_eq!(queue.select_next(&mut table, 100), Some(old));
        assert_eq!(table.effective_priority(old), 2);
        assert_eq!(queue.select_next(&mut table, 100), Some(new));
    }

    #[test]
    fn test_without_interval_behaves_strict() {
        let config = SchedulerConfig::new().with_policy(QueuePolicyKind::Aging);
        let mut table = ThreadTable::new(config);
        let mut queue = AgingQueue::new(4);
        let low = spawn(&mut table, 30, 0);
        let high = spawn(&mut table, 2, 500);
        queue.admit(low, &table);
        queue.admit(high, &table);
        assert_eq!(queue.select_next(&mut table, 10_000), Some(high));
        assert_eq!(table.effective_priority(low), 30);
    }
}
