//! Strict priority queue
//!
//! Ordered by `(effective priority, admission sequence)`: most urgent first,
//! FIFO among equals. The index remembers each waiter's key so it can be
//! repositioned when its priority changes without losing its place in line.

use super::QueuePolicy;
use crate::scheduler::thread::{ThreadId, ThreadTable};
use crate::scheduler::Priority;
use crate::time::Ticks;
use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use hashbrown::HashMap;

type Key = (Priority, u64);

pub struct StrictQueue {
    order: BTreeMap<Key, ThreadId>,
    index: HashMap<ThreadId, Key>,
    next_seq: u64,
}

impl StrictQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            order: BTreeMap::new(),
            index: HashMap::with_capacity(capacity),
            next_seq: 0,
        }
    }

    /// Re-key every waiter from its current effective priority
    ///
    /// Admission sequence numbers are kept, so FIFO order among equal
    /// priorities survives the rebuild.
    pub(super) fn rebuild(&mut self, threads: &ThreadTable) {
        let entries: Vec<(u64, ThreadId)> = self
            .order
            .iter()
            .map(|(&(_, seq), &id)| (seq, id))
            .collect();

        self.order.clear();
        for (seq, id) in entries {
            let key = (threads.effective_priority(id), seq);
            self.order.insert(key, id);
            self.index.insert(id, key);
        }
    }
}

impl QueuePolicy for StrictQueue {
    fn admit(&mut self, id: ThreadId, threads: &ThreadTable) {
        if self.index.contains_key(&id) {
            self.reposition(id, threads);
            return;
        }
        let key = (threads.effective_priority(id), self.next_seq);
        self.next_seq += 1;
        self.order.insert(key, id);
        self.index.insert(id, key);
    }

    fn select_next(&mut self, _threads: &mut ThreadTable, _now: Ticks) -> Option<ThreadId> {
        let (_, id) = self.order.pop_first()?;
        self.index.remove(&id);
        Some(id)
    }

    fn reposition(&mut self, id: ThreadId, threads: &ThreadTable) {
        let Some(&(priority, seq)) = self.index.get(&id) else {
            return;
        };
        let current = threads.effective_priority(id);
        if current == priority {
            return;
        }
        self.order.remove(&(priority, seq));
        self.order.insert((current, seq), id);
        self.index.insert(id, (current, seq));
    }

    fn remove(&mut self, id: ThreadId) -> bool {
        match self.index.remove(&id) {
            Some(key) => self.order.remove(&key).is_some(),
            None => false,
        }
    }

    fn len(&self) -> usize {
        self.order.len()
    }

    fn contains(&self, id: ThreadId) -> bool {
        self.index.contains_key(&id)
    }

    fn waiters(&self) -> Vec<ThreadId> {
        self.order.values().copied().collect()
    }
}
