//! Thread table - registry of scheduling states
//!
//! States are created on first access with the configured default priority
//! and removed when their thread finishes. Queues and locks only store
//! `ThreadId`s and resolve them here.

use super::state::SchedulingState;
use super::thread::{ThreadHandle, ThreadId};
use crate::config::SchedulerConfig;
use crate::scheduler::aging::AgingEngine;
use crate::scheduler::core::error::{SchedulerError, SchedulerResult};
use crate::scheduler::Priority;
use crate::time::Ticks;
use hashbrown::HashMap;

/// Scheduling states keyed by thread id
pub struct ThreadTable {
    states: HashMap<ThreadId, SchedulingState>,
    config: SchedulerConfig,
    aging: AgingEngine,
}

impl ThreadTable {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            states: HashMap::with_capacity(config.capacity_hint),
            aging: AgingEngine::from_config(&config),
            config,
        }
    }

    #[inline]
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    #[inline]
    pub fn aging(&self) -> &AgingEngine {
        &self.aging
    }

    /// State of `handle`, created with the default priority if missing
    pub fn get_or_create(&mut self, handle: &ThreadHandle) -> &mut SchedulingState {
        let default = self.config.priority_default;
        self.states.entry(handle.id()).or_insert_with(|| {
            log::trace!("thread table: new state for {}", handle);
            SchedulingState::new(handle.clone(), default)
        })
    }

    pub fn get(&self, id: ThreadId) -> Option<&SchedulingState> {
        self.states.get(&id)
    }

    pub fn get_mut(&mut self, id: ThreadId) -> Option<&mut SchedulingState> {
        self.states.get_mut(&id)
    }

    /// Like `get`, for callers that treat a missing state as an error
    pub fn lookup(&self, id: ThreadId) -> SchedulerResult<&SchedulingState> {
        self.states
            .get(&id)
            .ok_or(SchedulerError::ThreadNotFound { thread_id: id.as_u64() })
    }

    pub fn lookup_mut(&mut self, id: ThreadId) -> SchedulerResult<&mut SchedulingState> {
        self.states
            .get_mut(&id)
            .ok_or(SchedulerError::ThreadNotFound { thread_id: id.as_u64() })
    }

    pub fn remove(&mut self, id: ThreadId) -> Option<SchedulingState> {
        self.states.remove(&id)
    }

    pub fn contains(&self, id: ThreadId) -> bool {
        self.states.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Effective priority, or the default for a thread not seen yet
    pub fn effective_priority(&self, id: ThreadId) -> Priority {
        self.states
            .get(&id)
            .map_or(self.config.priority_default, SchedulingState::effective_priority)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SchedulingState> {
        self.states.values()
    }

    // ═══════════════════════════════════════════════════════════════
    // Aging
    // ═══════════════════════════════════════════════════════════════

    /// Age a thread coming off the CPU; true if its effective priority changed
    pub fn age_up(&mut self, id: ThreadId, now: Ticks) -> bool {
        match self.states.get_mut(&id) {
            Some(state) => self.aging.age_up(state, &self.config, now),
            None => false,
        }
    }

    /// Age a waiting thread; true if its effective priority changed
    pub fn age_down(&mut self, id: ThreadId, now: Ticks) -> bool {
        match self.states.get_mut(&id) {
            Some(state) => self.aging.age_down(state, &self.config, now),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lazy_creation_uses_default() {
        let config = SchedulerConfig::new().with_default_priority(12);
        let mut table = ThreadTable::new(config);
        let handle = ThreadHandle::new("lazy");

        assert!(!table.contains(handle.id()));
        assert_eq!(table.effective_priority(handle.id()), 12);
        assert_eq!(table.get_or_create(&handle).priority(), 12);
        assert_eq!(table.len(), 1);

        // Second access returns the same state
        table.get_or_create(&handle).set_priority(3, &config);
        assert_eq!(table.get_or_create(&handle).priority(), 3);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_lookup_unknown_thread() {
        let table = ThreadTable::new(SchedulerConfig::new());
        assert_eq!(
            table.lookup(ThreadId(999_999)).err(),
            Some(SchedulerError::ThreadNotFound { thread_id: 999_999 })
        );
    }

    #[test]
    fn test_age_down_through_table() {
        let config = SchedulerConfig::new()
            .with_policy(crate::config::QueuePolicyKind::Aging)
            .with_aging_interval(5);
        let mut table = ThreadTable::new(config);
        let handle = ThreadHandle::new("waiter");
        let state = table.get_or_create(&handle);
        state.set_priority(10, &config);
        state.log_enqueued(0);

        assert!(table.age_down(handle.id(), 10));
        assert_eq!(table.effective_priority(handle.id()), 8);
        assert!(!table.age_down(ThreadId(424_242), 10));
    }
}
