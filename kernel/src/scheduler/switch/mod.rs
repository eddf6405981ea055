//! Thread control
//!
//! The scheduler decides *who* runs; moving the CPU between threads belongs
//! to the platform. `ThreadControl` is that seam. `SimCpu` is the host
//! implementation: it only tracks run states and records every switch.

use crate::scheduler::thread::{ThreadHandle, ThreadId};
use alloc::vec::Vec;
use hashbrown::HashMap;

/// Run state as seen by the thread-control layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// On the CPU
    Running,
    /// Waiting in the ready queue
    Ready,
    /// Waiting on a lock or sleeping
    Blocked,
}

/// Platform side of scheduling
pub trait ThreadControl {
    /// Thread currently on the CPU
    fn current_thread(&self) -> ThreadHandle;

    /// `thread` became runnable
    fn make_ready(&mut self, thread: &ThreadHandle);

    /// Current thread stops being runnable
    fn block_current(&mut self);

    /// Give the CPU to `next`
    fn switch_to(&mut self, next: &ThreadHandle);
}

/// Simulated single CPU
#[derive(Debug)]
pub struct SimCpu {
    current: ThreadHandle,
    states: HashMap<ThreadId, RunState>,
    switches: Vec<ThreadId>,
}

impl SimCpu {
    /// CPU running the bootstrap thread
    pub fn new() -> Self {
        Self::running(ThreadHandle::main())
    }

    /// CPU running `thread`
    pub fn running(thread: ThreadHandle) -> Self {
        let mut states = HashMap::new();
        states.insert(thread.id(), RunState::Running);
        Self {
            current: thread,
            states,
            switches: Vec::new(),
        }
    }

    pub fn state_of(&self, id: ThreadId) -> Option<RunState> {
        self.states.get(&id).copied()
    }

    /// Threads switched to, oldest first
    pub fn switches(&self) -> &[ThreadId] {
        &self.switches
    }

    pub fn switch_count(&self) -> usize {
        self.switches.len()
    }
}

impl Default for SimCpu {
    fn default() -> Self {
        Self::new()
    }
}

impl ThreadControl for SimCpu {
    fn current_thread(&self) -> ThreadHandle {
        self.current.clone()
    }

    fn make_ready(&mut self, thread: &ThreadHandle) {
        self.states.insert(thread.id(), RunState::Ready);
    }

    fn block_current(&mut self) {
        self.states.insert(self.current.id(), RunState::Blocked);
    }

    fn switch_to(&mut self, next: &ThreadHandle) {
        let previous = self.current.id();
        if previous != next.id() && self.states.get(&previous) == Some(&RunState::Running) {
            // Switched away without blocking: a yield
            self.states.insert(previous, RunState::Ready);
        }
        self.states.insert(next.id(), RunState::Running);
        self.current = next.clone();
        self.switches.push(next.id());
    }
}
