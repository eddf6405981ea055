//! Idle task
//!
//! Dispatched when the ready queue is empty (main included). Never queued,
//! never aged, never accounted; the platform halts until the next wakeup
//! while it runs.

use super::thread::{ThreadHandle, ThreadId};

/// The always-available fallback task
#[derive(Debug, Clone)]
pub struct IdleTask {
    handle: ThreadHandle,
    dispatches: u64,
}

impl IdleTask {
    pub fn new() -> Self {
        let handle = ThreadHandle::idle();
        crate::logger::debug("idle task created");
        Self {
            handle,
            dispatches: 0,
        }
    }

    #[inline]
    pub fn handle(&self) -> &ThreadHandle {
        &self.handle
    }

    #[inline]
    pub fn is_idle(&self, id: ThreadId) -> bool {
        self.handle.id() == id
    }

    /// Hand out the idle task for one dispatch
    pub fn dispatch(&mut self) -> ThreadHandle {
        self.dispatches += 1;
        if self.dispatches == 1 {
            log::debug!("[SCHED] ready queue empty, entering idle");
        }
        self.handle.clone()
    }

    /// Times the idle task was dispatched
    pub fn dispatches(&self) -> u64 {
        self.dispatches
    }
}

impl Default for IdleTask {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_counts() {
        let mut idle = IdleTask::new();
        let handle = idle.dispatch();
        idle.dispatch();
        assert!(handle.is_idle());
        assert!(idle.is_idle(handle.id()));
        assert_eq!(idle.dispatches(), 2);
    }
}
