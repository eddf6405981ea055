//! Atomic region primitive
//!
//! Every scheduler data structure is only touched with interrupts (and so
//! preemption) disabled. `InterruptGuard` is the scoped form: it disables on
//! creation and restores the prior state when dropped, on every exit path.

use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Interrupt enable/disable control
pub trait InterruptController: Send + Sync {
    /// Disable interrupts, returning whether they were enabled before
    fn disable(&self) -> bool;

    /// Restore the state returned by a previous `disable`
    fn restore(&self, was_enabled: bool);

    /// Are interrupts currently enabled?
    fn enabled(&self) -> bool;

    /// Are interrupts currently disabled?
    #[inline]
    fn disabled(&self) -> bool {
        !self.enabled()
    }
}

/// RAII guard for disabling/restoring interrupts
pub struct InterruptGuard<'a> {
    controller: &'a dyn InterruptController,
    was_enabled: bool,
}

impl<'a> InterruptGuard<'a> {
    pub fn new(controller: &'a dyn InterruptController) -> Self {
        let was_enabled = controller.disable();
        Self {
            controller,
            was_enabled,
        }
    }

    /// Whether interrupts were enabled when the guard was taken
    pub fn was_enabled(&self) -> bool {
        self.was_enabled
    }
}

impl Drop for InterruptGuard<'_> {
    fn drop(&mut self) {
        self.controller.restore(self.was_enabled);
    }
}

/// Simulated interrupt flag for host execution
///
/// Starts enabled, like a kernel after boot.
#[derive(Debug)]
pub struct SimInterrupts {
    enabled: AtomicBool,
    disable_count: AtomicU64,
}

impl SimInterrupts {
    pub const fn new() -> Self {
        Self {
            enabled: AtomicBool::new(true),
            disable_count: AtomicU64::new(0),
        }
    }

    /// Number of `disable` calls so far
    pub fn disable_count(&self) -> u64 {
        self.disable_count.load(Ordering::Relaxed)
    }
}

impl Default for SimInterrupts {
    fn default() -> Self {
        Self::new()
    }
}

impl InterruptController for SimInterrupts {
    fn disable(&self) -> bool {
        self.disable_count.fetch_add(1, Ordering::Relaxed);
        self.enabled.swap(false, Ordering::AcqRel)
    }

    fn restore(&self, was_enabled: bool) {
        self.enabled.store(was_enabled, Ordering::Release);
    }

    fn enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_restores_prior_state() {
        let irq = SimInterrupts::new();
        {
            let guard = InterruptGuard::new(&irq);
            assert!(guard.was_enabled());
            assert!(irq.disabled());
            {
                let inner = InterruptGuard::new(&irq);
                assert!(!inner.was_enabled());
            }
            // Inner guard must not re-enable
            assert!(irq.disabled());
        }
        assert!(irq.enabled());
        assert_eq!(irq.disable_count(), 2);
    }

    #[test]
    fn test_guard_restores_on_panic_path() {
        let irq = SimInterrupts::new();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = InterruptGuard::new(&irq);
            panic!("boom");
        }));
        assert!(result.is_err());
        assert!(irq.enabled());
    }
}
