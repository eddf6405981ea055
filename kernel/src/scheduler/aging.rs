//! Aging Engine - anti-starvation priority drift
//!
//! Threads that hold the CPU drift toward less urgent priorities (`age_up`),
//! threads that wait drift toward more urgent ones (`age_down`). One step per
//! `interval` ticks, clamped to the configured range.
//!
//! Sub-interval remainders are carried in `uncounted_*` and each call moves
//! its marker (`last_run_age` / `last_wait_age`) to `now`, so repeated calls
//! over short spans neither lose nor double count time.

use crate::config::SchedulerConfig;
use crate::scheduler::thread::SchedulingState;
use crate::scheduler::Priority;
use crate::time::Ticks;

/// Aging parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgingEngine {
    interval: Ticks,
}

impl AgingEngine {
    /// `interval == 0` disables aging
    pub const fn new(interval: Ticks) -> Self {
        Self { interval }
    }

    pub fn from_config(config: &SchedulerConfig) -> Self {
        if config.policy.ages() {
            Self::new(config.aging_interval)
        } else {
            Self::new(0)
        }
    }

    #[inline]
    pub fn interval(&self) -> Ticks {
        self.interval
    }

    #[inline]
    pub fn enabled(&self) -> bool {
        self.interval > 0
    }

    /// Penalize running time; returns true if the effective priority changed
    pub fn age_up(&self, state: &mut SchedulingState, config: &SchedulerConfig, now: Ticks) -> bool {
        if !self.applies_to(state) {
            return false;
        }
        let since = match state.last_scheduled() {
            Some(scheduled) => state.last_run_age.map_or(scheduled, |mark| mark.max(scheduled)),
            None => return false,
        };

        let delta = Self::split(self.interval, now, since, &mut state.uncounted_run_time);
        state.last_run_age = Some(now);
        if delta == 0 {
            return false;
        }

        let target = state.priority().saturating_add(delta);
        log::trace!("age_up {}: +{} -> {}", state.handle(), delta, config.clamp(target));
        state.set_clamped_priority(target, config)
    }

    /// Reward waiting time; returns true if the effective priority changed
    pub fn age_down(&self, state: &mut SchedulingState, config: &SchedulerConfig, now: Ticks) -> bool {
        if !self.applies_to(state) {
            return false;
        }
        let since = match state.last_enqueued() {
            Some(enqueued) => state.last_wait_age.map_or(enqueued, |mark| mark.max(enqueued)),
            None => return false,
        };

        let delta = Self::split(self.interval, now, since, &mut state.uncounted_wait_time);
        state.last_wait_age = Some(now);
        if delta == 0 {
            return false;
        }

        let target = state.priority().saturating_sub(delta);
        log::trace!("age_down {}: -{} -> {}", state.handle(), delta, config.clamp(target));
        state.set_clamped_priority(target, config)
    }

    fn applies_to(&self, state: &SchedulingState) -> bool {
        self.enabled() && !state.handle().flags().is_exempt()
    }

    /// Whole intervals elapsed since `since`, keeping the remainder in `carry`
    fn split(interval: Ticks, now: Ticks, since: Ticks, carry: &mut Ticks) -> Priority {
        let elapsed = now.saturating_sub(since) + *carry;
        *carry = elapsed % interval;
        Priority::try_from(elapsed / interval).unwrap_or(Priority::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::thread::ThreadHandle;

    const INTERVAL: Ticks = 10;

    fn setup(priority: Priority) -> (AgingEngine, SchedulerConfig, SchedulingState) {
        let config = SchedulerConfig::new().with_aging_interval(INTERVAL);
        let state = SchedulingState::new(ThreadHandle::new("aging"), priority);
        (AgingEngine::new(INTERVAL), config, state)
    }

    #[test]
    fn test_three_intervals_of_waiting_raise_three_levels() {
        let (engine, config, mut state) = setup(20);
        state.log_enqueued(100);
        assert!(engine.age_down(&mut state, &config, 100 + 3 * INTERVAL));
        assert_eq!(state.priority(), 17);
        assert_eq!(state.uncounted_wait_time(), 0);
    }

    #[test]
    fn test_age_down_clamps_at_min() {
        let (engine, config, mut state) = setup(2);
        state.log_enqueued(0);
        engine.age_down(&mut state, &config, 50 * INTERVAL);
        assert_eq!(state.priority(), config.priority_min);
    }

    #[test]
    fn test_age_up_penalizes_running() {
        let (engine, config, mut state) = setup(5);
        state.log_enqueued(0);
        state.log_scheduled(0);
        assert!(engine.age_up(&mut state, &config, 25));
        assert_eq!(state.priority(), 7);
        assert_eq!(state.uncounted_run_time(), 5);

        // The carried 5 plus 5 more ticks is one more step
        assert!(engine.age_up(&mut state, &config, 30));
        assert_eq!(state.priority(), 8);
        assert_eq!(state.uncounted_run_time(), 0);
    }

    #[test]
    fn test_sub_interval_calls_carry_remainder() {
        let (engine, config, mut state) = setup(20);
        state.log_enqueued(0);
        for now in [3, 6, 9] {
            assert!(!engine.age_down(&mut state, &config, now));
        }
        assert_eq!(state.uncounted_wait_time(), 9);
        assert!(engine.age_down(&mut state, &config, 12));
        assert_eq!(state.priority(), 19);
        assert_eq!(state.uncounted_wait_time(), 2);
    }

    #[test]
    fn test_repeated_call_at_same_time_is_idempotent() {
        let (engine, config, mut state) = setup(20);
        state.log_enqueued(0);
        engine.age_down(&mut state, &config, 30);
        engine.age_down(&mut state, &config, 30);
        assert_eq!(state.priority(), 17);
    }

    #[test]
    fn test_degenerate_inputs_are_noops() {
        let (engine, config, mut state) = setup(20);
        // Never enqueued or scheduled
        assert!(!engine.age_down(&mut state, &config, 1_000));
        assert!(!engine.age_up(&mut state, &config, 1_000));

        // Interval 0
        state.log_enqueued(0);
        assert!(!AgingEngine::new(0).age_down(&mut state, &config, 1_000));
        assert_eq!(state.priority(), 20);
    }

    #[test]
    fn test_exempt_threads_do_not_age() {
        let config = SchedulerConfig::new();
        let mut main = SchedulingState::new(ThreadHandle::main(), 20);
        main.log_enqueued(0);
        assert!(!AgingEngine::new(INTERVAL).age_down(&mut main, &config, 100));
        assert_eq!(main.priority(), 20);
    }

    #[test]
    fn test_strict_policy_disables_aging() {
        let config = SchedulerConfig::new().with_aging_interval(INTERVAL);
        assert!(!AgingEngine::from_config(&config).enabled());
        let config = config.with_policy(crate::config::QueuePolicyKind::MultiLevel);
        assert_eq!(AgingEngine::from_config(&config).interval(), INTERVAL);
    }
}
