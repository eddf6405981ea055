//! Priority range enforcement and single-step adjustments.

mod common;

use common::Harness;
use proptest::prelude::*;
use teachos_kernel::scheduler::ThreadHandle;
use teachos_kernel::sync::InterruptController;
use teachos_kernel::{QueuePolicyKind, SchedulerConfig, SchedulerError};

#[test]
#[should_panic(expected = "Invariant violated")]
fn set_priority_above_max_is_fatal() {
    let mut h = Harness::new(SchedulerConfig::new());
    let t = ThreadHandle::new("t");
    let max = h.sched.config().priority_max;
    h.atomic(|sched, _| sched.set_priority(&t, max + 1));
}

#[test]
#[should_panic(expected = "interrupts enabled")]
fn set_priority_outside_atomic_region_is_fatal() {
    let mut h = Harness::new(SchedulerConfig::new());
    h.sched.set_priority(&ThreadHandle::new("t"), 5);
}

#[test]
fn try_set_priority_reports_range() {
    let mut h = Harness::new(SchedulerConfig::new());
    let t = ThreadHandle::new("t");
    let err = h.atomic(|sched, _| sched.try_set_priority(&t, 41));
    assert_eq!(err, Err(SchedulerError::InvalidPriority { value: 41, min: 1, max: 40 }));
    assert_eq!(h.atomic(|sched, _| sched.try_set_priority(&t, 40)), Ok(()));
    assert_eq!(h.priority(&t), 40);
}

#[test]
fn new_thread_gets_default_priority() {
    let mut h = Harness::new(SchedulerConfig::new().with_default_priority(17));
    let t = ThreadHandle::new("fresh");
    assert_eq!(h.priority(&t), 17);
    assert_eq!(h.effective(&t), 17);
}

#[test]
fn increase_and_decrease_stop_at_bounds() {
    let mut h = Harness::new(SchedulerConfig::new().with_priority_range(1, 3).with_default_priority(2));
    let t = ThreadHandle::new("stepper");

    // Increase = more urgent = numerically lower
    assert!(h.sched.increase_priority(&t));
    assert_eq!(h.priority(&t), 1);
    assert!(!h.sched.increase_priority(&t));
    assert_eq!(h.priority(&t), 1);

    assert!(h.sched.decrease_priority(&t));
    assert!(h.sched.decrease_priority(&t));
    assert!(!h.sched.decrease_priority(&t));
    assert_eq!(h.priority(&t), 3);

    // Both restore the interrupt state they found
    assert!(h.irq.enabled());
}

#[test]
fn set_priority_repositions_ready_thread() {
    let mut h = Harness::new(SchedulerConfig::new());
    let a = h.spawn("a", 10);
    let b = h.spawn("b", 20);
    h.ready(&a);
    h.ready(&b);
    h.atomic(|sched, _| sched.set_priority(&b, 2));
    assert_eq!(h.dispatch(), b);
}

#[test]
fn invalid_config_is_rejected() {
    use std::sync::Arc;
    use teachos_kernel::scheduler::NullSink;
    use teachos_kernel::sync::SimInterrupts;
    use teachos_kernel::time::ManualClock;

    let config = SchedulerConfig::new().with_priority_range(10, 5);
    let result = teachos_kernel::Scheduler::new(
        config,
        Arc::new(SimInterrupts::new()),
        Arc::new(ManualClock::new()),
        Box::new(NullSink),
    );
    assert!(matches!(result, Err(SchedulerError::InvalidConfig { .. })));
}

#[test]
fn config_file_drives_scheduler() {
    let config = SchedulerConfig::parse(
        "scheduler.policy = aging\nscheduler.agingTime = 5\nscheduler.maxPriorityValue = 20\n",
    )
    .unwrap();
    let mut h = Harness::new(config);
    let t = h.spawn("t", 20);
    h.ready(&t);
    h.advance(10);
    h.dispatch();
    assert_eq!(h.priority(&t), 18);
}

#[derive(Debug, Clone)]
enum Op {
    SetClamped(i32),
    Increase,
    Decrease,
    Yield(u64),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        any::<i32>().prop_map(Op::SetClamped),
        Just(Op::Increase),
        Just(Op::Decrease),
        (0u64..100).prop_map(Op::Yield),
    ]
}

proptest! {
    /// Whatever happens, base and effective priorities stay in range
    #[test]
    fn priorities_stay_in_range(
        policy in prop_oneof![
            Just(QueuePolicyKind::Strict),
            Just(QueuePolicyKind::Aging),
            Just(QueuePolicyKind::MultiLevel),
        ],
        ops in proptest::collection::vec(op(), 1..60),
    ) {
        let config = SchedulerConfig::new().with_policy(policy).with_aging_interval(7);
        let mut h = Harness::new(config);
        let threads: Vec<ThreadHandle> = (1..=4).map(|i| h.spawn("p", i * 10)).collect();
        for t in &threads {
            h.ready(t);
        }
        h.dispatch();

        for (i, op) in ops.into_iter().enumerate() {
            let t = &threads[i % threads.len()];
            match op {
                Op::SetClamped(p) => h.atomic(|sched, _| sched.set_clamped_priority(t, p)),
                Op::Increase => {
                    h.sched.increase_priority(t);
                }
                Op::Decrease => {
                    h.sched.decrease_priority(t);
                }
                Op::Yield(ticks) => {
                    h.advance(ticks);
                    h.sched.yield_current(&mut h.cpu);
                }
            }
            for t in &threads {
                let base = h.priority(t);
                let effective = h.effective(t);
                prop_assert!(config.in_range(base));
                prop_assert!(config.in_range(effective));
            }
        }
    }
}
