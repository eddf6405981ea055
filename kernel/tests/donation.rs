//! Priority donation through locks, driven through the scheduler.

mod common;

use common::Harness;
use proptest::prelude::*;
use teachos_kernel::scheduler::donation::LockTable;
use teachos_kernel::scheduler::thread::ThreadTable;
use teachos_kernel::scheduler::{AcquireOutcome, ThreadHandle};
use teachos_kernel::SchedulerConfig;

/// `holder` is running and owns a fresh lock
fn holder_with_lock(h: &mut Harness, holder: &ThreadHandle) -> teachos_kernel::scheduler::LockId {
    h.ready(holder);
    assert_eq!(&h.dispatch(), holder);
    let lock = h.sched.new_lock();
    assert_eq!(
        h.sched.acquire_lock(&mut h.cpu, lock).unwrap(),
        AcquireOutcome::Acquired
    );
    lock
}

#[test]
fn holder_inherits_and_reverts() {
    let mut h = Harness::new(SchedulerConfig::new());
    let low = h.spawn("low", 30);
    let high = h.spawn("high", 1);
    let lock = holder_with_lock(&mut h, &low);

    // High arrives, preempts at the next yield, then blocks on the lock
    h.ready(&high);
    assert_eq!(h.sched.yield_current(&mut h.cpu), high);
    let outcome = h.sched.acquire_lock(&mut h.cpu, lock).unwrap();
    assert_eq!(outcome, AcquireOutcome::Blocked { holder: low.id() });

    assert_eq!(h.effective(&low), 1);
    assert_eq!(h.priority(&low), 30);
    assert_eq!(h.sched.lock_donated_priority(lock).unwrap(), Some(1));
    assert!(h.sched.donation_consistent());

    // Low was the only ready thread, so it is running again
    assert_eq!(h.current(), low);
    let next_holder = h.sched.release_lock(&mut h.cpu, lock).unwrap();
    assert_eq!(next_holder, Some(high.id()));
    assert_eq!(h.effective(&low), 30);
    assert_eq!(h.sched.lock_holder(lock).unwrap(), Some(high.id()));
    assert_eq!(h.sched.ready_waiters(), [high.id()]);
}

#[test]
fn donation_repositions_ready_holder() {
    let mut h = Harness::new(SchedulerConfig::new());
    let holder = h.spawn("holder", 35);
    let middle = h.spawn("middle", 20);
    let urgent = h.spawn("urgent", 2);
    let lock = holder_with_lock(&mut h, &holder);

    // Holder yields behind middle and urgent
    h.ready(&middle);
    h.ready(&urgent);
    assert_eq!(h.sched.yield_current(&mut h.cpu), urgent);
    assert_eq!(h.sched.ready_waiters(), [middle.id(), holder.id()]);

    // Urgent blocks: the waiting holder jumps ahead of middle
    h.sched.acquire_lock(&mut h.cpu, lock).unwrap();
    assert_eq!(h.current(), holder);
    assert_eq!(h.sched.ready_waiters(), [middle.id()]);
}

#[test]
fn chained_donation_reaches_bottom() {
    let mut h = Harness::new(SchedulerConfig::new());
    let bottom = h.spawn("bottom", 38);
    let middle = h.spawn("middle", 25);
    let top = h.spawn("top", 3);

    let a = holder_with_lock(&mut h, &bottom);

    // Middle takes b, then waits on a
    h.ready(&middle);
    assert_eq!(h.sched.yield_current(&mut h.cpu), middle);
    let b = h.sched.new_lock();
    h.sched.acquire_lock(&mut h.cpu, b).unwrap();
    h.sched.acquire_lock(&mut h.cpu, a).unwrap();
    assert_eq!(h.current(), bottom);
    assert_eq!(h.effective(&bottom), 25);

    // Top waits on b: middle and bottom both rise to 3
    h.ready(&top);
    assert_eq!(h.sched.yield_current(&mut h.cpu), top);
    h.sched.acquire_lock(&mut h.cpu, b).unwrap();
    assert_eq!(h.effective(&middle), 3);
    assert_eq!(h.effective(&bottom), 3);
    assert!(h.sched.donation_consistent());

    // Bottom releases a: middle gets it and keeps top's donation through b
    assert_eq!(h.current(), bottom);
    h.sched.release_lock(&mut h.cpu, a).unwrap();
    assert_eq!(h.effective(&bottom), 38);
    assert_eq!(h.effective(&middle), 3);
    assert_eq!(h.sched.ready_waiters()[0], middle.id());
}

#[test]
fn lock_records_are_emitted() {
    let mut h = Harness::new(SchedulerConfig::new());
    let low = h.spawn("low", 30);
    let high = h.spawn("high", 1);
    let lock = holder_with_lock(&mut h, &low);
    h.ready(&high);
    h.sched.yield_current(&mut h.cpu);
    h.sink.drain();

    h.sched.acquire_lock(&mut h.cpu, lock).unwrap();
    h.sched.release_lock(&mut h.cpu, lock).unwrap();

    let locks: Vec<String> = h
        .sink
        .lines()
        .into_iter()
        .filter(|line| line.contains(",lock#"))
        .collect();
    assert_eq!(
        locks,
        [
            format!("W,lock#{},0,{},1", lock.0, high.id()),
            format!("R,lock#{},0,{},1", lock.0, low.id()),
            format!("A,lock#{},0,{},1", lock.0, high.id()),
        ]
    );
}

#[test]
fn finishing_holder_hands_lock_on() {
    let mut h = Harness::new(SchedulerConfig::new());
    let holder = h.spawn("holder", 10);
    let waiter = h.spawn("waiter", 4);
    let lock = holder_with_lock(&mut h, &holder);
    h.ready(&waiter);
    h.sched.yield_current(&mut h.cpu);
    h.sched.acquire_lock(&mut h.cpu, lock).unwrap();

    assert_eq!(h.current(), holder);
    let next = h.sched.finish_current(&mut h.cpu);
    assert_eq!(next, waiter);
    assert_eq!(h.sched.lock_holder(lock).unwrap(), Some(waiter.id()));
}

#[test]
fn disabled_donation_leaves_holder_alone() {
    let mut h = Harness::new(SchedulerConfig::new().with_donation(false));
    let low = h.spawn("low", 30);
    let high = h.spawn("high", 1);
    let lock = holder_with_lock(&mut h, &low);
    h.ready(&high);
    h.sched.yield_current(&mut h.cpu);
    h.sched.acquire_lock(&mut h.cpu, lock).unwrap();

    assert_eq!(h.effective(&low), 30);
    assert_eq!(h.sched.lock_donated_priority(lock).unwrap(), None);
    assert_eq!(h.sched.lock_waiters(lock).unwrap(), [high.id()]);
}

#[test]
#[should_panic(expected = "already holds")]
fn reacquiring_own_lock_is_fatal() {
    let mut h = Harness::new(SchedulerConfig::new());
    let t = h.spawn("t", 5);
    let lock = holder_with_lock(&mut h, &t);
    let _ = h.sched.acquire_lock(&mut h.cpu, lock);
}

#[test]
fn unknown_lock_is_an_error() {
    let mut h = Harness::new(SchedulerConfig::new());
    let err = h
        .sched
        .acquire_lock(&mut h.cpu, teachos_kernel::scheduler::LockId(999))
        .unwrap_err();
    assert_eq!(err, teachos_kernel::SchedulerError::LockNotFound { lock_id: 999 });
}

proptest! {
    /// One holder, any number of waiters with any priorities, released one
    /// by one: donated priorities always match the waiters
    #[test]
    fn donation_tracks_waiters(
        holder_priority in 1i32..=40,
        waiters in proptest::collection::vec(1i32..=40, 0..12),
    ) {
        let config = SchedulerConfig::new();
        let mut table = ThreadTable::new(config);
        let mut locks = LockTable::new(true);
        let lock = locks.create();

        let holder = ThreadHandle::new("holder");
        table.get_or_create(&holder).set_priority(holder_priority, &config);
        locks.acquire(lock, holder.id(), &mut table).unwrap();

        let mut handles = Vec::new();
        for &p in &waiters {
            let w = ThreadHandle::new("w");
            table.get_or_create(&w).set_priority(p, &config);
            locks.acquire(lock, w.id(), &mut table).unwrap();
            handles.push(w);
        }

        let expected = waiters.iter().copied().min().map_or(holder_priority, |m| m.min(holder_priority));
        prop_assert_eq!(table.effective_priority(holder.id()), expected);
        prop_assert!(locks.verify(&table));

        let mut current = holder.id();
        while let Some(next) = locks.release(lock, current, &mut table).unwrap().next_holder {
            prop_assert!(locks.verify(&table));
            let base = table.get(current).unwrap().priority();
            prop_assert_eq!(table.effective_priority(current), base);
            current = next;
        }
        prop_assert_eq!(locks.get(lock).unwrap().holder(), None);
    }
}
