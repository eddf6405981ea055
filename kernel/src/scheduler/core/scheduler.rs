//! Scheduler Core - priority dispatcher
//!
//! Owns every scheduler registry: the thread table, the wait queues (the
//! ready queue is `QueueId::READY`), the lock table and the run statistics.
//! Threads, queues and locks refer to each other by id only.
//!
//! # Atomic region
//! Queue, priority and dispatch operations require interrupts to already be
//! disabled and assert it. Lock, yield, finish, increase/decrease and
//! shutdown take an `InterruptGuard` themselves, restoring the previous
//! state on every exit path.
//!
//! # Priorities
//! Lower value = more urgent. Effective priority includes donation through
//! held locks; base priority is what `set_priority` and aging change.

use crate::config::SchedulerConfig;
use crate::scheduler::core::error::{SchedulerError, SchedulerResult};
use crate::scheduler::core::statistics::{RunStatistics, StatsReport};
use crate::scheduler::donation::{AcquireOutcome, LockId, LockTable};
use crate::scheduler::events::{LockAction, SchedEvent, StatsSink};
use crate::scheduler::idle::IdleTask;
use crate::scheduler::queue::{PriorityWaitQueue, QueueId};
use crate::scheduler::switch::ThreadControl;
use crate::scheduler::thread::{SchedulingState, ThreadHandle, ThreadId, ThreadTable};
use crate::scheduler::Priority;
use crate::sync::{InterruptController, InterruptGuard};
use crate::time::{Clock, Ticks};
use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::sync::Arc;
use alloc::vec::Vec;

/// Priority scheduler for one CPU
pub struct Scheduler {
    config: SchedulerConfig,

    // Collaborators
    interrupts: Arc<dyn InterruptController>,
    clock: Arc<dyn Clock>,
    sink: Box<dyn StatsSink>,

    // Registries
    threads: ThreadTable,
    queues: BTreeMap<QueueId, PriorityWaitQueue>,
    next_queue_id: u64,
    locks: LockTable,

    stats: RunStatistics,
    idle: IdleTask,
    shut_down: bool,
}

impl Scheduler {
    /// Build a scheduler with an empty ready queue and fresh statistics
    pub fn new(
        config: SchedulerConfig,
        interrupts: Arc<dyn InterruptController>,
        clock: Arc<dyn Clock>,
        sink: Box<dyn StatsSink>,
    ) -> SchedulerResult<Self> {
        config.validate().map_err(|err| crate::sched_error!(err))?;

        let mut queues = BTreeMap::new();
        queues.insert(
            QueueId::READY,
            PriorityWaitQueue::new(QueueId::READY, false, &config),
        );

        log::info!(
            "[SCHED] {} scheduler, priorities {}..={}, aging {}, donation {}",
            config.policy,
            config.priority_min,
            config.priority_max,
            config.aging_interval,
            if config.priority_donation { "on" } else { "off" }
        );

        Ok(Self {
            threads: ThreadTable::new(config),
            locks: LockTable::new(config.priority_donation),
            config,
            interrupts,
            clock,
            sink,
            queues,
            next_queue_id: 1,
            stats: RunStatistics::new(),
            idle: IdleTask::new(),
            shut_down: false,
        })
    }

    #[inline]
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Totals folded in so far
    #[inline]
    pub fn statistics(&self) -> &RunStatistics {
        &self.stats
    }

    /// Scheduling state of `id`, if it has one
    pub fn thread_state(&self, id: ThreadId) -> Option<&SchedulingState> {
        self.threads.get(id)
    }

    pub fn idle_thread(&self) -> &ThreadHandle {
        self.idle.handle()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    /// Ready threads in dispatch order (aging not applied)
    pub fn ready_waiters(&self) -> Vec<ThreadId> {
        self.queues
            .get(&QueueId::READY)
            .map(PriorityWaitQueue::waiters)
            .unwrap_or_default()
    }

    // ═══════════════════════════════════════════════════════════════
    // Wait queues
    // ═══════════════════════════════════════════════════════════════

    /// Create a wait queue using the configured policy
    pub fn new_wait_queue(&mut self, transfer_priority: bool) -> QueueId {
        let id = QueueId(self.next_queue_id);
        self.next_queue_id += 1;
        self.queues
            .insert(id, PriorityWaitQueue::new(id, transfer_priority, &self.config));
        log::trace!("[SCHED] new {} (transfer_priority={})", id, transfer_priority);
        id
    }

    /// Admit `thread` to `queue`
    pub fn wait_for_access(&mut self, queue: QueueId, thread: &ThreadHandle) -> SchedulerResult<()> {
        self.assert_atomic("wait_for_access");
        let now = self.clock.now();
        let wait_queue = self
            .queues
            .get_mut(&queue)
            .ok_or(SchedulerError::QueueNotFound { queue_id: queue.0 })?;
        wait_queue.wait_for_access(thread, &mut self.threads, now);

        let priority = self.threads.effective_priority(thread.id());
        self.emit(SchedEvent::Enqueued {
            time: now,
            thread: thread.clone(),
            priority,
        });
        Ok(())
    }

    /// Take the next thread from `queue`
    pub fn next_thread(&mut self, queue: QueueId) -> SchedulerResult<Option<ThreadHandle>> {
        self.assert_atomic("next_thread");
        let now = self.clock.now();
        let wait_queue = self
            .queues
            .get_mut(&queue)
            .ok_or(SchedulerError::QueueNotFound { queue_id: queue.0 })?;
        let next = wait_queue.next_thread(&mut self.threads, now);
        Ok(next.and_then(|id| self.handle_of(id)))
    }

    /// Make `thread` the owner of an empty `queue`
    pub fn acquire_queue(&mut self, queue: QueueId, thread: &ThreadHandle) -> SchedulerResult<()> {
        self.assert_atomic("acquire_queue");
        self.queues
            .get_mut(&queue)
            .ok_or(SchedulerError::QueueNotFound { queue_id: queue.0 })?
            .acquire(thread.id());
        Ok(())
    }

    pub fn queue_owner(&self, queue: QueueId) -> SchedulerResult<Option<ThreadId>> {
        self.queue(queue).map(PriorityWaitQueue::owner)
    }

    pub fn queue_waiters(&self, queue: QueueId) -> SchedulerResult<Vec<ThreadId>> {
        self.queue(queue).map(PriorityWaitQueue::waiters)
    }

    fn queue(&self, queue: QueueId) -> SchedulerResult<&PriorityWaitQueue> {
        self.queues
            .get(&queue)
            .ok_or(SchedulerError::QueueNotFound { queue_id: queue.0 })
    }

    // ═══════════════════════════════════════════════════════════════
    // Priorities
    // ═══════════════════════════════════════════════════════════════

    pub fn get_priority(&mut self, thread: &ThreadHandle) -> Priority {
        self.assert_atomic("get_priority");
        self.threads.get_or_create(thread).priority()
    }

    pub fn get_effective_priority(&mut self, thread: &ThreadHandle) -> Priority {
        self.assert_atomic("get_effective_priority");
        self.threads.get_or_create(thread).effective_priority()
    }

    /// Set base priority; out-of-range values are fatal
    pub fn set_priority(&mut self, thread: &ThreadHandle, priority: Priority) {
        self.assert_atomic("set_priority");
        let config = self.config;
        let changed = self.threads.get_or_create(thread).set_priority(priority, &config);
        self.priority_changed(thread.id(), changed);
    }

    /// Like `set_priority`, reporting out-of-range values as an error
    pub fn try_set_priority(&mut self, thread: &ThreadHandle, priority: Priority) -> SchedulerResult<()> {
        if !self.config.in_range(priority) {
            return Err(crate::sched_error!(SchedulerError::InvalidPriority {
                value: priority,
                min: self.config.priority_min,
                max: self.config.priority_max,
            }));
        }
        self.set_priority(thread, priority);
        Ok(())
    }

    /// Set base priority after clamping into range
    pub fn set_clamped_priority(&mut self, thread: &ThreadHandle, priority: Priority) {
        let priority = self.config.clamp(priority);
        self.set_priority(thread, priority);
    }

    /// One step more urgent; false at `priority_min`
    pub fn increase_priority(&mut self, thread: &ThreadHandle) -> bool {
        let interrupts = Arc::clone(&self.interrupts);
        let _guard = InterruptGuard::new(&*interrupts);

        let current = self.threads.get_or_create(thread).priority();
        if current <= self.config.priority_min {
            return false;
        }
        self.set_priority(thread, current - 1);
        true
    }

    /// One step less urgent; false at `priority_max`
    pub fn decrease_priority(&mut self, thread: &ThreadHandle) -> bool {
        let interrupts = Arc::clone(&self.interrupts);
        let _guard = InterruptGuard::new(&*interrupts);

        let current = self.threads.get_or_create(thread).priority();
        if current >= self.config.priority_max {
            return false;
        }
        self.set_priority(thread, current + 1);
        true
    }

    // ═══════════════════════════════════════════════════════════════
    // Dispatch
    // ═══════════════════════════════════════════════════════════════

    /// Put `thread` on the ready queue
    pub fn make_ready(&mut self, cpu: &mut dyn ThreadControl, thread: &ThreadHandle) {
        self.assert_atomic("make_ready");
        crate::sched_assert!(!thread.is_idle(), "idle thread made ready");

        let queued = self.threads.get(thread.id()).and_then(SchedulingState::queued_on);
        if queued == Some(QueueId::READY) {
            log::trace!("[SCHED] {} already ready", thread);
            return;
        }

        cpu.make_ready(thread);
        // The ready queue is created in `new` and never removed
        let _ = self.wait_for_access(QueueId::READY, thread);
    }

    /// Dispatch the next ready thread, or idle if there is none
    pub fn run_next(&mut self, cpu: &mut dyn ThreadControl) -> ThreadHandle {
        self.assert_atomic("run_next");
        let now = self.clock.now();

        let next_id = match self.queues.get_mut(&QueueId::READY) {
            Some(ready) => ready.next_thread(&mut self.threads, now),
            None => None,
        };
        let next = match next_id.and_then(|id| self.handle_of(id)) {
            Some(handle) => handle,
            None => self.idle.dispatch(),
        };

        if !next.is_idle() {
            let priority = match self.threads.get_mut(next.id()) {
                Some(state) => {
                    state.log_scheduled(now);
                    state.effective_priority()
                }
                None => self.config.priority_default,
            };
            self.emit(SchedEvent::Scheduled {
                time: now,
                thread: next.clone(),
                priority,
            });
        }

        cpu.switch_to(&next);
        next
    }

    /// Current thread goes back to the ready queue; returns who runs next
    pub fn yield_current(&mut self, cpu: &mut dyn ThreadControl) -> ThreadHandle {
        let interrupts = Arc::clone(&self.interrupts);
        let _guard = InterruptGuard::new(&*interrupts);

        let current = cpu.current_thread();
        if !current.is_idle() {
            self.switch_out(&current);
            self.make_ready(cpu, &current);
        }
        self.run_next(cpu)
    }

    /// Block the current thread until someone makes it ready
    pub fn sleep_current(&mut self, cpu: &mut dyn ThreadControl) -> ThreadHandle {
        self.assert_atomic("sleep_current");
        let current = cpu.current_thread();
        crate::sched_assert!(!current.is_idle(), "idle thread cannot sleep");

        cpu.block_current();
        self.switch_out(&current);
        self.run_next(cpu)
    }

    /// Terminate the current thread; returns who runs next
    ///
    /// Pending lock waits are dropped and held locks handed on.
    pub fn finish_current(&mut self, cpu: &mut dyn ThreadControl) -> ThreadHandle {
        let interrupts = Arc::clone(&self.interrupts);
        let _guard = InterruptGuard::new(&*interrupts);

        let current = cpu.current_thread();
        crate::sched_assert!(!current.is_idle(), "idle thread cannot finish");
        let id = current.id();
        let now = self.clock.now();

        let changed = self.locks.withdraw(id, &mut self.threads);
        self.reposition(&changed, Some(LockAction::Released));
        for lock in self.locks.held_by(id) {
            log::warn!("[SCHED] {} finished holding {}, releasing", current, lock);
            let _ = self.release_held(cpu, lock, &current, now);
        }

        if let Some(queue) = self.threads.get(id).and_then(SchedulingState::queued_on) {
            if let Some(wait_queue) = self.queues.get_mut(&queue) {
                wait_queue.remove(id, &mut self.threads);
            }
        }

        match self.threads.remove(id) {
            Some(state) => {
                if let Some(record) = state.log_finished(now, &mut self.stats) {
                    self.emit(SchedEvent::Finished {
                        thread: current.clone(),
                        record,
                    });
                }
            }
            None if !current.flags().is_exempt() => self.stats.record_unarrived(),
            None => {}
        }
        log::debug!("[SCHED] {} finished at {}", current, now);

        cpu.block_current();
        self.run_next(cpu)
    }

    // ═══════════════════════════════════════════════════════════════
    // Locks
    // ═══════════════════════════════════════════════════════════════

    pub fn new_lock(&mut self) -> LockId {
        self.locks.create()
    }

    /// Acquire `lock` for the current thread, blocking if it is held
    ///
    /// On `Blocked` the CPU has already been handed to the next thread; the
    /// caller owns the lock once it is made ready again.
    pub fn acquire_lock(&mut self, cpu: &mut dyn ThreadControl, lock: LockId) -> SchedulerResult<AcquireOutcome> {
        let interrupts = Arc::clone(&self.interrupts);
        let _guard = InterruptGuard::new(&*interrupts);

        let current = cpu.current_thread();
        let now = self.clock.now();
        self.threads.get_or_create(&current);

        let (outcome, changed) = self.locks.acquire(lock, current.id(), &mut self.threads)?;
        self.reposition(&changed, Some(LockAction::Acquired));

        match outcome {
            AcquireOutcome::Acquired => self.emit_lock(LockAction::Acquired, lock, current.id(), now),
            AcquireOutcome::Blocked { holder } => {
                self.emit_lock(LockAction::Wait, lock, current.id(), now);
                log::debug!(
                    "[SCHED] {} waits on {} held by {} (now {})",
                    current,
                    lock,
                    holder,
                    self.threads.effective_priority(holder)
                );
                cpu.block_current();
                self.switch_out(&current);
                self.run_next(cpu);
            }
        }
        Ok(outcome)
    }

    /// Release `lock`, held by the current thread
    ///
    /// Returns the waiter the lock was handed to, now ready.
    pub fn release_lock(&mut self, cpu: &mut dyn ThreadControl, lock: LockId) -> SchedulerResult<Option<ThreadId>> {
        let interrupts = Arc::clone(&self.interrupts);
        let _guard = InterruptGuard::new(&*interrupts);

        let current = cpu.current_thread();
        let now = self.clock.now();
        self.release_held(cpu, lock, &current, now)
    }

    pub fn lock_holder(&self, lock: LockId) -> SchedulerResult<Option<ThreadId>> {
        self.locks.get(lock).map(|state| state.holder())
    }

    pub fn lock_donated_priority(&self, lock: LockId) -> SchedulerResult<Option<Priority>> {
        self.locks.get(lock).map(|state| state.donated_priority())
    }

    pub fn lock_waiters(&self, lock: LockId) -> SchedulerResult<Vec<ThreadId>> {
        self.locks.get(lock).map(|state| state.waiters().collect())
    }

    /// Do lock donated priorities and holder priorities agree?
    pub fn donation_consistent(&self) -> bool {
        self.locks.verify(&self.threads)
    }

    // ═══════════════════════════════════════════════════════════════
    // Shutdown
    // ═══════════════════════════════════════════════════════════════

    /// Finalize statistics and emit the system summary
    pub fn shutdown(&mut self) -> StatsReport {
        let interrupts = Arc::clone(&self.interrupts);
        let _guard = InterruptGuard::new(&*interrupts);

        let report = self.stats.report();
        if !self.shut_down {
            self.emit(SchedEvent::System(report));
            crate::logger::info("[SCHED] shutdown, statistics finalized");
            self.shut_down = true;
        }
        report
    }

    // ═══════════════════════════════════════════════════════════════
    // Internals
    // ═══════════════════════════════════════════════════════════════

    fn assert_atomic(&self, operation: &str) {
        crate::sched_assert!(
            self.interrupts.disabled(),
            "{} called with interrupts enabled",
            operation
        );
    }

    fn emit(&mut self, event: SchedEvent) {
        self.sink.record(&event);
    }

    fn emit_lock(&mut self, action: LockAction, lock: LockId, thread: ThreadId, time: Ticks) {
        let priority = self.threads.effective_priority(thread);
        self.emit(SchedEvent::Lock {
            action,
            lock,
            time,
            thread,
            priority,
        });
    }

    fn handle_of(&self, id: ThreadId) -> Option<ThreadHandle> {
        match self.threads.get(id) {
            Some(state) => Some(state.handle().clone()),
            None if id == ThreadId::MAIN => Some(ThreadHandle::main()),
            None => None,
        }
    }

    /// Age a thread leaving the CPU
    fn switch_out(&mut self, thread: &ThreadHandle) {
        let now = self.clock.now();
        let changed = self.threads.age_up(thread.id(), now);
        self.priority_changed(thread.id(), changed);
    }

    /// Follow up on a priority change of `id`
    fn priority_changed(&mut self, id: ThreadId, effective_changed: bool) {
        if !effective_changed {
            return;
        }
        let mut changed = self.locks.thread_priority_changed(id, &mut self.threads);
        changed.push(id);
        self.reposition(&changed, None);
    }

    /// Re-sort threads whose effective priority moved in their queues
    fn reposition(&mut self, ids: &[ThreadId], cause: Option<LockAction>) {
        for &id in ids {
            let Some(queue) = self.threads.get(id).and_then(SchedulingState::queued_on) else {
                continue;
            };
            let Some(wait_queue) = self.queues.get_mut(&queue) else {
                continue;
            };
            match cause {
                Some(LockAction::Released) => wait_queue.notify_lock_released(id, &self.threads),
                Some(_) => wait_queue.notify_lock_acquired(id, &self.threads),
                None => wait_queue.reposition(id, &self.threads),
            }
        }
    }

    fn release_held(
        &mut self,
        cpu: &mut dyn ThreadControl,
        lock: LockId,
        holder: &ThreadHandle,
        now: Ticks,
    ) -> SchedulerResult<Option<ThreadId>> {
        let priority = self.threads.effective_priority(holder.id());
        let release = self.locks.release(lock, holder.id(), &mut self.threads)?;
        self.emit(SchedEvent::Lock {
            action: LockAction::Released,
            lock,
            time: now,
            thread: holder.id(),
            priority,
        });
        self.reposition(&release.changed, Some(LockAction::Released));

        if let Some(next) = release.next_holder {
            self.emit_lock(LockAction::Acquired, lock, next, now);
            if let Some(handle) = self.handle_of(next) {
                self.make_ready(cpu, &handle);
            }
        }
        Ok(release.next_holder)
    }
}
