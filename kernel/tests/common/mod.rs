//! Host harness: scheduler wired to simulated interrupts, clock, CPU and a
//! buffered statistics sink.

#![allow(dead_code)]

use std::sync::Arc;
use teachos_kernel::scheduler::{BufferSink, Priority, SimCpu, ThreadControl, ThreadHandle};
use teachos_kernel::sync::{InterruptGuard, SimInterrupts};
use teachos_kernel::time::{ManualClock, Ticks};
use teachos_kernel::{Scheduler, SchedulerConfig};

pub struct Harness {
    pub sched: Scheduler,
    pub cpu: SimCpu,
    pub irq: Arc<SimInterrupts>,
    pub clock: Arc<ManualClock>,
    pub sink: BufferSink,
}

impl Harness {
    pub fn new(config: SchedulerConfig) -> Self {
        let irq = Arc::new(SimInterrupts::new());
        let clock = Arc::new(ManualClock::new());
        let sink = BufferSink::new();
        let sched = Scheduler::new(config, irq.clone(), clock.clone(), Box::new(sink.clone()))
            .expect("valid config");
        Self {
            sched,
            cpu: SimCpu::new(),
            irq,
            clock,
            sink,
        }
    }

    /// Run `f` inside the atomic region
    pub fn atomic<R>(&mut self, f: impl FnOnce(&mut Scheduler, &mut SimCpu) -> R) -> R {
        let irq = Arc::clone(&self.irq);
        let _guard = InterruptGuard::new(&*irq);
        f(&mut self.sched, &mut self.cpu)
    }

    /// New thread with `priority`, not yet ready
    pub fn spawn(&mut self, name: &str, priority: Priority) -> ThreadHandle {
        let thread = ThreadHandle::new(name);
        self.atomic(|sched, _| sched.set_priority(&thread, priority));
        thread
    }

    pub fn ready(&mut self, thread: &ThreadHandle) {
        self.atomic(|sched, cpu| sched.make_ready(cpu, thread));
    }

    pub fn dispatch(&mut self) -> ThreadHandle {
        self.atomic(|sched, cpu| sched.run_next(cpu))
    }

    pub fn priority(&mut self, thread: &ThreadHandle) -> Priority {
        self.atomic(|sched, _| sched.get_priority(thread))
    }

    pub fn effective(&mut self, thread: &ThreadHandle) -> Priority {
        self.atomic(|sched, _| sched.get_effective_priority(thread))
    }

    /// Thread on the simulated CPU
    pub fn current(&self) -> ThreadHandle {
        self.cpu.current_thread()
    }

    pub fn advance(&self, ticks: Ticks) -> Ticks {
        self.clock.advance(ticks)
    }
}
