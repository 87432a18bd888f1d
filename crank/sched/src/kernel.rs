//! The kernel: one struct owning every scheduler table
//!
//! All mutable scheduler state lives in a single [`KernelState`] behind a
//! critical-section mutex — sequences, the context table and rotation,
//! semaphores, events, and the tick counter. A process-wide instance is
//! exposed through free functions for application and ISR code; tests
//! construct private instances.
//!
//! Interrupt-side entry points are `tick()` (timer ISR),
//! `switch_service()` (the port's switch exception handler),
//! `task_enqueue`/`task_pool_enqueue` to hand work to thread mode, and
//! `emergency_stop()`. Everything else is thread-mode API.

use core::cell::RefCell;

use crank_core::config::{DEFAULT_QUANTUM, MAX_EVENTS, MAX_SEMAPHORES};
use crank_core::fault::{die, Fault};
use crank_core::{
    ContextId, EventId, Platform, Result, SemId, SeqId, Task, TaskArg, TaskFn, TaskOutcome, Tick,
};
use critical_section::Mutex;
use heapless::Vec;

use crate::context::{Context, ContextTable, CtxState, EntryFn, ExitFn, StackRegion};
use crate::event::Event;
use crate::semaphore::Semaphore;
use crate::sequence::SequenceSet;

/// A context switch decision handed to the port layer
///
/// `from` is `None` when the core was idle before the switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Switch {
    pub from: Option<ContextId>,
    pub to: ContextId,
}

/// Every table the scheduler owns, in one place
struct KernelState {
    sequences: SequenceSet,
    contexts: ContextTable,
    rotation: heapless::Deque<ContextId, { crank_core::config::MAX_CONTEXTS }>,
    active: Option<ContextId>,
    semaphores: Vec<Semaphore, MAX_SEMAPHORES>,
    events: Vec<Event, MAX_EVENTS>,
    switch_pending: bool,
    estop: bool,
    ticks: Tick,
    platform: Option<&'static dyn Platform>,
}

impl KernelState {
    const fn new() -> Self {
        Self {
            sequences: SequenceSet::new(),
            contexts: ContextTable::new(),
            rotation: heapless::Deque::new(),
            active: None,
            semaphores: Vec::new(),
            events: Vec::new(),
            switch_pending: false,
            estop: false,
            ticks: Tick::ZERO,
            platform: None,
        }
    }

    fn in_interrupt(&self) -> bool {
        self.platform.is_some_and(|p| p.in_interrupt())
    }

    fn pend_switch(&mut self) {
        self.switch_pending = true;
        if let Some(p) = self.platform {
            p.pend_switch();
        }
    }
}

/// The scheduler core
pub struct Kernel {
    state: Mutex<RefCell<KernelState>>,
}

impl Kernel {
    /// Create an empty kernel (no platform bound, no contexts)
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(RefCell::new(KernelState::new())),
        }
    }

    fn with<R>(&self, f: impl FnOnce(&mut KernelState) -> R) -> R {
        critical_section::with(|cs| f(&mut self.state.borrow_ref_mut(cs)))
    }

    /// Bind the hardware collaborator seam
    ///
    /// Call once at startup, before the timer is armed.
    pub fn bind_platform(&self, platform: &'static dyn Platform) {
        self.with(|k| k.platform = Some(platform));
    }

    // --- contexts -----------------------------------------------------

    /// Register an execution context at boot
    ///
    /// The context enters the rotation pending. Table exhaustion is fatal:
    /// the application asked for more contexts than the build provides.
    pub fn spawn(
        &self,
        entry: EntryFn,
        arg: TaskArg,
        on_exit: Option<ExitFn>,
        stack: StackRegion,
        quantum: u32,
    ) -> ContextId {
        self.with(|k| {
            let ctx = Context::new(entry, arg, on_exit, stack, quantum);
            let Some(id) = k.contexts.insert(ctx) else {
                die(Fault::ContextTableFull);
            };
            // One slot per context; the rotation cannot overflow.
            let _ = k.rotation.push_back(id);
            id
        })
    }

    /// Register a context with the default quantum
    pub fn spawn_default(&self, entry: EntryFn, arg: TaskArg, stack: StackRegion) -> ContextId {
        self.spawn(entry, arg, None, stack, DEFAULT_QUANTUM)
    }

    /// The currently executing context, if any
    pub fn current(&self) -> Option<ContextId> {
        self.with(|k| k.active)
    }

    /// A context's life-cycle state (`None` for a freed slot)
    pub fn context_state(&self, id: ContextId) -> Option<CtxState> {
        self.with(|k| k.contexts.get(id).map(|ctx| ctx.state()))
    }

    /// Tear down the active context after its entry function returned
    ///
    /// Runs the exit hook outside the critical section, frees the slot,
    /// and pends a switch to the next pending context.
    pub fn retire_current(&self) {
        let exited = self.with(|k| {
            let id = k.active.take()?;
            if let Some(ctx) = k.contexts.get_mut(id) {
                ctx.set_state(CtxState::Terminated);
            }
            let ctx = k.contexts.remove(id);
            k.pend_switch();
            ctx
        });
        if let Some(ctx) = exited {
            if let Some(exit) = ctx.on_exit() {
                exit();
            }
        }
    }

    // --- task queues --------------------------------------------------

    /// Queue a ready-made task, e.g. one drained from a firing event
    ///
    /// Recoverable failure under load; an ISR caller that sees `Err` is
    /// expected to drop the work, this core never queues a second
    /// out-of-band failure report.
    pub fn enqueue(&self, seq: SeqId, task: Task) -> Result<()> {
        self.with(|k| k.sequences.add(seq, task))
    }

    /// Queue deferred work on an ordered sequence (or the pool via id 0)
    pub fn task_enqueue(&self, seq: SeqId, body: TaskFn, arg: TaskArg) -> Result<()> {
        self.enqueue(seq, Task::new(body, arg))
    }

    /// Queue unordered background work on the pool
    pub fn task_pool_enqueue(&self, body: TaskFn, arg: TaskArg) -> Result<()> {
        self.task_enqueue(SeqId::POOL, body, arg)
    }

    /// Re-open an ordered sequence after its in-flight task chain settled
    pub fn sequence_unlock(&self, seq: SeqId) {
        self.with(|k| k.sequences.unlock(seq));
    }

    /// Free slots in a sequence
    pub fn sequence_spaces(&self, seq: SeqId) -> Result<usize> {
        self.with(|k| k.sequences.spaces(seq))
    }

    /// Whether a sequence would yield a task right now
    pub fn sequence_ready(&self, seq: SeqId) -> bool {
        self.with(|k| k.sequences.has_ready(seq))
    }

    /// Run the next queued task, if any
    ///
    /// The task body executes outside the critical section — it is free
    /// to enqueue, unlock, and signal. A `Reprogram` outcome puts the
    /// task back at the head of its home sequence and re-opens it, so
    /// the retry runs before its successors.
    pub fn dispatch_once(&self) -> bool {
        let Some((home, task)) = self.with(|k| k.sequences.take_next()) else {
            return false;
        };
        if task.run() == TaskOutcome::Reprogram {
            let requeued = self.with(|k| k.sequences.put_back(home, task));
            if requeued.is_err() {
                // The body refilled its own sequence; the retry is dropped.
                #[cfg(feature = "defmt")]
                defmt::warn!("reprogram dropped: sequence {} is full", home);
            }
        }
        true
    }

    // --- semaphores ---------------------------------------------------

    /// Create a semaphore at init
    pub fn semaphore_create(&self, initial: u32) -> SemId {
        self.with(|k| {
            let id = SemId::new(k.semaphores.len() as u8);
            if k.semaphores.push(Semaphore::new(initial)).is_err() {
                die(Fault::SemaphoreTableFull);
            }
            id
        })
    }

    /// P: take an allocation or block the calling context
    ///
    /// Interrupts are not schedulable contexts: a call from interrupt
    /// context is detected and ignored — ISRs must use the critical
    /// section primitive for mutual exclusion instead.
    pub fn semaphore_p(&self, id: SemId) -> Result<()> {
        self.with(|k| {
            if k.in_interrupt() {
                #[cfg(feature = "defmt")]
                defmt::warn!("semaphore P ignored in interrupt context");
                return Ok(());
            }
            let Some(sem) = k.semaphores.get_mut(id.index()) else {
                die(Fault::BadHandle);
            };
            if sem.try_acquire() {
                return Ok(());
            }
            let Some(current) = k.active else {
                // Nothing schedulable is running (early init); nothing to block.
                return Ok(());
            };
            sem.enqueue_waiter(current)?;
            if let Some(ctx) = k.contexts.get_mut(current) {
                ctx.set_state(CtxState::Stopped);
            }
            k.pend_switch();
            Ok(())
        })
    }

    /// V: wake the oldest waiter or bank the allocation
    ///
    /// Ignored in interrupt context, like [`Kernel::semaphore_p`].
    pub fn semaphore_v(&self, id: SemId) {
        self.with(|k| {
            if k.in_interrupt() {
                #[cfg(feature = "defmt")]
                defmt::warn!("semaphore V ignored in interrupt context");
                return;
            }
            let Some(sem) = k.semaphores.get_mut(id.index()) else {
                die(Fault::BadHandle);
            };
            if let Some(woken) = sem.release() {
                if let Some(ctx) = k.contexts.get_mut(woken) {
                    ctx.set_state(CtxState::Pending);
                }
                // Round robin: woken contexts join at the tail.
                let _ = k.rotation.push_back(woken);
            }
        });
    }

    /// A semaphore's current count (diagnostics)
    pub fn semaphore_count(&self, id: SemId) -> u32 {
        self.with(|k| match k.semaphores.get(id.index()) {
            Some(sem) => sem.count(),
            None => die(Fault::BadHandle),
        })
    }

    // --- events -------------------------------------------------------

    /// Create a named event with a per-event task limit
    pub fn event_create(&self, name: &'static str, max_tasks: usize) -> EventId {
        self.with(|k| {
            let id = EventId::new(k.events.len() as u8);
            if k.events.push(Event::new(name, max_tasks)).is_err() {
                die(Fault::EventTableFull);
            }
            id
        })
    }

    /// Register a task with an event
    pub fn event_append_task(&self, id: EventId, body: TaskFn, arg: TaskArg) -> Result<()> {
        self.with(|k| match k.events.get_mut(id.index()) {
            Some(ev) => ev.append_task(Task::new(body, arg)),
            None => die(Fault::BadHandle),
        })
    }

    /// Arm an event; false when it holds no tasks
    pub fn event_set_pending(&self, id: EventId) -> bool {
        self.with(|k| match k.events.get_mut(id.index()) {
            Some(ev) => ev.set_pending(),
            None => die(Fault::BadHandle),
        })
    }

    /// Take the next task of an event's current firing round
    pub fn event_get_task(&self, id: EventId) -> Task {
        self.with(|k| match k.events.get_mut(id.index()) {
            Some(ev) => ev.get_task(),
            None => die(Fault::BadHandle),
        })
    }

    /// Tasks remaining in an event's current firing round
    pub fn event_pending(&self, id: EventId) -> usize {
        self.with(|k| match k.events.get(id.index()) {
            Some(ev) => ev.pending(),
            None => die(Fault::BadHandle),
        })
    }

    // --- timer & switching --------------------------------------------

    /// Timer ISR entry: advance time and charge the active context
    ///
    /// When the active context's slice expires this only pends the
    /// switch; the switch itself happens at the next safe exception
    /// boundary, in [`Kernel::switch_service`].
    pub fn tick(&self) {
        self.with(|k| {
            k.ticks.increment();
            let Some(id) = k.active else { return };
            let expired = match k.contexts.get_mut(id) {
                Some(ctx) => ctx.tick_slice(),
                None => false,
            };
            if expired {
                k.pend_switch();
            }
        });
    }

    /// Switch exception entry: rotate to the next pending context
    ///
    /// A still-active context is preempted to the tail of the rotation.
    /// Returns the stack swap the port must perform, or `None` when no
    /// context is runnable — the caller should drop into the low-power
    /// wait, that is not an error.
    pub fn switch_service(&self) -> Option<Switch> {
        self.with(|k| {
            k.switch_pending = false;
            let from = k.active;
            if let Some(id) = from {
                if let Some(ctx) = k.contexts.get_mut(id) {
                    if ctx.state() == CtxState::Active {
                        ctx.set_state(CtxState::Pending);
                        ctx.reset_slice();
                        let _ = k.rotation.push_back(id);
                    }
                }
            }
            let next = k.rotation.pop_front();
            k.active = next;
            let to = next?;
            if let Some(ctx) = k.contexts.get_mut(to) {
                ctx.set_state(CtxState::Active);
                ctx.reset_slice();
            }
            #[cfg(feature = "defmt")]
            defmt::trace!("switch to {}", to);
            Some(Switch { from, to })
        })
    }

    /// Whether a switch has been requested and not yet serviced
    pub fn switch_is_pending(&self) -> bool {
        self.with(|k| k.switch_pending)
    }

    /// Current system tick
    pub fn now(&self) -> Tick {
        self.with(|k| k.ticks)
    }

    /// Low-power wait through the bound platform
    pub fn idle_wait(&self) {
        let platform = self.with(|k| k.platform);
        if let Some(p) = platform {
            p.idle_wait();
        }
    }

    // --- emergency stop -----------------------------------------------

    /// System-wide cancellation: drop all queued work immediately
    ///
    /// Safe from any context, ISRs included. Queued tasks are cleared and
    /// events disarmed on the spot; the supervisor completes recovery
    /// from thread mode.
    pub fn emergency_stop(&self) {
        self.with(|k| {
            k.estop = true;
            k.sequences.clear_all();
            for ev in k.events.iter_mut() {
                ev.disarm();
            }
            #[cfg(feature = "defmt")]
            defmt::warn!("emergency stop");
        });
    }

    /// Whether an emergency stop is waiting for recovery
    pub fn estop_pending(&self) -> bool {
        self.with(|k| k.estop)
    }

    /// Complete emergency-stop recovery
    ///
    /// Clears every queue and wait list and returns all surviving
    /// contexts to the rotation, pending, in table order. Called by the
    /// supervisor after it has force-exited the critical section.
    pub fn recover(&self) {
        self.with(|k| {
            k.sequences.clear_all();
            for ev in k.events.iter_mut() {
                ev.disarm();
            }
            for sem in k.semaphores.iter_mut() {
                sem.clear_waiters();
            }
            k.rotation.clear();
            k.active = None;
            k.switch_pending = false;
            let ids: heapless::Vec<ContextId, { crank_core::config::MAX_CONTEXTS }> =
                k.contexts.ids().collect();
            for id in ids {
                if let Some(ctx) = k.contexts.get_mut(id) {
                    if ctx.state() != CtxState::Terminated {
                        ctx.set_state(CtxState::Pending);
                        ctx.reset_slice();
                        let _ = k.rotation.push_back(id);
                    }
                }
            }
            k.estop = false;
        });
    }
}

impl Default for Kernel {
    fn default() -> Self {
        Self::new()
    }
}

/// Process-wide kernel instance
static KERNEL: Kernel = Kernel::new();

/// The global kernel
pub fn kernel() -> &'static Kernel {
    &KERNEL
}

/// Bind the platform to the global kernel
pub fn init(platform: &'static dyn Platform) {
    KERNEL.bind_platform(platform);
}

/// See [`Kernel::spawn`]
pub fn spawn(
    entry: EntryFn,
    arg: TaskArg,
    on_exit: Option<ExitFn>,
    stack: StackRegion,
    quantum: u32,
) -> ContextId {
    KERNEL.spawn(entry, arg, on_exit, stack, quantum)
}

/// See [`Kernel::task_enqueue`]
pub fn task_enqueue(seq: SeqId, body: TaskFn, arg: TaskArg) -> Result<()> {
    KERNEL.task_enqueue(seq, body, arg)
}

/// See [`Kernel::task_pool_enqueue`]
pub fn task_pool_enqueue(body: TaskFn, arg: TaskArg) -> Result<()> {
    KERNEL.task_pool_enqueue(body, arg)
}

/// See [`Kernel::sequence_unlock`]
pub fn sequence_unlock(seq: SeqId) {
    KERNEL.sequence_unlock(seq);
}

/// See [`Kernel::semaphore_create`]
pub fn semaphore_create(initial: u32) -> SemId {
    KERNEL.semaphore_create(initial)
}

/// See [`Kernel::semaphore_p`]
pub fn semaphore_p(id: SemId) -> Result<()> {
    KERNEL.semaphore_p(id)
}

/// See [`Kernel::semaphore_v`]
pub fn semaphore_v(id: SemId) {
    KERNEL.semaphore_v(id)
}

/// See [`Kernel::event_create`]
pub fn event_create(name: &'static str, max_tasks: usize) -> EventId {
    KERNEL.event_create(name, max_tasks)
}

/// See [`Kernel::event_append_task`]
pub fn event_append_task(id: EventId, body: TaskFn, arg: TaskArg) -> Result<()> {
    KERNEL.event_append_task(id, body, arg)
}

/// See [`Kernel::event_set_pending`]
pub fn event_set_pending(id: EventId) -> bool {
    KERNEL.event_set_pending(id)
}

/// See [`Kernel::event_get_task`]
pub fn event_get_task(id: EventId) -> Task {
    KERNEL.event_get_task(id)
}

/// Timer ISR entry for the global kernel
pub fn tick() {
    KERNEL.tick();
}

/// Switch exception entry for the global kernel
pub fn switch_service() -> Option<Switch> {
    KERNEL.switch_service()
}

/// See [`Kernel::dispatch_once`]
pub fn dispatch_once() -> bool {
    KERNEL.dispatch_once()
}

/// See [`Kernel::emergency_stop`]
pub fn emergency_stop() {
    KERNEL.emergency_stop();
}
