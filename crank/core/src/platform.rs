//! Hardware collaborator seam
//!
//! The scheduler never touches registers. Everything it needs from the
//! chip comes through these traits: a way to pend the context-switch
//! exception, a low-power wait, interrupt-context detection, and a tick
//! timer that calls back into the kernel from its ISR.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Services the scheduler core requires from the target
pub trait Platform: Sync {
    /// Set the context-switch exception pending
    ///
    /// The switch itself must happen at the next safe exception boundary,
    /// never synchronously inside the caller.
    fn pend_switch(&self);

    /// Low-power wait until the next interrupt
    fn idle_wait(&self);

    /// Whether the current call runs in interrupt context
    fn in_interrupt(&self) -> bool;
}

/// Hardware tick timer collaborator
///
/// The timer's ISR is expected to call the kernel's `tick()` entry.
pub trait TickTimer {
    /// Arm a periodic interrupt every `ticks` timer units
    fn arm_periodic(&mut self, ticks: u32);

    /// Arm a single interrupt `ticks` timer units from now
    fn arm_oneshot(&mut self, ticks: u32);

    /// Disarm the timer
    fn disarm(&mut self);
}

/// Platform stub that does nothing
///
/// Useful before the real port is bound, and as the default for kernel
/// instances that are only exercised from thread mode.
pub struct NullPlatform;

impl Platform for NullPlatform {
    fn pend_switch(&self) {}

    fn idle_wait(&self) {}

    fn in_interrupt(&self) -> bool {
        false
    }
}

/// Software-only platform for host builds and tests
///
/// Records switch requests instead of pending a hardware exception and
/// lets the caller fake interrupt context.
pub struct SoftPlatform {
    in_irq: AtomicBool,
    switch_requests: AtomicU32,
}

impl SoftPlatform {
    pub const fn new() -> Self {
        Self {
            in_irq: AtomicBool::new(false),
            switch_requests: AtomicU32::new(0),
        }
    }

    /// Pretend subsequent calls run in interrupt context
    pub fn set_in_interrupt(&self, value: bool) {
        self.in_irq.store(value, Ordering::Relaxed);
    }

    /// Number of switch requests pended so far
    pub fn switch_requests(&self) -> u32 {
        self.switch_requests.load(Ordering::Relaxed)
    }
}

impl Platform for SoftPlatform {
    fn pend_switch(&self) {
        self.switch_requests.fetch_add(1, Ordering::Relaxed);
    }

    fn idle_wait(&self) {
        core::hint::spin_loop();
    }

    fn in_interrupt(&self) -> bool {
        self.in_irq.load(Ordering::Relaxed)
    }
}

impl Default for SoftPlatform {
    fn default() -> Self {
        Self::new()
    }
}
