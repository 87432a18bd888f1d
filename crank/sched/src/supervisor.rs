//! Top-level supervisory loop and emergency-stop recovery
//!
//! The legacy firmware this core descends from unwound to its recovery
//! point with a non-local jump. Here recovery is an ordinary control
//! path: the supervisor polls for a tripped emergency stop, force-exits
//! the critical section, rebuilds scheduler state, and re-runs the
//! application's init hook before dispatch resumes.

use crank_sync::critical::{Critical, IntGate};

use crate::kernel::Kernel;

/// Application hook re-run after every recovery
pub type InitFn = fn();

/// What one supervisor iteration did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// No queued work; the run loop should idle
    Idle,
    /// One queued task was dispatched
    Dispatched,
    /// An emergency stop was recovered from
    Recovered,
}

/// The single recovery point of the system
pub struct Supervisor<'a, G: IntGate> {
    kernel: &'a Kernel,
    critical: &'a Critical<G>,
    init: InitFn,
}

impl<'a, G: IntGate> Supervisor<'a, G> {
    /// Build the supervisor around the kernel, the system critical
    /// section, and the application init hook
    pub const fn new(kernel: &'a Kernel, critical: &'a Critical<G>, init: InitFn) -> Self {
        Self {
            kernel,
            critical,
            init,
        }
    }

    /// One iteration: recover if tripped, otherwise dispatch one task
    pub fn poll(&self) -> Recovery {
        if self.kernel.estop_pending() {
            // The stop may have fired inside a critical section that will
            // never be left normally; open it before touching state.
            self.critical.force_exit();
            self.kernel.recover();
            (self.init)();
            return Recovery::Recovered;
        }
        if self.kernel.dispatch_once() {
            Recovery::Dispatched
        } else {
            Recovery::Idle
        }
    }

    /// Run forever, idling through the platform when no work is queued
    pub fn run(&self) -> ! {
        loop {
            if self.poll() == Recovery::Idle {
                self.kernel.idle_wait();
            }
        }
    }
}
