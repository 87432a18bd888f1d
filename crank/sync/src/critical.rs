//! Nesting critical section over a global interrupt gate
//!
//! On a single core with no OS underneath, atomicity is interrupt
//! masking. [`Critical`] counts nested entries so that composed code can
//! open its own section without knowing whether the caller already holds
//! one; interrupts come back on only when the outermost section leaves.

use core::marker::PhantomData;
use core::sync::atomic::{AtomicU32, Ordering};

use crank_core::fault::{die, Fault};

/// Raw interrupt mask seam
///
/// A gate is global chip state, so implementations are unit types. The
/// runtime only requires `mask` to take effect before returning and
/// `unmask` to undo it.
pub trait IntGate {
    /// Disable interrupts globally
    fn mask();

    /// Re-enable interrupts globally
    fn unmask();
}

/// Nesting interrupt-disable region
///
/// Depth mutations happen only while interrupts are masked on a single
/// core; the atomics are for soundness of the shared reference, not for
/// contention.
pub struct Critical<G: IntGate> {
    depth: AtomicU32,
    _gate: PhantomData<G>,
}

impl<G: IntGate> Critical<G> {
    /// Create an open (depth zero) critical section
    pub const fn new() -> Self {
        Self {
            depth: AtomicU32::new(0),
            _gate: PhantomData,
        }
    }

    /// Disable interrupts and push one nesting level
    pub fn enter(&self) {
        G::mask();
        let d = self.depth.load(Ordering::Relaxed);
        self.depth.store(d + 1, Ordering::Relaxed);
    }

    /// Pop one nesting level, re-enabling interrupts at depth zero
    ///
    /// Leaving a section that was never entered is a usage fault: it means
    /// some caller's bookkeeping is wrong and interrupts may already be
    /// live inside code that assumes exclusivity.
    pub fn leave(&self) {
        let d = self.depth.load(Ordering::Relaxed);
        if d == 0 {
            die(Fault::CriticalUnderflow);
        }
        self.depth.store(d - 1, Ordering::Relaxed);
        if d == 1 {
            G::unmask();
        }
    }

    /// Reset the depth to zero and unmask unconditionally
    ///
    /// Reserved for the emergency-stop recovery path. Ordinary code must
    /// not call this: it unmasks interrupts inside any section that is
    /// still open further up the call stack.
    pub fn force_exit(&self) {
        self.depth.store(0, Ordering::Relaxed);
        G::unmask();
    }

    /// Run a closure inside the section
    pub fn with<R>(&self, f: impl FnOnce() -> R) -> R {
        self.enter();
        let r = f();
        self.leave();
        r
    }

    /// Current nesting depth
    pub fn depth(&self) -> u32 {
        self.depth.load(Ordering::Relaxed)
    }
}

impl<G: IntGate> Default for Critical<G> {
    fn default() -> Self {
        Self::new()
    }
}

/// PRIMASK-based gate for Cortex-M targets
#[cfg(target_arch = "arm")]
pub struct CortexGate;

#[cfg(target_arch = "arm")]
impl IntGate for CortexGate {
    fn mask() {
        cortex_m::interrupt::disable();
    }

    fn unmask() {
        // SAFETY: only reached when the owning Critical's depth returns to
        // zero, i.e. no section believes interrupts are still masked.
        unsafe { cortex_m::interrupt::enable() }
    }
}

/// Software gate that records the mask state instead of touching hardware
///
/// Stand-in for host builds and tests; the flag is global, like the real
/// PRIMASK bit it shadows.
pub struct SoftGate;

static SOFT_MASKED: core::sync::atomic::AtomicBool = core::sync::atomic::AtomicBool::new(false);

impl SoftGate {
    /// Whether the shadow mask is currently set
    pub fn is_masked() -> bool {
        SOFT_MASKED.load(Ordering::Relaxed)
    }
}

impl IntGate for SoftGate {
    fn mask() {
        SOFT_MASKED.store(true, Ordering::Relaxed);
    }

    fn unmask() {
        SOFT_MASKED.store(false, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::AtomicBool;

    // Each test gets its own gate type: the mask flag is global state,
    // and the test harness runs tests concurrently.
    macro_rules! test_gate {
        ($gate:ident, $flag:ident) => {
            static $flag: AtomicBool = AtomicBool::new(false);
            struct $gate;
            impl IntGate for $gate {
                fn mask() {
                    $flag.store(true, Ordering::Relaxed);
                }
                fn unmask() {
                    $flag.store(false, Ordering::Relaxed);
                }
            }
        };
    }

    #[test]
    fn test_nesting_reenables_only_at_zero() {
        test_gate!(NestGate, NEST_MASKED);
        let crit: Critical<NestGate> = Critical::new();
        crit.enter();
        crit.enter();
        crit.enter();
        assert_eq!(crit.depth(), 3);
        crit.leave();
        crit.leave();
        assert!(NEST_MASKED.load(Ordering::Relaxed)); // one level still open
        crit.leave();
        assert!(!NEST_MASKED.load(Ordering::Relaxed));
        assert_eq!(crit.depth(), 0);
    }

    #[test]
    fn test_with_balances() {
        test_gate!(WithGate, WITH_MASKED);
        let crit: Critical<WithGate> = Critical::new();
        let out = crit.with(|| {
            assert!(WITH_MASKED.load(Ordering::Relaxed));
            assert_eq!(crit.depth(), 1);
            42
        });
        assert_eq!(out, 42);
        assert_eq!(crit.depth(), 0);
        assert!(!WITH_MASKED.load(Ordering::Relaxed));
    }

    #[test]
    fn test_force_exit_resets() {
        test_gate!(ForceGate, FORCE_MASKED);
        let crit: Critical<ForceGate> = Critical::new();
        crit.enter();
        crit.enter();
        crit.force_exit();
        assert_eq!(crit.depth(), 0);
        assert!(!FORCE_MASKED.load(Ordering::Relaxed));
    }

    #[test]
    #[should_panic(expected = "critical section underflow")]
    fn test_underflow_is_a_fault() {
        test_gate!(UnderGate, UNDER_MASKED);
        let crit: Critical<UnderGate> = Critical::new();
        crit.leave();
    }
}
