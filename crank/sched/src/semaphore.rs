//! Counting semaphore state
//!
//! A semaphore gates execution contexts, never data: the counter and the
//! FIFO of blocked context ids live here, while the context state
//! transitions they imply are driven by the kernel, inside its critical
//! section. Either a release wakes the oldest waiter or it increments
//! the counter — never both.

use crank_core::config::MAX_CONTEXTS;
use crank_core::{ContextId, Error, Result};
use heapless::Deque;

/// Allocation counter plus the ordered list of blocked contexts
pub struct Semaphore {
    count: u32,
    waiters: Deque<ContextId, MAX_CONTEXTS>,
}

impl Semaphore {
    /// Create a semaphore with an initial allocation count
    pub const fn new(initial: u32) -> Self {
        Self {
            count: initial,
            waiters: Deque::new(),
        }
    }

    /// Take one allocation if any is available
    pub fn try_acquire(&mut self) -> bool {
        if self.count > 0 {
            self.count -= 1;
            true
        } else {
            false
        }
    }

    /// Append a context to the blocked list (oldest first)
    pub fn enqueue_waiter(&mut self, id: ContextId) -> Result<()> {
        self.waiters.push_back(id).map_err(|_| Error::WaitersFull)
    }

    /// Release one allocation
    ///
    /// Returns the oldest waiter to wake, or `None` after incrementing
    /// the counter when nobody is blocked.
    pub fn release(&mut self) -> Option<ContextId> {
        match self.waiters.pop_front() {
            Some(id) => Some(id),
            None => {
                self.count += 1;
                None
            }
        }
    }

    /// Drop all waiters (emergency-stop recovery)
    pub fn clear_waiters(&mut self) {
        self.waiters.clear();
    }

    /// Current allocation count
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Number of blocked contexts
    pub fn waiting(&self) -> usize {
        self.waiters.len()
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Semaphore {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "Semaphore{{count: {}, waiting: {}}}", self.count, self.waiters.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counting() {
        let mut sem = Semaphore::new(2);
        assert!(sem.try_acquire());
        assert!(sem.try_acquire());
        assert!(!sem.try_acquire()); // exhausted
        assert_eq!(sem.count(), 0);
    }

    #[test]
    fn test_release_prefers_waiters_over_count() {
        let mut sem = Semaphore::new(0);
        sem.enqueue_waiter(ContextId::new(4)).unwrap();
        assert_eq!(sem.release(), Some(ContextId::new(4)));
        // Woke a waiter, so the counter did not move.
        assert_eq!(sem.count(), 0);
        // Nobody left: now the counter takes the release.
        assert_eq!(sem.release(), None);
        assert_eq!(sem.count(), 1);
    }

    #[test]
    fn test_fifo_fairness() {
        let mut sem = Semaphore::new(0);
        sem.enqueue_waiter(ContextId::new(1)).unwrap();
        sem.enqueue_waiter(ContextId::new(2)).unwrap();
        assert_eq!(sem.release(), Some(ContextId::new(1)));
        assert_eq!(sem.release(), Some(ContextId::new(2)));
    }
}
