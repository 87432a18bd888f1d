//! Fault sink for unrecoverable conditions
//!
//! Usage faults (a caller broke a precondition) and init-time table
//! exhaustion are programming errors, not load conditions. They are
//! reported here and never return: silently continuing would mask a
//! corrupted concurrency invariant.

use core::fmt;

/// Unrecoverable fault classes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// `leave()` called on a critical section with depth zero
    CriticalUnderflow,
    /// `get_task` called on an event that is not firing
    EventNotArmed,
    /// Event created with a task limit above `MAX_EVENT_TASKS`
    EventLimit,
    /// `receive_ownership` on a host that already owns its buffer
    HostAlreadyOwned,
    /// `initialise_data` on a host that does not own its buffer
    HostNotOwned,
    /// `initialise_data` on a host whose buffer is already initialised
    HostAlreadyInitialised,
    /// `unlock` aimed at the pool or an out-of-range sequence id
    BadUnlock,
    /// A semaphore, event, or handle index that was never created
    BadHandle,
    /// Context table exhausted during spawn
    ContextTableFull,
    /// Semaphore table exhausted at creation
    SemaphoreTableFull,
    /// Event table exhausted at creation
    EventTableFull,
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fault::CriticalUnderflow => write!(f, "critical section underflow"),
            Fault::EventNotArmed => write!(f, "get_task on an event that is not firing"),
            Fault::EventLimit => write!(f, "event task limit exceeds the hard bound"),
            Fault::HostAlreadyOwned => write!(f, "receive_ownership on an owned host"),
            Fault::HostNotOwned => write!(f, "initialise_data on a handed-off host"),
            Fault::HostAlreadyInitialised => write!(f, "initialise_data on a full host"),
            Fault::BadUnlock => write!(f, "unlock on the pool or a bad sequence id"),
            Fault::BadHandle => write!(f, "operation on a handle that was never created"),
            Fault::ContextTableFull => write!(f, "context table full"),
            Fault::SemaphoreTableFull => write!(f, "semaphore table full"),
            Fault::EventTableFull => write!(f, "event table full"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Fault {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Fault::CriticalUnderflow => defmt::write!(fmt, "CriticalUnderflow"),
            Fault::EventNotArmed => defmt::write!(fmt, "EventNotArmed"),
            Fault::EventLimit => defmt::write!(fmt, "EventLimit"),
            Fault::HostAlreadyOwned => defmt::write!(fmt, "HostAlreadyOwned"),
            Fault::HostNotOwned => defmt::write!(fmt, "HostNotOwned"),
            Fault::HostAlreadyInitialised => defmt::write!(fmt, "HostAlreadyInitialised"),
            Fault::BadUnlock => defmt::write!(fmt, "BadUnlock"),
            Fault::BadHandle => defmt::write!(fmt, "BadHandle"),
            Fault::ContextTableFull => defmt::write!(fmt, "ContextTableFull"),
            Fault::SemaphoreTableFull => defmt::write!(fmt, "SemaphoreTableFull"),
            Fault::EventTableFull => defmt::write!(fmt, "EventTableFull"),
        }
    }
}

/// Report an unrecoverable fault and halt
///
/// On embedded targets the panic handler installed by the application
/// (halt, reset, blink code) takes over from here.
pub fn die(fault: Fault) -> ! {
    #[cfg(feature = "defmt")]
    defmt::error!("fault: {}", fault);
    panic!("fault: {}", fault);
}
