#![no_std]
#![forbid(unsafe_code)]

//! # Crank Core
//!
//! Shared types for the Crank runtime: the deferred-work `Task` record,
//! handle newtypes, tick counters, configuration constants, the platform
//! seam the scheduler drives its hardware collaborators through, and the
//! fault sink every invariant violation is reported to.

use core::fmt;

pub mod config;
pub mod fault;
pub mod platform;
pub mod task;
pub mod time;

pub use fault::*;
pub use platform::*;
pub use task::*;
pub use time::*;

/// Crank runtime version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Result type used throughout the runtime
pub type Result<T> = core::result::Result<T, Error>;

/// Recoverable (capacity) errors
///
/// These are expected backpressure under load. Operations that can fail
/// this way return a `Result` and leave all state untouched on failure;
/// the caller decides to retry, drop the work, or escalate. Precondition
/// violations are not errors — they go to [`fault::die`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Target sequence FIFO is full
    SequenceFull,
    /// Sequence id is out of range
    BadSequence,
    /// Event task set reached its creation-time limit
    EventFull,
    /// Semaphore wait list is exhausted
    WaitersFull,
    /// Data host already holds an undelivered buffer
    HostBusy,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::SequenceFull => write!(f, "sequence is full"),
            Error::BadSequence => write!(f, "sequence id out of range"),
            Error::EventFull => write!(f, "event task set is full"),
            Error::WaitersFull => write!(f, "semaphore wait list is full"),
            Error::HostBusy => write!(f, "data host is busy"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Error::SequenceFull => defmt::write!(fmt, "SequenceFull"),
            Error::BadSequence => defmt::write!(fmt, "BadSequence"),
            Error::EventFull => defmt::write!(fmt, "EventFull"),
            Error::WaitersFull => defmt::write!(fmt, "WaitersFull"),
            Error::HostBusy => defmt::write!(fmt, "HostBusy"),
        }
    }
}
