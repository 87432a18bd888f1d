//! Single-slot ownership-transfer data host
//!
//! A host is always exclusively on one side of a producer/consumer pair:
//! either it owns its buffer slot (empty or full) or it has handed the
//! buffer away and may not touch it. Transfer is a move of the payload,
//! so "use after hand-off" of the data itself cannot be written; the
//! remaining protocol violations (double receive, double initialise) are
//! usage faults.

use core::cell::RefCell;

use crank_core::fault::{die, Fault};
use crank_core::{Error, Result};
use critical_section::Mutex;

/// The three disjoint states of a host's buffer slot
enum Slot<T> {
    /// Owned, no data yet — writable by the owning side
    Empty,
    /// Owned, data present — readable by the owning side
    Full(T),
    /// Handed to the other side — the host may not touch the buffer
    Handed,
}

/// Exclusively-owned single-slot buffer container
///
/// Not shareable by itself; wrap in [`SharedHost`] to cross the
/// interrupt/thread boundary.
pub struct DataHost<T> {
    slot: Slot<T>,
}

impl<T> DataHost<T> {
    /// Create a host that starts owning an empty slot (producer side)
    pub const fn new() -> Self {
        Self { slot: Slot::Empty }
    }

    /// Create a host that starts with its buffer handed away (consumer side)
    pub const fn handed() -> Self {
        Self { slot: Slot::Handed }
    }

    /// Whether the host currently owns its slot
    pub fn is_owned(&self) -> bool {
        !matches!(self.slot, Slot::Handed)
    }

    /// Whether the owned slot holds initialised data
    pub fn is_initialised(&self) -> bool {
        matches!(self.slot, Slot::Full(_))
    }

    /// Hand the initialised buffer to the caller
    ///
    /// Yields the payload only when the host owns a full slot; the host
    /// transitions to handed-off. Any other state returns `None` and
    /// changes nothing.
    pub fn provide_initialised(&mut self) -> Option<T> {
        match core::mem::replace(&mut self.slot, Slot::Handed) {
            Slot::Full(data) => Some(data),
            other => {
                // Not ours to give away (or nothing there yet) — put the
                // original state back.
                self.slot = other;
                None
            }
        }
    }

    /// Take ownership back from the other side
    ///
    /// `Some(data)` means the buffer comes back initialised; `None` means
    /// it comes back consumed, ready for the next fill. Receiving while
    /// the host already owns the slot is a usage fault — double ownership
    /// is a logic bug, not a race to resolve silently.
    pub fn receive_ownership(&mut self, payload: Option<T>) {
        if self.is_owned() {
            die(Fault::HostAlreadyOwned);
        }
        self.slot = match payload {
            Some(data) => Slot::Full(data),
            None => Slot::Empty,
        };
    }

    /// Fill the owned, empty slot with data
    ///
    /// Faults when the host does not own the slot or the slot is already
    /// initialised.
    pub fn initialise_data(&mut self, data: T) {
        match self.slot {
            Slot::Handed => die(Fault::HostNotOwned),
            Slot::Full(_) => die(Fault::HostAlreadyInitialised),
            Slot::Empty => self.slot = Slot::Full(data),
        }
    }

    /// Non-faulting producer path: fill the slot if it is writable
    pub fn offer(&mut self, data: T) -> Result<()> {
        match self.slot {
            Slot::Empty => {
                self.slot = Slot::Full(data);
                Ok(())
            }
            _ => Err(Error::HostBusy),
        }
    }
}

impl<T> Default for DataHost<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A [`DataHost`] shareable between interrupt and thread context
pub struct SharedHost<T> {
    inner: Mutex<RefCell<DataHost<T>>>,
}

impl<T> SharedHost<T> {
    /// Create a shared host owning an empty slot
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(DataHost::new())),
        }
    }

    /// Run a closure against the host under the critical section
    pub fn with<R>(&self, f: impl FnOnce(&mut DataHost<T>) -> R) -> R {
        critical_section::with(|cs| f(&mut self.inner.borrow_ref_mut(cs)))
    }

    /// See [`DataHost::provide_initialised`]
    pub fn provide_initialised(&self) -> Option<T> {
        self.with(|host| host.provide_initialised())
    }

    /// See [`DataHost::receive_ownership`]
    pub fn receive_ownership(&self, payload: Option<T>) {
        self.with(|host| host.receive_ownership(payload))
    }

    /// See [`DataHost::initialise_data`]
    pub fn initialise_data(&self, data: T) {
        self.with(|host| host.initialise_data(data))
    }

    /// See [`DataHost::offer`]
    pub fn offer(&self, data: T) -> Result<()> {
        self.with(|host| host.offer(data))
    }

    /// Whether the host currently owns its slot
    pub fn is_owned(&self) -> bool {
        self.with(|host| host.is_owned())
    }

    /// Whether the owned slot holds initialised data
    pub fn is_initialised(&self) -> bool {
        self.with(|host| host.is_initialised())
    }
}

impl<T> Default for SharedHost<T> {
    fn default() -> Self {
        Self::new()
    }
}
