//! Single-execution node
//!
//! A computation step that owns at most one pending argument buffer.
//! Producers feed the node through its shared host; the node computes
//! when data is available and returns the storage with the initialised
//! state cleared, keeping the hand-off explicit at every step.

use crank_core::Result;

use crate::host::SharedHost;

/// Work function applied to one delivered buffer
pub type NodeFn<T> = fn(&mut T);

/// One computation step fed through an ownership-transfer host
pub struct ExecNode<T> {
    host: SharedHost<T>,
    work: NodeFn<T>,
}

impl<T> ExecNode<T> {
    /// Create a node around a work function
    pub const fn new(work: NodeFn<T>) -> Self {
        Self {
            host: SharedHost::new(),
            work,
        }
    }

    /// Producer side: hand the node its next argument buffer
    ///
    /// Fails with `HostBusy` while the previous buffer is still pending
    /// or being computed on.
    pub fn offer(&self, data: T) -> Result<()> {
        self.host.offer(data)
    }

    /// The node's host, for producers that drive the protocol directly
    pub fn host(&self) -> &SharedHost<T> {
        &self.host
    }

    /// Consumer side: compute if an initialised buffer is pending
    ///
    /// Takes exclusive ownership of the buffer for the duration of the
    /// work function, then returns ownership to the host uninitialised.
    /// Returns whether any work ran.
    pub fn step(&self) -> bool {
        let Some(mut data) = self.host.provide_initialised() else {
            return false;
        };
        (self.work)(&mut data);
        self.host.receive_ownership(None);
        true
    }
}
