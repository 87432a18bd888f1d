//! Execution contexts: saved-state units of cooperative execution
//!
//! Contexts are the expensive half of the two-level design: full threads
//! of control with their own stacks, multiplexed round-robin on the
//! single core. The core tracks their bookkeeping; the port layer owns
//! the actual stack switching.

use core::fmt;

use crank_core::config::MAX_CONTEXTS;
use crank_core::{ContextId, SliceCtr, TaskArg};

/// Context life-cycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CtxState {
    /// Runnable, waiting in the rotation
    Pending,
    /// Currently executing (at most one per core)
    Active,
    /// Blocked on a semaphore, out of the rotation
    Stopped,
    /// Exited; the slot is about to be reclaimed
    Terminated,
}

impl fmt::Display for CtxState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CtxState::Pending => write!(f, "Pending"),
            CtxState::Active => write!(f, "Active"),
            CtxState::Stopped => write!(f, "Stopped"),
            CtxState::Terminated => write!(f, "Terminated"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for CtxState {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            CtxState::Pending => defmt::write!(fmt, "Pending"),
            CtxState::Active => defmt::write!(fmt, "Active"),
            CtxState::Stopped => defmt::write!(fmt, "Stopped"),
            CtxState::Terminated => defmt::write!(fmt, "Terminated"),
        }
    }
}

/// Context entry function
pub type EntryFn = fn(TaskArg);

/// Context exit hook, run when the entry function returns
pub type ExitFn = fn();

/// Stack bounds handed to the port layer
///
/// The core never dereferences these; they exist so the port can set up
/// and check the context's stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackRegion {
    base: usize,
    size: usize,
}

impl StackRegion {
    pub const fn new(base: usize, size: usize) -> Self {
        Self { base, size }
    }

    pub const fn base(self) -> usize {
        self.base
    }

    pub const fn size(self) -> usize {
        self.size
    }

    /// First address past the region (full-descending stacks start here)
    pub const fn top(self) -> usize {
        self.base + self.size
    }
}

/// One execution context record
pub struct Context {
    entry: EntryFn,
    arg: TaskArg,
    on_exit: Option<ExitFn>,
    stack: StackRegion,
    saved_sp: usize,
    state: CtxState,
    slice: SliceCtr,
    quantum: u32,
}

impl Context {
    /// Create a pending context with a full time slice
    pub fn new(
        entry: EntryFn,
        arg: TaskArg,
        on_exit: Option<ExitFn>,
        stack: StackRegion,
        quantum: u32,
    ) -> Self {
        Self {
            entry,
            arg,
            on_exit,
            stack,
            saved_sp: stack.top(),
            state: CtxState::Pending,
            slice: SliceCtr::new(quantum),
            quantum,
        }
    }

    pub fn entry(&self) -> EntryFn {
        self.entry
    }

    pub fn arg(&self) -> TaskArg {
        self.arg
    }

    pub fn on_exit(&self) -> Option<ExitFn> {
        self.on_exit
    }

    pub fn stack(&self) -> StackRegion {
        self.stack
    }

    pub fn state(&self) -> CtxState {
        self.state
    }

    pub fn set_state(&mut self, state: CtxState) {
        self.state = state;
    }

    /// Saved stack pointer (port bookkeeping)
    pub fn saved_sp(&self) -> usize {
        self.saved_sp
    }

    /// Update the saved stack pointer (port bookkeeping)
    pub fn set_saved_sp(&mut self, sp: usize) {
        self.saved_sp = sp;
    }

    /// Burn one slice tick; true on the transition to zero
    pub fn tick_slice(&mut self) -> bool {
        self.slice.decrement()
    }

    /// Refill the time slice to the context's quantum
    pub fn reset_slice(&mut self) {
        self.slice.reload(self.quantum);
    }

    /// Remaining slice ticks
    pub fn slice_remaining(&self) -> u32 {
        self.slice.remaining()
    }
}

/// Fixed table of context slots
pub struct ContextTable {
    slots: [Option<Context>; MAX_CONTEXTS],
}

impl ContextTable {
    pub const fn new() -> Self {
        const NONE: Option<Context> = None;
        Self {
            slots: [NONE; MAX_CONTEXTS],
        }
    }

    /// Claim the first free slot; `None` when the table is full
    pub fn insert(&mut self, ctx: Context) -> Option<ContextId> {
        for (i, slot) in self.slots.iter_mut().enumerate() {
            if slot.is_none() {
                *slot = Some(ctx);
                return Some(ContextId::new(i as u8));
            }
        }
        None
    }

    pub fn get(&self, id: ContextId) -> Option<&Context> {
        self.slots.get(id.index())?.as_ref()
    }

    pub fn get_mut(&mut self, id: ContextId) -> Option<&mut Context> {
        self.slots.get_mut(id.index())?.as_mut()
    }

    /// Free a slot, returning the record (context destruction)
    pub fn remove(&mut self, id: ContextId) -> Option<Context> {
        self.slots.get_mut(id.index())?.take()
    }

    /// Ids of all occupied slots, in table order
    pub fn ids(&self) -> impl Iterator<Item = ContextId> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_some())
            .map(|(i, _)| ContextId::new(i as u8))
    }

    /// Number of live contexts
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(|slot| slot.is_none())
    }
}

impl Default for ContextTable {
    fn default() -> Self {
        Self::new()
    }
}
