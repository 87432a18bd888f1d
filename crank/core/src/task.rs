//! Deferred work items and handle newtypes

use core::fmt;

/// Opaque argument token carried by a task or context
///
/// Stands in for the producer's context data. Producers that need to pass
/// a pointer encode it as the address; value-like producers store the value
/// directly. The runtime never interprets the token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskArg(usize);

impl TaskArg {
    /// The empty argument
    pub const NONE: TaskArg = TaskArg(0);

    /// Wrap a raw token
    pub const fn new(raw: usize) -> Self {
        TaskArg(raw)
    }

    /// Get the raw token back
    pub const fn raw(self) -> usize {
        self.0
    }
}

/// What a task body asks the dispatcher to do with its queue slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Work is finished; the slot is freed
    Done,
    /// Work is not finished; re-enqueue the task for another run
    Reprogram,
}

/// Task body signature
pub type TaskFn = fn(TaskArg) -> TaskOutcome;

/// A deferred unit of work
///
/// Value-like: copied into a queue slot on enqueue, consumed exactly once
/// by the dispatcher. A task has no identity beyond its queue position.
#[derive(Clone, Copy)]
pub struct Task {
    body: TaskFn,
    arg: TaskArg,
}

impl Task {
    /// Create a task from a body and its argument
    pub const fn new(body: TaskFn, arg: TaskArg) -> Self {
        Self { body, arg }
    }

    /// Invoke the body with the stored argument
    pub fn run(self) -> TaskOutcome {
        (self.body)(self.arg)
    }

    /// The stored argument token
    pub const fn arg(self) -> TaskArg {
        self.arg
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("body", &(self.body as usize))
            .field("arg", &self.arg)
            .finish()
    }
}

/// Sequence identifier
///
/// Index 0 is the unordered pool; 1..=`NUM_ORDERED_SEQUENCES` are the
/// ordered, lockable sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SeqId(u8);

impl SeqId {
    /// The unordered task pool
    pub const POOL: SeqId = SeqId(0);

    /// Create a sequence id from a raw index
    pub const fn new(index: u8) -> Self {
        SeqId(index)
    }

    /// Raw index value
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Whether this id names the pool
    pub const fn is_pool(self) -> bool {
        self.0 == 0
    }
}

/// Execution context identifier (slot index in the context table)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextId(u8);

impl ContextId {
    pub const fn new(index: u8) -> Self {
        ContextId(index)
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Semaphore handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SemId(u8);

impl SemId {
    pub const fn new(index: u8) -> Self {
        SemId(index)
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Event handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventId(u8);

impl EventId {
    pub const fn new(index: u8) -> Self {
        EventId(index)
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for SeqId {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "Seq({})", self.0);
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ContextId {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "Ctx({})", self.0);
    }
}
