//! Compile-time sizing of the runtime's fixed tables
//!
//! Everything here is a hard capacity: the runtime never allocates, so
//! exhausting one of these at init time is fatal (see [`crate::fault`]).

/// Number of ordered (lockable) sequences, not counting the pool
pub const NUM_ORDERED_SEQUENCES: usize = 7;

/// Depth of every sequence FIFO, pool included
pub const SEQUENCE_DEPTH: usize = 16;

/// Maximum number of execution contexts
pub const MAX_CONTEXTS: usize = 8;

/// Maximum number of semaphores created over the system's lifetime
pub const MAX_SEMAPHORES: usize = 8;

/// Maximum number of events created over the system's lifetime
pub const MAX_EVENTS: usize = 8;

/// Hard upper bound on tasks registered with a single event
///
/// Individual events may be created with a smaller limit.
pub const MAX_EVENT_TASKS: usize = 8;

/// Default time slice, in timer ticks, granted to a context per turn
pub const DEFAULT_QUANTUM: u32 = 10;
