#![no_std]
#![forbid(unsafe_code)]

//! # Crank Sched
//!
//! The scheduler core: ordered task sequences feeding deferred work into
//! the system, a round-robin set of execution contexts sharing the single
//! CPU, counting semaphores that gate those contexts, named events that
//! fan tasks out on demand, and the supervisor loop that recovers from an
//! emergency stop.
//!
//! The design is two-level on purpose: cheap, short deferred work travels
//! as [`Task`] values through the sequences and runs without a context
//! switch, while long-running cooperative loops live in contexts and get
//! fair CPU time through timer-driven preemption.

pub mod context;
pub mod event;
pub mod kernel;
pub mod port;
pub mod semaphore;
pub mod sequence;
pub mod supervisor;

pub use crank_core::*;
pub use context::*;
pub use event::*;
pub use kernel::*;
pub use semaphore::*;
pub use sequence::*;
pub use supervisor::*;
