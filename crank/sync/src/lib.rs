#![no_std]

//! # Crank Sync
//!
//! Synchronization primitives below the scheduler: the nesting
//! interrupt-masking critical section every other component builds its
//! atomicity on, and the single-slot ownership-transfer data host that
//! hands buffers between interrupt and thread context without copying
//! and without concurrent access.

pub mod critical;
pub mod host;
pub mod node;

pub use critical::*;
pub use host::*;
pub use node::*;
