#![warn(missing_debug_implementations, rust_2018_idioms)]

//! Synchronous flow-control primitives.
//!
//! Sluice provides the small set of coordination building blocks needed to put
//! a bounded, multi-producer queue in front of a single consumer thread:
//! a counting-semaphore [`coord::CapacityGate`], a one-shot [`coord::Event`],
//! a lock-free MPSC queue ([`mpsc`]) and an adaptive [`sync_util::SpinWait`].
//! Everything here is purely synchronous; there is no async runtime anywhere
//! in the dependency tree.

pub mod coord;
pub mod error;
pub mod mpsc;
pub mod sync_util;

// Internal utilities - not part of the public API.
mod internal;

// Public re-exports for convenience.
pub use error::{RecvError, SendError, TryRecvError};
