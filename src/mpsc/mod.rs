// src/mpsc/mod.rs

//! A multi-producer, single-consumer (MPSC) channel.
//!
//! The channel is unbounded and lock-free on the send path; producers never
//! block and never contend on a mutex. Bounding, where required, is layered
//! on top with a [`crate::coord::CapacityGate`] so that the permit can be
//! released when the consumer has finished *processing* an item rather than
//! when it has merely dequeued it.

mod lockfree;

use std::marker::PhantomData;
use std::sync::Arc;

pub use crate::error::{RecvError, SendError, TryRecvError};
pub use lockfree::{Receiver as UnboundedReceiver, Sender as UnboundedSender};

/// Creates a new unbounded synchronous MPSC channel.
pub fn unbounded<T: Send>() -> (UnboundedSender<T>, UnboundedReceiver<T>) {
  let shared = Arc::new(lockfree::MpscShared::new());
  let producer = UnboundedSender {
    shared: Arc::clone(&shared),
  };
  let consumer = UnboundedReceiver {
    shared,
    _not_sync: PhantomData,
  };
  (producer, consumer)
}
