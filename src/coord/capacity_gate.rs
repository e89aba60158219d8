//! A counting semaphore bounding the number of items in flight.
//!
//! The `CapacityGate` is the backpressure primitive for bounded producer
//! queues: producers acquire one permit per item and block while none are
//! available; the consumer releases the permit once the item has been fully
//! processed, not merely dequeued. The mutex is only contended when the gate
//! is exhausted and a producer must wait, or when a release has to wake one.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

struct GateInternal {
  /// The number of currently available permits.
  permits: Mutex<usize>,
  available: Condvar,
}

/// A clonable handle to a counting semaphore with a fixed capacity.
pub struct CapacityGate {
  capacity: usize,
  internal: Arc<GateInternal>,
}

impl fmt::Debug for CapacityGate {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CapacityGate")
      .field("capacity", &self.capacity)
      .field("permits", &*self.internal.permits.lock())
      .finish()
  }
}

impl CapacityGate {
  /// Creates a new gate with `capacity` permits available.
  pub fn new(capacity: usize) -> Self {
    Self {
      capacity,
      internal: Arc::new(GateInternal {
        permits: Mutex::new(capacity),
        available: Condvar::new(),
      }),
    }
  }

  /// Returns the total capacity of the gate.
  pub fn capacity(&self) -> usize {
    self.capacity
  }

  /// Returns the number of permits currently available.
  pub fn available(&self) -> usize {
    *self.internal.permits.lock()
  }

  /// Acquires a permit, blocking the current thread until one is available.
  pub fn acquire(&self) {
    let mut permits = self.internal.permits.lock();
    while *permits == 0 {
      self.internal.available.wait(&mut permits);
    }
    *permits -= 1;
  }

  /// Attempts to acquire a permit without blocking.
  pub fn try_acquire(&self) -> bool {
    let mut permits = self.internal.permits.lock();
    if *permits > 0 {
      *permits -= 1;
      true
    } else {
      false
    }
  }

  /// Releases a permit back to the gate, waking one waiting producer.
  ///
  /// Releases beyond the capacity are capped rather than accumulated.
  pub fn release(&self) {
    let mut permits = self.internal.permits.lock();
    *permits = (*permits + 1).min(self.capacity);
    drop(permits);
    self.internal.available.notify_one();
  }
}

impl Clone for CapacityGate {
  fn clone(&self) -> Self {
    Self {
      capacity: self.capacity,
      internal: self.internal.clone(),
    }
  }
}

// Timed acquisition lives apart from the hot path; used by shutdown code that
// must not hang on a wedged consumer.
impl CapacityGate {
  /// Acquires a permit, giving up after `timeout`. Returns whether a permit
  /// was acquired.
  pub fn acquire_timeout(&self, timeout: Duration) -> bool {
    let deadline = std::time::Instant::now() + timeout;
    let mut permits = self.internal.permits.lock();
    while *permits == 0 {
      if self
        .internal
        .available
        .wait_until(&mut permits, deadline)
        .timed_out()
      {
        return false;
      }
    }
    *permits -= 1;
    true
  }
}
