//! A one-shot, set-once event.
//!
//! Counterpart to a oneshot channel carrying no value: one side sets the
//! event exactly once, any number of waiters observe it. Used for drain
//! markers posted at the end of work queues.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

struct EventInternal {
  set: Mutex<bool>,
  cond: Condvar,
}

/// A clonable handle to a one-shot event.
pub struct Event {
  internal: Arc<EventInternal>,
}

impl fmt::Debug for Event {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Event")
      .field("set", &*self.internal.set.lock())
      .finish()
  }
}

impl Event {
  pub fn new() -> Self {
    Self {
      internal: Arc::new(EventInternal {
        set: Mutex::new(false),
        cond: Condvar::new(),
      }),
    }
  }

  /// Returns whether the event has been set.
  pub fn is_set(&self) -> bool {
    *self.internal.set.lock()
  }

  /// Sets the event, waking all waiters. Setting twice is a no-op.
  pub fn set(&self) {
    let mut set = self.internal.set.lock();
    if !*set {
      *set = true;
      drop(set);
      self.internal.cond.notify_all();
    }
  }

  /// Blocks until the event is set.
  pub fn wait(&self) {
    let mut set = self.internal.set.lock();
    while !*set {
      self.internal.cond.wait(&mut set);
    }
  }

  /// Blocks until the event is set or `timeout` elapses. Returns whether the
  /// event was observed set.
  pub fn wait_timeout(&self, timeout: Duration) -> bool {
    let deadline = std::time::Instant::now() + timeout;
    let mut set = self.internal.set.lock();
    while !*set {
      if self.internal.cond.wait_until(&mut set, deadline).timed_out() {
        return *set;
      }
    }
    true
  }
}

impl Default for Event {
  fn default() -> Self {
    Self::new()
  }
}

impl Clone for Event {
  fn clone(&self) -> Self {
    Self {
      internal: self.internal.clone(),
    }
  }
}
