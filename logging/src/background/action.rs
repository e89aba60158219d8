// src/background/action.rs
// The shared action queues drained by the background worker.

use parking_lot::Mutex;
use sluice::mpsc::{self, UnboundedReceiver, UnboundedSender};
use std::fmt;
use std::sync::Arc;

/// A deferred operation executed on the background worker thread.
pub(crate) type Action = Box<dyn FnOnce() + Send + 'static>;

/// Dispatch priority of a posted action.
///
/// `High` jumps the queue (barrier flushes, shutdown-sync markers). `Normal`
/// is the routine lane for writes and inner lifecycle work. `Delay` lands in
/// the normal lane after one extra queue hop, for housekeeping that must not
/// get ahead of real work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ActionPriority {
  High,
  Normal,
  Delay,
}

struct SchedulerShared {
  high_tx: UnboundedSender<Action>,
  normal_tx: UnboundedSender<Action>,
  // Only the worker thread dequeues; the mutexes are uncontended and exist
  // to keep the single-consumer receivers shareable.
  high_rx: Mutex<UnboundedReceiver<Action>>,
  normal_rx: Mutex<UnboundedReceiver<Action>>,
}

/// Clonable handle to one pipeline's pair of action queues.
pub(crate) struct ActionScheduler {
  shared: Arc<SchedulerShared>,
}

impl fmt::Debug for ActionScheduler {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ActionScheduler")
      .field("high", &self.shared.high_tx.len())
      .field("normal", &self.shared.normal_tx.len())
      .finish()
  }
}

impl Clone for ActionScheduler {
  fn clone(&self) -> Self {
    Self {
      shared: self.shared.clone(),
    }
  }
}

impl ActionScheduler {
  pub(crate) fn new() -> Self {
    let (high_tx, high_rx) = mpsc::unbounded();
    let (normal_tx, normal_rx) = mpsc::unbounded();
    Self {
      shared: Arc::new(SchedulerShared {
        high_tx,
        normal_tx,
        high_rx: Mutex::new(high_rx),
        normal_rx: Mutex::new(normal_rx),
      }),
    }
  }

  /// Posts an action. Sends cannot fail while the scheduler is alive, since
  /// it owns both receiver halves.
  pub(crate) fn post(&self, priority: ActionPriority, action: Action) {
    match priority {
      ActionPriority::High => {
        let _ = self.shared.high_tx.send(action);
      }
      ActionPriority::Normal => {
        let _ = self.shared.normal_tx.send(action);
      }
      ActionPriority::Delay => {
        // One hop through the normal queue: the wrapper re-posts the real
        // action, so it runs after everything queued at submission time.
        let resubmit = self.shared.normal_tx.clone();
        let _ = self.shared.normal_tx.send(Box::new(move || {
          let _ = resubmit.send(action);
        }));
      }
    }
  }

  /// Dequeues the next high-priority action. Worker only.
  pub(crate) fn try_take_high(&self) -> Option<Action> {
    self.shared.high_rx.lock().try_recv().ok()
  }

  /// Dequeues the next normal-priority action. Worker only.
  pub(crate) fn try_take_normal(&self) -> Option<Action> {
    self.shared.normal_rx.lock().try_recv().ok()
  }

  /// Whether both lanes are currently empty.
  pub(crate) fn is_empty(&self) -> bool {
    self.shared.high_tx.is_empty() && self.shared.normal_tx.is_empty()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicUsize, Ordering};

  #[test]
  fn high_lane_preempts_normal_lane() {
    let scheduler = ActionScheduler::new();
    let order = Arc::new(Mutex::new(Vec::new()));

    let sink = order.clone();
    scheduler.post(
      ActionPriority::Normal,
      Box::new(move || sink.lock().push("normal")),
    );
    let sink = order.clone();
    scheduler.post(
      ActionPriority::High,
      Box::new(move || sink.lock().push("high")),
    );

    // Drain the way the worker does: high first.
    while let Some(action) = scheduler.try_take_high() {
      action();
    }
    while let Some(action) = scheduler.try_take_normal() {
      action();
    }
    assert_eq!(*order.lock(), vec!["high", "normal"]);
  }

  #[test]
  fn delay_lands_after_one_extra_hop() {
    let scheduler = ActionScheduler::new();
    let runs = Arc::new(AtomicUsize::new(0));

    let counter = runs.clone();
    scheduler.post(
      ActionPriority::Delay,
      Box::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
      }),
    );

    // First pass executes only the hop wrapper.
    scheduler.try_take_normal().unwrap()();
    assert_eq!(runs.load(Ordering::SeqCst), 0);
    // Second pass executes the real action.
    scheduler.try_take_normal().unwrap()();
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert!(scheduler.is_empty());
  }
}
