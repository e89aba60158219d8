// src/background/proxy.rs
// The foreground-side queue proxy in front of one inner entry writer.

use crate::background::action::{ActionPriority, ActionScheduler};
use crate::background::describe_panic;
use crate::error::{Error, Result};
use crate::model::{LogEntry, LogLevel};
use crate::setup::SetupLog;
use crate::writer::AnyEntryWriter;
use parking_lot::Mutex;
use sluice::coord::{CapacityGate, Event};
use sluice::mpsc::{self, UnboundedReceiver, UnboundedSender};
use std::any::TypeId;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

struct ProxyShared {
  entry_type: TypeId,
  entry_type_name: &'static str,
  inner: Arc<dyn AnyEntryWriter>,

  // One permit per entry in flight: pending in the queue or currently being
  // written. Released by the worker after the inner write finishes, so the
  // gate bounds work, not just storage.
  gate: CapacityGate,
  entries_tx: UnboundedSender<Box<dyn LogEntry>>,
  entries_rx: Mutex<UnboundedReceiver<Box<dyn LogEntry>>>,

  enabled: AtomicBool,
  disposed: AtomicBool,
  fault_count: AtomicUsize,
  setup_log: SetupLog,
}

impl ProxyShared {
  /// Runs on the worker: pop one entry, write it, hand the permit back.
  fn dequeue_and_write(&self) {
    if let Ok(entry) = self.entries_rx.lock().try_recv() {
      let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.inner.write_any(entry.as_ref())));
      if let Err(payload) = outcome {
        let previous = self.fault_count.fetch_add(1, Ordering::AcqRel);
        if previous == 0 {
          self.setup_log.report_fault(
            self.entry_type_name,
            "background write failed; further failures in this run are suppressed",
            describe_panic(&payload),
          );
        }
      }
    }
    self.gate.release();
  }
}

/// The pipeline proxy for a single entry type.
///
/// `write_any` costs an enqueue: one permit, one queue push and one posted
/// action. It blocks only when all permits are taken, which is the
/// backpressure contract, not an error.
pub struct QueueEntryWriter {
  shared: Arc<ProxyShared>,
  scheduler: ActionScheduler,
  stop_timeout: Duration,
}

impl fmt::Debug for QueueEntryWriter {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("QueueEntryWriter")
      .field("entry_type", &self.shared.entry_type_name)
      .field("enabled", &self.shared.enabled.load(Ordering::Relaxed))
      .field("disposed", &self.shared.disposed.load(Ordering::Relaxed))
      .finish()
  }
}

impl QueueEntryWriter {
  pub(crate) fn new(
    inner: Arc<dyn AnyEntryWriter>,
    scheduler: ActionScheduler,
    queue_capacity: usize,
    stop_timeout: Duration,
    setup_log: SetupLog,
  ) -> Self {
    let (entries_tx, entries_rx) = mpsc::unbounded();
    Self {
      shared: Arc::new(ProxyShared {
        entry_type: inner.entry_type(),
        entry_type_name: inner.entry_type_name(),
        inner,
        gate: CapacityGate::new(queue_capacity),
        entries_tx,
        entries_rx: Mutex::new(entries_rx),
        enabled: AtomicBool::new(false),
        disposed: AtomicBool::new(false),
        fault_count: AtomicUsize::new(0),
        setup_log,
      }),
      scheduler,
      stop_timeout,
    }
  }

  /// Enables the proxy. Producers are admitted from this moment on, even
  /// while the inner writer is still starting on the worker thread.
  pub fn start(&self) -> Result<()> {
    if self.shared.disposed.load(Ordering::Acquire) {
      return Err(Error::ObjectDisposed {
        component: self.shared.entry_type_name.to_string(),
      });
    }
    self.shared.fault_count.store(0, Ordering::Release);
    self.shared.enabled.store(true, Ordering::Release);
    Ok(())
  }

  /// Disables the proxy and waits, bounded by the configured timeout, for
  /// everything enqueued so far to drain. On timeout the call returns and
  /// the worker finishes draining on its own.
  pub fn stop(&self) -> Result<()> {
    if self.shared.disposed.load(Ordering::Acquire) {
      return Ok(());
    }
    if !self.shared.enabled.swap(false, Ordering::AcqRel) {
      return Ok(());
    }

    let marker = self.post_drain_marker();
    if !marker.wait_timeout(self.stop_timeout) {
      self.shared.setup_log.report(
        self.shared.entry_type_name,
        LogLevel::Warn,
        "stop timed out waiting for the queue to drain; draining continues in the background",
      );
    }
    Ok(())
  }

  /// Disables the proxy permanently. Fire-and-forget: the drain marker is
  /// posted but not awaited; the owning pipeline's dispose joins the worker.
  pub fn dispose(&self) -> Result<()> {
    if self.shared.disposed.swap(true, Ordering::AcqRel) {
      return Ok(());
    }
    let was_enabled = self.shared.enabled.swap(false, Ordering::AcqRel);
    if was_enabled {
      let _marker = self.post_drain_marker();
    }
    Ok(())
  }

  /// Takes one permit and posts an action that returns it and flags the
  /// marker event. Because the queues are FIFO, the marker fires only after
  /// every entry enqueued before this call has been written.
  fn post_drain_marker(&self) -> Event {
    self.shared.gate.acquire();
    let marker = Event::new();
    let event = marker.clone();
    let gate = self.shared.gate.clone();
    self.scheduler.post(
      ActionPriority::Normal,
      Box::new(move || {
        gate.release();
        event.set();
      }),
    );
    marker
  }

  /// Number of faults the inner writer produced in the current run.
  pub fn fault_count(&self) -> usize {
    self.shared.fault_count.load(Ordering::Acquire)
  }
}

impl AnyEntryWriter for QueueEntryWriter {
  fn entry_type(&self) -> TypeId {
    self.shared.entry_type
  }

  fn entry_type_name(&self) -> &'static str {
    self.shared.entry_type_name
  }

  fn is_enabled(&self) -> bool {
    !self.shared.disposed.load(Ordering::Acquire)
      && self.shared.enabled.load(Ordering::Acquire)
      && self.shared.inner.is_enabled()
  }

  // The single worker thread serializes all writes behind this proxy.
  fn is_synchronized(&self) -> bool {
    true
  }

  fn write_any(&self, entry: &dyn LogEntry) {
    if !self.is_enabled() {
      return;
    }

    self.shared.gate.acquire();
    if self.shared.entries_tx.send(entry.clone_entry()).is_err() {
      self.shared.gate.release();
      return;
    }

    let shared = self.shared.clone();
    self.scheduler.post(
      ActionPriority::Normal,
      Box::new(move || shared.dequeue_and_write()),
    );
  }

  fn as_any(&self) -> &dyn std::any::Any {
    self
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::TraceEntry;
  use crate::writer::{erase_entry_writer, EntryWriter};

  #[derive(Default)]
  struct Counting {
    count: AtomicUsize,
  }

  impl EntryWriter<TraceEntry> for Counting {
    fn write(&self, _entry: &TraceEntry) {
      self.count.fetch_add(1, Ordering::SeqCst);
    }
  }

  fn proxy_over(sink: Arc<Counting>, scheduler: &ActionScheduler) -> QueueEntryWriter {
    QueueEntryWriter::new(
      erase_entry_writer::<TraceEntry, _>(sink),
      scheduler.clone(),
      8,
      Duration::from_millis(200),
      SetupLog::new(),
    )
  }

  #[test]
  fn disabled_proxy_drops_silently() {
    let scheduler = ActionScheduler::new();
    let sink = Arc::new(Counting::default());
    let proxy = proxy_over(sink.clone(), &scheduler);

    proxy.write_any(&TraceEntry::new("t", LogLevel::Info, "dropped"));
    assert!(scheduler.is_empty());
    assert_eq!(sink.count.load(Ordering::SeqCst), 0);
  }

  #[test]
  fn enabled_proxy_enqueues_and_worker_side_drains() {
    let scheduler = ActionScheduler::new();
    let sink = Arc::new(Counting::default());
    let proxy = proxy_over(sink.clone(), &scheduler);
    proxy.start().unwrap();

    proxy.write_any(&TraceEntry::new("t", LogLevel::Info, "a"));
    proxy.write_any(&TraceEntry::new("t", LogLevel::Info, "b"));
    assert_eq!(sink.count.load(Ordering::SeqCst), 0, "write must only enqueue");

    // Drain the way the worker does.
    while let Some(action) = scheduler.try_take_normal() {
      action();
    }
    assert_eq!(sink.count.load(Ordering::SeqCst), 2);
    assert_eq!(proxy.shared.gate.available(), 8);
  }

  #[test]
  fn start_after_dispose_is_refused_but_write_is_silent() {
    let scheduler = ActionScheduler::new();
    let sink = Arc::new(Counting::default());
    let proxy = proxy_over(sink.clone(), &scheduler);
    proxy.start().unwrap();
    proxy.dispose().unwrap();

    assert!(matches!(
      proxy.start(),
      Err(Error::ObjectDisposed { .. })
    ));
    proxy.write_any(&TraceEntry::new("t", LogLevel::Info, "late"));
    assert_eq!(sink.count.load(Ordering::SeqCst), 0);
  }
}
