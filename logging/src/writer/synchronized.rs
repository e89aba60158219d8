// src/writer/synchronized.rs

use crate::error::Result;
use crate::model::LogEntry;
use crate::startable::{Startable, StartableState, StateListener};
use crate::writer::{AnyEntryWriter, LogWriter};
use parking_lot::Mutex;
use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

/// Serializes writes to an unsynchronized log writer.
///
/// Each entry writer is wrapped with its own mutex, so different entry types
/// still write concurrently while writes of one type are serialized. This
/// also upholds the formatter pairing rule for text sinks: at most one entry
/// is in flight per formatter.
pub struct SynchronizedLogWriter {
  inner: Arc<dyn LogWriter>,
  writers: Vec<(TypeId, Arc<dyn AnyEntryWriter>)>,
}

impl fmt::Debug for SynchronizedLogWriter {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("SynchronizedLogWriter")
      .field("name", &self.inner.name())
      .finish()
  }
}

struct SerializedEntryWriter {
  inner: Arc<dyn AnyEntryWriter>,
  lock: Mutex<()>,
}

impl AnyEntryWriter for SerializedEntryWriter {
  fn entry_type(&self) -> TypeId {
    self.inner.entry_type()
  }

  fn entry_type_name(&self) -> &'static str {
    self.inner.entry_type_name()
  }

  fn is_enabled(&self) -> bool {
    self.inner.is_enabled()
  }

  fn is_synchronized(&self) -> bool {
    true
  }

  fn write_any(&self, entry: &dyn LogEntry) {
    let _guard = self.lock.lock();
    self.inner.write_any(entry);
  }

  fn as_any(&self) -> &dyn std::any::Any {
    self
  }
}

impl SynchronizedLogWriter {
  /// Wraps `inner`, serializing each of its entry writers.
  ///
  /// The wrap happens once at construction; entry writers registered on the
  /// inner writer afterwards are not picked up, matching the rule that maps
  /// only mutate between stops.
  pub fn new(inner: Arc<dyn LogWriter>) -> Self {
    let writers = inner
      .entry_writers()
      .into_iter()
      .map(|(type_id, writer)| {
        let serialized: Arc<dyn AnyEntryWriter> = Arc::new(SerializedEntryWriter {
          inner: writer,
          lock: Mutex::new(()),
        });
        (type_id, serialized)
      })
      .collect();
    Self { inner, writers }
  }
}

impl Startable for SynchronizedLogWriter {
  fn state(&self) -> StartableState {
    self.inner.state()
  }

  fn start(&self) -> Result<()> {
    self.inner.start()
  }

  fn stop(&self) -> Result<()> {
    self.inner.stop()
  }

  fn dispose(&self) -> Result<()> {
    self.inner.dispose()
  }

  fn on_state_change(&self, listener: StateListener) {
    self.inner.on_state_change(listener);
  }
}

impl LogWriter for SynchronizedLogWriter {
  fn name(&self) -> &str {
    self.inner.name()
  }

  fn is_synchronized(&self) -> bool {
    true
  }

  fn entry_writers(&self) -> Vec<(TypeId, Arc<dyn AnyEntryWriter>)> {
    self.writers.clone()
  }

  fn find_entry_writer(&self, entry_type: TypeId) -> Option<Arc<dyn AnyEntryWriter>> {
    self
      .writers
      .iter()
      .find(|(type_id, _)| *type_id == entry_type)
      .map(|(_, writer)| writer.clone())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::{LogLevel, TraceEntry};
  use crate::setup::SetupLog;
  use crate::writer::{EntryWriter, LogWriterExt, SimpleLogWriter};
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::thread;

  /// A sink that detects overlapping writes.
  #[derive(Default)]
  struct OverlapDetector {
    in_flight: AtomicUsize,
    overlaps: AtomicUsize,
    total: AtomicUsize,
  }

  impl EntryWriter<TraceEntry> for OverlapDetector {
    fn write(&self, _entry: &TraceEntry) {
      if self.in_flight.fetch_add(1, Ordering::SeqCst) > 0 {
        self.overlaps.fetch_add(1, Ordering::SeqCst);
      }
      thread::yield_now();
      self.in_flight.fetch_sub(1, Ordering::SeqCst);
      self.total.fetch_add(1, Ordering::SeqCst);
    }
  }

  #[test]
  fn wrapped_writer_serializes_concurrent_writes() {
    let sink = Arc::new(OverlapDetector::default());
    let inner = SimpleLogWriter::new("inner", SetupLog::new());
    inner.add_entry_writer::<TraceEntry, _>(sink.clone()).unwrap();

    let wrapped = Arc::new(SynchronizedLogWriter::new(Arc::new(inner)));
    assert!(wrapped.is_synchronized());

    let typed = wrapped.entry_writer::<TraceEntry>().unwrap();
    let mut handles = Vec::new();
    for _ in 0..4 {
      let typed = typed.clone();
      handles.push(thread::spawn(move || {
        for i in 0..50 {
          typed.write(&TraceEntry::new("t", LogLevel::Info, format!("m{i}")));
        }
      }));
    }
    for handle in handles {
      handle.join().unwrap();
    }

    assert_eq!(sink.total.load(Ordering::SeqCst), 200);
    assert_eq!(sink.overlaps.load(Ordering::SeqCst), 0);
  }
}
