// tests/common/mod.rs
// Test doubles shared by the integration tests.
#![allow(dead_code)]

use parking_lot::Mutex;
use sluice_logging::setup::SetupLog;
use sluice_logging::startable::{Lifecycle, Startable, StartableState, StateListener};
use sluice_logging::writer::{AnyEntryWriter, EntryWriter, LogWriter};
use sluice_logging::{Result, TraceEntry};
use std::any::TypeId;
use std::collections::HashSet;
use std::io::{self, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::ThreadId;
use std::time::Duration;

/// A trace sink that counts, records and optionally delays every write.
#[derive(Default)]
pub struct CountingSink {
  count: AtomicUsize,
  delay: Option<Duration>,
  entries: Mutex<Vec<TraceEntry>>,
  writer_threads: Mutex<HashSet<ThreadId>>,
}

impl CountingSink {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_delay(delay: Duration) -> Self {
    Self {
      delay: Some(delay),
      ..Self::default()
    }
  }

  pub fn count(&self) -> usize {
    self.count.load(Ordering::SeqCst)
  }

  pub fn messages(&self) -> Vec<String> {
    self.entries.lock().iter().map(|e| e.message.clone()).collect()
  }

  pub fn writer_threads(&self) -> HashSet<ThreadId> {
    self.writer_threads.lock().clone()
  }
}

impl EntryWriter<TraceEntry> for CountingSink {
  fn write(&self, entry: &TraceEntry) {
    if let Some(delay) = self.delay {
      std::thread::sleep(delay);
    }
    self.writer_threads.lock().insert(std::thread::current().id());
    self.entries.lock().push(entry.clone());
    self.count.fetch_add(1, Ordering::SeqCst);
  }
}

/// A sink that panics on every write.
pub struct PanickingSink;

impl EntryWriter<TraceEntry> for PanickingSink {
  fn write(&self, _entry: &TraceEntry) {
    panic!("sink rejects everything");
  }
}

/// A second entry shape, for pipelines carrying more than one entry type.
#[derive(Debug, Clone)]
pub struct AuditEntry {
  pub action: String,
}

#[derive(Default)]
pub struct AuditSink {
  count: AtomicUsize,
}

impl AuditSink {
  pub fn count(&self) -> usize {
    self.count.load(Ordering::SeqCst)
  }
}

impl EntryWriter<AuditEntry> for AuditSink {
  fn write(&self, _entry: &AuditEntry) {
    self.count.fetch_add(1, Ordering::SeqCst);
  }
}

/// A log writer whose own `start` stalls, standing in for a slow sink.
pub struct SlowStartWriter {
  lifecycle: Lifecycle,
  writers: Vec<(TypeId, Arc<dyn AnyEntryWriter>)>,
  start_delay: Duration,
}

impl SlowStartWriter {
  pub fn new(
    start_delay: Duration,
    writers: Vec<(TypeId, Arc<dyn AnyEntryWriter>)>,
    setup_log: SetupLog,
  ) -> Self {
    Self {
      lifecycle: Lifecycle::new("slow-start", setup_log),
      writers,
      start_delay,
    }
  }
}

impl Startable for SlowStartWriter {
  fn state(&self) -> StartableState {
    self.lifecycle.state()
  }

  fn start(&self) -> Result<()> {
    self.lifecycle.run_start(|_| {
      std::thread::sleep(self.start_delay);
      Ok(())
    })
  }

  fn stop(&self) -> Result<()> {
    self.lifecycle.run_stop(|| Ok(()))
  }

  fn dispose(&self) -> Result<()> {
    self.lifecycle.run_dispose(|| {})
  }

  fn on_state_change(&self, listener: StateListener) {
    self.lifecycle.add_listener(listener);
  }
}

impl LogWriter for SlowStartWriter {
  fn name(&self) -> &str {
    "slow-start"
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

/// An `io::Write` handle over a shared byte buffer.
#[derive(Clone, Default)]
pub struct SharedBuffer {
  bytes: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
  pub fn contents(&self) -> String {
    String::from_utf8(self.bytes.lock().clone()).unwrap()
  }
}

impl Write for SharedBuffer {
  fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
    self.bytes.lock().extend_from_slice(buf);
    Ok(buf.len())
  }

  fn flush(&mut self) -> io::Result<()> {
    Ok(())
  }
}
