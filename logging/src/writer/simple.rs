// src/writer/simple.rs

use crate::error::{Error, Result};
use crate::model::LogEntry;
use crate::setup::SetupLog;
use crate::startable::{Lifecycle, Startable, StartableState, StateListener};
use crate::writer::{erase_entry_writer, AnyEntryWriter, EntryWriter, EntryWriterMap, LogWriter};
use parking_lot::RwLock;
use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

/// A plain log writer: a lifecycle plus a map of entry writers.
///
/// The map is read-mostly; mutation is gated on the writer being in
/// `Unstarted` or `Stopped` state, so readers never observe a half-built
/// registry while the writer is running.
pub struct SimpleLogWriter {
  lifecycle: Lifecycle,
  writers: RwLock<EntryWriterMap>,
  synchronized: bool,
}

impl fmt::Debug for SimpleLogWriter {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("SimpleLogWriter")
      .field("name", &self.lifecycle.name())
      .field("state", &self.lifecycle.state())
      .field("writers", &self.writers.read().len())
      .finish()
  }
}

impl SimpleLogWriter {
  pub fn new(name: impl Into<String>, setup_log: SetupLog) -> Self {
    Self {
      lifecycle: Lifecycle::new(name, setup_log),
      writers: RwLock::new(EntryWriterMap::new()),
      synchronized: false,
    }
  }

  /// Declares that all registered entry writers tolerate concurrent writes.
  pub fn synchronized(mut self) -> Self {
    self.synchronized = true;
    self
  }

  /// Registers a typed entry writer. Fails while the writer is running or
  /// when the entry type is already claimed.
  pub fn add_entry_writer<T, W>(&self, writer: Arc<W>) -> Result<()>
  where
    T: LogEntry,
    W: EntryWriter<T> + 'static,
  {
    match self.lifecycle.state() {
      StartableState::Unstarted | StartableState::Stopped => {}
      state if state.is_disposed() => {
        return Err(Error::ObjectDisposed {
          component: self.lifecycle.name().to_string(),
        });
      }
      _ => {
        return Err(Error::AlreadyStarted {
          component: self.lifecycle.name().to_string(),
        });
      }
    }
    self
      .writers
      .write()
      .insert(erase_entry_writer::<T, W>(writer))
  }
}

impl Startable for SimpleLogWriter {
  fn state(&self) -> StartableState {
    self.lifecycle.state()
  }

  fn start(&self) -> Result<()> {
    self.lifecycle.run_start(|_| Ok(()))
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

impl LogWriter for SimpleLogWriter {
  fn name(&self) -> &str {
    self.lifecycle.name()
  }

  fn is_synchronized(&self) -> bool {
    self.synchronized
  }

  fn entry_writers(&self) -> Vec<(TypeId, Arc<dyn AnyEntryWriter>)> {
    self.writers.read().iter().collect()
  }

  fn find_entry_writer(&self, entry_type: TypeId) -> Option<Arc<dyn AnyEntryWriter>> {
    self.writers.read().get(entry_type)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::{LogLevel, TraceEntry};
  use crate::writer::LogWriterExt;
  use parking_lot::Mutex;

  #[derive(Default)]
  struct Collecting {
    entries: Mutex<Vec<TraceEntry>>,
  }

  impl EntryWriter<TraceEntry> for Collecting {
    fn write(&self, entry: &TraceEntry) {
      self.entries.lock().push(entry.clone());
    }
  }

  #[test]
  fn typed_lookup_finds_registered_writer() {
    let writer = SimpleLogWriter::new("w", SetupLog::new());
    let sink = Arc::new(Collecting::default());
    writer
      .add_entry_writer::<TraceEntry, _>(sink.clone())
      .unwrap();

    let typed = writer.entry_writer::<TraceEntry>().unwrap();
    typed.write(&TraceEntry::new("t", LogLevel::Info, "hello"));
    assert_eq!(sink.entries.lock().len(), 1);

    assert!(writer.entry_writer::<String>().is_none());
  }

  #[test]
  fn registration_is_rejected_while_started() {
    let writer = SimpleLogWriter::new("w", SetupLog::new());
    writer.start().unwrap();
    let result = writer.add_entry_writer::<TraceEntry, _>(Arc::new(Collecting::default()));
    assert!(matches!(result, Err(Error::AlreadyStarted { .. })));

    writer.stop().unwrap();
    writer
      .add_entry_writer::<TraceEntry, _>(Arc::new(Collecting::default()))
      .unwrap();
  }
}
