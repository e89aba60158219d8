// src/trace/writer.rs
// Switched trace writers and their fan-out composition.

use crate::background::describe_panic;
use crate::model::TraceEntry;
use crate::setup::SetupLog;
use crate::trace::switch::TraceSwitch;
use crate::writer::AnyEntryWriter;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// An entry writer for trace entries gated by a switch.
///
/// The switch is evaluated on every write; a disabled write costs only the
/// predicate. Faults in the underlying writer are isolated: counted, with
/// the first occurrence reported to the setup log.
pub struct TraceWriter {
  switch: Arc<dyn TraceSwitch>,
  inner: Arc<dyn AnyEntryWriter>,
  fault_count: AtomicUsize,
  setup_log: SetupLog,
}

impl fmt::Debug for TraceWriter {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("TraceWriter")
      .field("inner", &self.inner.entry_type_name())
      .field("fault_count", &self.fault_count.load(Ordering::Relaxed))
      .finish()
  }
}

impl TraceWriter {
  pub fn new(
    switch: Arc<dyn TraceSwitch>,
    inner: Arc<dyn AnyEntryWriter>,
    setup_log: SetupLog,
  ) -> Self {
    Self {
      switch,
      inner,
      fault_count: AtomicUsize::new(0),
      setup_log,
    }
  }

  pub fn is_enabled(&self, tracer_name: &str, level: crate::model::LogLevel) -> bool {
    self.switch.is_enabled(tracer_name, level) && self.inner.is_enabled()
  }

  pub fn write(&self, entry: &TraceEntry) {
    if !self.switch.is_enabled(&entry.tracer_name, entry.level) {
      return;
    }
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.inner.write_any(entry)));
    if let Err(payload) = outcome {
      let previous = self.fault_count.fetch_add(1, Ordering::AcqRel);
      if previous == 0 {
        self.setup_log.report_fault(
          &entry.tracer_name,
          "trace writer failed; further failures are suppressed",
          describe_panic(&payload),
        );
      }
    }
  }

  pub fn fault_count(&self) -> usize {
    self.fault_count.load(Ordering::Acquire)
  }
}

/// Fans a trace entry out to several switched writers.
///
/// Every constituent evaluates its own switch, so different sinks may accept
/// or reject the same entry by different criteria.
pub struct FanOutTraceWriter {
  writers: Vec<TraceWriter>,
}

impl fmt::Debug for FanOutTraceWriter {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("FanOutTraceWriter")
      .field("writers", &self.writers.len())
      .finish()
  }
}

impl FanOutTraceWriter {
  pub fn new(writers: Vec<TraceWriter>) -> Self {
    Self { writers }
  }

  pub fn is_enabled(&self, tracer_name: &str, level: crate::model::LogLevel) -> bool {
    self
      .writers
      .iter()
      .any(|writer| writer.is_enabled(tracer_name, level))
  }

  pub fn write(&self, entry: &TraceEntry) {
    for writer in &self.writers {
      writer.write(entry);
    }
  }
}

/// Where a tracer routes its entries: nowhere, to one switched writer, or
/// fanned out across several. Swapped atomically on reconfiguration.
pub enum TracerTarget {
  None,
  Single(TraceWriter),
  FanOut(FanOutTraceWriter),
}

impl fmt::Debug for TracerTarget {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      TracerTarget::None => f.write_str("TracerTarget::None"),
      TracerTarget::Single(_) => f.write_str("TracerTarget::Single"),
      TracerTarget::FanOut(w) => write!(f, "TracerTarget::FanOut({})", w.writers.len()),
    }
  }
}

impl TracerTarget {
  /// Builds the canonical target shape for a set of switched writers.
  pub fn from_writers(mut writers: Vec<TraceWriter>) -> Self {
    match writers.len() {
      0 => TracerTarget::None,
      1 => TracerTarget::Single(writers.remove(0)),
      _ => TracerTarget::FanOut(FanOutTraceWriter::new(writers)),
    }
  }

  pub fn is_enabled(&self, tracer_name: &str, level: crate::model::LogLevel) -> bool {
    match self {
      TracerTarget::None => false,
      TracerTarget::Single(writer) => writer.is_enabled(tracer_name, level),
      TracerTarget::FanOut(writer) => writer.is_enabled(tracer_name, level),
    }
  }

  pub fn write(&self, entry: &TraceEntry) {
    match self {
      TracerTarget::None => {}
      TracerTarget::Single(writer) => writer.write(entry),
      TracerTarget::FanOut(writer) => writer.write(entry),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::LogLevel;
  use crate::trace::switch::{OnOffSwitch, ThresholdSwitch};
  use crate::writer::{erase_entry_writer, EntryWriter};
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

  struct Panicking;

  impl EntryWriter<TraceEntry> for Panicking {
    fn write(&self, _entry: &TraceEntry) {
      panic!("sink exploded");
    }
  }

  fn entry(level: LogLevel) -> TraceEntry {
    TraceEntry::new("a.b.C", level, "m")
  }

  #[test]
  fn switch_gates_the_write() {
    let sink = Arc::new(Collecting::default());
    let writer = TraceWriter::new(
      Arc::new(ThresholdSwitch::new(LogLevel::Warn)),
      erase_entry_writer::<TraceEntry, _>(sink.clone()),
      SetupLog::new(),
    );

    writer.write(&entry(LogLevel::Info));
    writer.write(&entry(LogLevel::Warn));
    writer.write(&entry(LogLevel::Error));
    assert_eq!(sink.entries.lock().len(), 2);
  }

  #[test]
  fn faults_are_counted_and_reported_once() {
    let log = SetupLog::new();
    let writer = TraceWriter::new(
      Arc::new(OnOffSwitch::new(true)),
      erase_entry_writer::<TraceEntry, _>(Arc::new(Panicking)),
      log.clone(),
    );

    writer.write(&entry(LogLevel::Info));
    writer.write(&entry(LogLevel::Info));
    assert_eq!(writer.fault_count(), 2);
    assert_eq!(log.len(), 1, "only the first fault is reported");
  }

  #[test]
  fn fan_out_applies_each_switch_independently() {
    let accepts_all = Arc::new(Collecting::default());
    let errors_only = Arc::new(Collecting::default());
    let fan_out = FanOutTraceWriter::new(vec![
      TraceWriter::new(
        Arc::new(OnOffSwitch::new(true)),
        erase_entry_writer::<TraceEntry, _>(accepts_all.clone()),
        SetupLog::new(),
      ),
      TraceWriter::new(
        Arc::new(ThresholdSwitch::new(LogLevel::Error)),
        erase_entry_writer::<TraceEntry, _>(errors_only.clone()),
        SetupLog::new(),
      ),
    ]);

    fan_out.write(&entry(LogLevel::Info));
    fan_out.write(&entry(LogLevel::Error));
    assert_eq!(accepts_all.entries.lock().len(), 2);
    assert_eq!(errors_only.entries.lock().len(), 1);
  }

  #[test]
  fn target_shape_follows_writer_count() {
    assert!(matches!(
      TracerTarget::from_writers(Vec::new()),
      TracerTarget::None
    ));
  }
}
