// src/writer/fanout.rs

use crate::setup::SetupLog;
use crate::writer::AnyEntryWriter;
use std::any::TypeId;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::model::LogEntry;

/// An entry writer fanning one entry out to several constituents that all
/// accept the same entry type.
///
/// Constituents are invoked in insertion order. A fault in one constituent
/// is isolated and does not prevent writes to the others; the first fault
/// per constituent slot is reported to the setup log, later ones only
/// counted.
pub struct FanOutEntryWriter {
  entry_type: TypeId,
  entry_type_name: &'static str,
  writers: Vec<Arc<dyn AnyEntryWriter>>,
  fault_counts: Vec<AtomicUsize>,
  setup_log: SetupLog,
}

impl FanOutEntryWriter {
  /// Builds a fan-out over `writers`, which must all declare the same entry
  /// type; mismatching writers never receive entries.
  pub fn new(
    entry_type: TypeId,
    entry_type_name: &'static str,
    writers: Vec<Arc<dyn AnyEntryWriter>>,
    setup_log: SetupLog,
  ) -> Self {
    let fault_counts = writers.iter().map(|_| AtomicUsize::new(0)).collect();
    Self {
      entry_type,
      entry_type_name,
      writers,
      fault_counts,
      setup_log,
    }
  }

  pub fn writers(&self) -> &[Arc<dyn AnyEntryWriter>] {
    &self.writers
  }
}

impl AnyEntryWriter for FanOutEntryWriter {
  fn entry_type(&self) -> TypeId {
    self.entry_type
  }

  fn entry_type_name(&self) -> &'static str {
    self.entry_type_name
  }

  fn is_enabled(&self) -> bool {
    self.writers.iter().any(|w| w.is_enabled())
  }

  fn is_synchronized(&self) -> bool {
    self.writers.iter().all(|w| w.is_synchronized())
  }

  fn write_any(&self, entry: &dyn LogEntry) {
    for (index, writer) in self.writers.iter().enumerate() {
      if !writer.is_enabled() {
        continue;
      }
      let outcome = panic::catch_unwind(AssertUnwindSafe(|| writer.write_any(entry)));
      if let Err(payload) = outcome {
        let previous = self.fault_counts[index].fetch_add(1, Ordering::AcqRel);
        if previous == 0 {
          self.setup_log.report_fault(
            self.entry_type_name,
            format!("fan-out constituent #{index} failed"),
            crate::background::describe_panic(&payload),
          );
        }
      }
    }
  }

  fn as_any(&self) -> &dyn std::any::Any {
    self
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::{LogLevel, TraceEntry};
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

  fn entry() -> TraceEntry {
    TraceEntry::new("t", LogLevel::Info, "m")
  }

  #[test]
  fn all_constituents_receive_the_entry_in_order() {
    let first = Arc::new(Collecting::default());
    let second = Arc::new(Collecting::default());
    let fan_out = FanOutEntryWriter::new(
      TypeId::of::<TraceEntry>(),
      "TraceEntry",
      vec![
        erase_entry_writer::<TraceEntry, _>(first.clone()),
        erase_entry_writer::<TraceEntry, _>(second.clone()),
      ],
      SetupLog::new(),
    );

    fan_out.write_any(&entry());
    assert_eq!(first.entries.lock().len(), 1);
    assert_eq!(second.entries.lock().len(), 1);
  }

  #[test]
  fn fault_in_one_constituent_is_isolated() {
    let log = SetupLog::new();
    let survivor = Arc::new(Collecting::default());
    let fan_out = FanOutEntryWriter::new(
      TypeId::of::<TraceEntry>(),
      "TraceEntry",
      vec![
        erase_entry_writer::<TraceEntry, _>(Arc::new(Panicking)),
        erase_entry_writer::<TraceEntry, _>(survivor.clone()),
      ],
      log.clone(),
    );

    fan_out.write_any(&entry());
    fan_out.write_any(&entry());

    assert_eq!(survivor.entries.lock().len(), 2);
    // First fault reported, the repeat suppressed.
    let errors: Vec<_> = log
      .entries()
      .into_iter()
      .filter(|e| e.entry.level == LogLevel::Error)
      .collect();
    assert_eq!(errors.len(), 1);
  }
}
