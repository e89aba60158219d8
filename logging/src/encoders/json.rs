// src/encoders/json.rs

use crate::model::{LogLevel, TraceEntry};
use crate::setup::SetupLog;
use crate::writer::EntryWriter;
use parking_lot::Mutex;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Serializes a trace entry as one JSON line.
pub fn to_json_line(entry: &TraceEntry) -> serde_json::Result<Vec<u8>> {
  let mut bytes = serde_json::to_vec(entry)?;
  bytes.push(b'\n');
  Ok(bytes)
}

/// A trace entry writer emitting JSON lines to any `io::Write`.
pub struct JsonTraceWriter<W: Write + Send> {
  writer: Mutex<W>,
  fault_count: AtomicUsize,
  setup_log: SetupLog,
}

impl<W: Write + Send> std::fmt::Debug for JsonTraceWriter<W> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("JsonTraceWriter").finish_non_exhaustive()
  }
}

impl<W: Write + Send> JsonTraceWriter<W> {
  pub fn new(writer: W, setup_log: SetupLog) -> Self {
    Self {
      writer: Mutex::new(writer),
      fault_count: AtomicUsize::new(0),
      setup_log,
    }
  }

  fn report_fault(&self, error: &(dyn std::error::Error + 'static)) {
    let previous = self.fault_count.fetch_add(1, Ordering::AcqRel);
    if previous == 0 {
      self.setup_log.report_error(
        "json-writer",
        LogLevel::Error,
        "failed to emit trace entry; further failures are suppressed",
        error,
      );
    }
  }
}

impl<W: Write + Send> EntryWriter<TraceEntry> for JsonTraceWriter<W> {
  fn write(&self, entry: &TraceEntry) {
    let bytes = match to_json_line(entry) {
      Ok(bytes) => bytes,
      Err(error) => {
        self.report_fault(&error);
        return;
      }
    };
    let mut writer = self.writer.lock();
    if let Err(error) = writer.write_all(&bytes).and_then(|()| writer.flush()) {
      self.report_fault(&error);
    }
  }

  fn is_synchronized(&self) -> bool {
    true
  }
}
