// src/setup.rs
// The logging system's own diagnostic channel.

use crate::model::{LogLevel, TraceEntry};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// A trace entry tagged with the component that reported it.
#[derive(Debug, Clone)]
pub struct SetupLogEntry {
  pub source: String,
  pub entry: TraceEntry,
}

/// Append-only, synchronized record of the logging system's own events:
/// configuration decisions, start/stop of each component, faults in
/// background actions and finalizer-path warnings.
///
/// Deliberately not routed through the background pipeline, so that the
/// channel stays usable during pipeline shutdown.
#[derive(Clone, Default)]
pub struct SetupLog {
  entries: Arc<Mutex<Vec<SetupLogEntry>>>,
}

impl fmt::Debug for SetupLog {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("SetupLog")
      .field("entries", &self.entries.lock().len())
      .finish()
  }
}

impl SetupLog {
  pub fn new() -> Self {
    Self::default()
  }

  /// Appends a diagnostic entry.
  pub fn report(&self, source: &str, level: LogLevel, message: impl Into<String>) {
    let entry = TraceEntry::new(source, level, message);
    self.entries.lock().push(SetupLogEntry {
      source: source.to_string(),
      entry,
    });
  }

  /// Appends a diagnostic entry carrying an error chain.
  pub fn report_error(
    &self,
    source: &str,
    level: LogLevel,
    message: impl Into<String>,
    error: &(dyn std::error::Error + 'static),
  ) {
    let entry = TraceEntry::new(source, level, message).with_error(error);
    self.entries.lock().push(SetupLogEntry {
      source: source.to_string(),
      entry,
    });
  }

  /// Appends a diagnostic entry with a pre-rendered failure description,
  /// for faults that do not surface as `std::error::Error` (panics).
  pub fn report_fault(
    &self,
    source: &str,
    message: impl Into<String>,
    description: impl Into<String>,
  ) {
    let mut entry = TraceEntry::new(source, LogLevel::Error, message);
    entry.error = Some(description.into());
    self.entries.lock().push(SetupLogEntry {
      source: source.to_string(),
      entry,
    });
  }

  /// A snapshot of all entries recorded so far.
  pub fn entries(&self) -> Vec<SetupLogEntry> {
    self.entries.lock().clone()
  }

  pub fn len(&self) -> usize {
    self.entries.lock().len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.lock().is_empty()
  }

  /// The most severe level recorded, if any.
  pub fn max_level(&self) -> Option<LogLevel> {
    self.entries.lock().iter().map(|e| e.entry.level).max()
  }

  /// Healthy means nothing above `Info` has been recorded.
  pub fn is_healthy(&self) -> bool {
    self.max_level().map_or(true, |level| level <= LogLevel::Info)
  }

  /// Clears all recorded entries. Only an explicit reset does this.
  pub fn clear(&self) {
    self.entries.lock().clear();
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn report_appends_in_order() {
    let log = SetupLog::new();
    log.report("a", LogLevel::Info, "first");
    log.report("b", LogLevel::Debug, "second");
    let entries = log.entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].entry.message, "first");
    assert_eq!(entries[1].source, "b");
  }

  #[test]
  fn healthy_until_warn_or_worse() {
    let log = SetupLog::new();
    assert!(log.is_healthy());
    log.report("a", LogLevel::Info, "fine");
    assert!(log.is_healthy());
    log.report("a", LogLevel::Warn, "not fine");
    assert!(!log.is_healthy());
    assert_eq!(log.max_level(), Some(LogLevel::Warn));
  }

  #[test]
  fn clear_resets_health() {
    let log = SetupLog::new();
    log.report("a", LogLevel::Error, "boom");
    assert!(!log.is_healthy());
    log.clear();
    assert!(log.is_healthy());
    assert!(log.is_empty());
  }

  #[test]
  fn clones_share_the_same_record() {
    let log = SetupLog::new();
    let clone = log.clone();
    clone.report("a", LogLevel::Info, "shared");
    assert_eq!(log.len(), 1);
  }
}
