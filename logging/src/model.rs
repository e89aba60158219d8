use chrono::{DateTime, Utc};
use serde::Serialize;
use std::any::Any;
use std::fmt;

/// Severity of a trace entry, ordered from chattiest to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum LogLevel {
  Verbose,
  Debug,
  Info,
  Warn,
  Error,
  Severe,
}

impl fmt::Display for LogLevel {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let text = match self {
      LogLevel::Verbose => "VERBOSE",
      LogLevel::Debug => "DEBUG",
      LogLevel::Info => "INFO",
      LogLevel::Warn => "WARN",
      LogLevel::Error => "ERROR",
      LogLevel::Severe => "SEVERE",
    };
    f.write_str(text)
  }
}

/// A typed record flowing through the logging pipeline.
///
/// Any `'static` value that is `Send + Sync + Debug + Clone` qualifies via
/// the blanket implementation; sinks declare which concrete entry type they
/// accept and dispatch happens on the entry's `TypeId`.
pub trait LogEntry: Any + Send + Sync + fmt::Debug {
  /// Clones the entry behind the trait object, preserving its concrete type.
  fn clone_entry(&self) -> Box<dyn LogEntry>;

  /// Upcast used by typed writers to recover the concrete entry.
  fn as_any(&self) -> &dyn Any;
}

impl<T> LogEntry for T
where
  T: Any + Send + Sync + fmt::Debug + Clone,
{
  fn clone_entry(&self) -> Box<dyn LogEntry> {
    Box::new(self.clone())
  }

  fn as_any(&self) -> &dyn Any {
    self
  }
}

/// The structured record produced by tracers.
///
/// Immutable once created; everything the formatting layer needs is captured
/// at the trace site.
#[derive(Debug, Clone, Serialize)]
pub struct TraceEntry {
  /// Timestamp of when the entry was created, always UTC.
  pub timestamp: DateTime<Utc>,
  /// The name of the tracer that produced the entry.
  pub tracer_name: String,
  /// The severity of the entry.
  pub level: LogLevel,
  /// The primary message.
  pub message: String,
  /// Optional free-form detail block, rendered on its own lines.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub details: Option<String>,
  /// Optional rendered error chain attached at the trace site.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
}

impl TraceEntry {
  /// Creates a new entry stamped with the current time.
  pub fn new<S1, S2>(tracer_name: S1, level: LogLevel, message: S2) -> Self
  where
    S1: Into<String>,
    S2: Into<String>,
  {
    TraceEntry {
      timestamp: Utc::now(),
      tracer_name: tracer_name.into(),
      level,
      message: message.into(),
      details: None,
      error: None,
    }
  }

  pub fn with_details(mut self, details: impl Into<String>) -> Self {
    self.details = Some(details.into());
    self
  }

  pub fn with_error(mut self, error: &(dyn std::error::Error + 'static)) -> Self {
    self.error = Some(render_error_chain(error));
    self
  }
}

/// Renders an error and its source chain on one line each.
pub(crate) fn render_error_chain(error: &(dyn std::error::Error + 'static)) -> String {
  let mut rendered = error.to_string();
  let mut source = error.source();
  while let Some(cause) = source {
    rendered.push_str("\ncaused by: ");
    rendered.push_str(&cause.to_string());
    source = cause.source();
  }
  rendered
}
