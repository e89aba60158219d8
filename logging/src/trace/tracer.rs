// src/trace/tracer.rs
// The user-facing trace API.

use crate::model::{LogLevel, TraceEntry};
use crate::trace::writer::TracerTarget;
use arc_swap::ArcSwap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// A named trace source bound to a switched writer.
///
/// Tracers are cheap to call when disabled: one target load and one
/// predicate. The message is only materialized once the switch has said
/// yes. Reconfiguration replaces the target with a single atomic swap;
/// readers on the hot path never take a lock.
pub struct Tracer {
  name: String,
  target: ArcSwap<TracerTarget>,
}

impl fmt::Debug for Tracer {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Tracer")
      .field("name", &self.name)
      .field("target", &**self.target.load())
      .finish()
  }
}

impl Tracer {
  pub(crate) fn new(name: impl Into<String>, target: TracerTarget) -> Self {
    Self {
      name: name.into(),
      target: ArcSwap::from_pointee(target),
    }
  }

  /// Creates a tracer that routes nowhere; useful as a placeholder before
  /// configuration and in tests.
  pub fn disconnected(name: impl Into<String>) -> Self {
    Self::new(name, TracerTarget::None)
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  /// Atomically replaces the downstream writer. Existing callers observe
  /// either the old or the new target, never a mix.
  pub(crate) fn replace_target(&self, target: TracerTarget) {
    self.target.store(Arc::new(target));
  }

  /// Whether an entry at `level` would currently be admitted.
  pub fn is_enabled(&self, level: LogLevel) -> bool {
    self.target.load().is_enabled(&self.name, level)
  }

  /// Traces a message. `args` is only rendered when the switch admits the
  /// entry, so a disabled call site stays cheap.
  pub fn write(&self, level: LogLevel, args: fmt::Arguments<'_>) {
    let target = self.target.load();
    if !target.is_enabled(&self.name, level) {
      return;
    }
    let entry = TraceEntry::new(self.name.clone(), level, args.to_string());
    target.write(&entry);
  }

  /// Traces a message with a free-form detail block.
  pub fn write_with_details(
    &self,
    level: LogLevel,
    args: fmt::Arguments<'_>,
    details: impl Into<String>,
  ) {
    let target = self.target.load();
    if !target.is_enabled(&self.name, level) {
      return;
    }
    let entry =
      TraceEntry::new(self.name.clone(), level, args.to_string()).with_details(details);
    target.write(&entry);
  }

  /// Traces a message with an attached error chain. The trace call itself
  /// never fails.
  pub fn write_error(
    &self,
    level: LogLevel,
    error: &(dyn std::error::Error + 'static),
    args: fmt::Arguments<'_>,
  ) {
    let target = self.target.load();
    if !target.is_enabled(&self.name, level) {
      return;
    }
    let entry = TraceEntry::new(self.name.clone(), level, args.to_string()).with_error(error);
    target.write(&entry);
  }

  pub fn verbose(&self, args: fmt::Arguments<'_>) {
    self.write(LogLevel::Verbose, args);
  }

  pub fn debug(&self, args: fmt::Arguments<'_>) {
    self.write(LogLevel::Debug, args);
  }

  pub fn info(&self, args: fmt::Arguments<'_>) {
    self.write(LogLevel::Info, args);
  }

  pub fn warn(&self, args: fmt::Arguments<'_>) {
    self.write(LogLevel::Warn, args);
  }

  pub fn error(&self, args: fmt::Arguments<'_>) {
    self.write(LogLevel::Error, args);
  }

  pub fn severe(&self, args: fmt::Arguments<'_>) {
    self.write(LogLevel::Severe, args);
  }

  /// Opens a scoped span: `>label` is traced now, `<label elapsed` when the
  /// returned guard drops. The guard pins the routing in effect at open
  /// time, so a reconfiguration mid-span does not split the pair.
  pub fn span(&self, label: impl Into<String>) -> TraceSpan {
    let label = label.into();
    self.info(format_args!(">{label}"));
    TraceSpan {
      target: self.target.load_full(),
      tracer_name: self.name.clone(),
      label,
      started: Instant::now(),
    }
  }
}

/// Guard emitted by [`Tracer::span`]; traces the close marker with the
/// elapsed wall time on drop.
#[derive(Debug)]
pub struct TraceSpan {
  target: Arc<TracerTarget>,
  tracer_name: String,
  label: String,
  started: Instant,
}

impl Drop for TraceSpan {
  fn drop(&mut self) {
    if !self.target.is_enabled(&self.tracer_name, LogLevel::Info) {
      return;
    }
    let elapsed = format_elapsed(self.started.elapsed());
    let entry = TraceEntry::new(
      self.tracer_name.clone(),
      LogLevel::Info,
      format!("<{} {}", self.label, elapsed),
    );
    self.target.write(&entry);
  }
}

/// Formats a duration as `HH:MM:SS.mmm`.
fn format_elapsed(elapsed: std::time::Duration) -> String {
  let total_seconds = elapsed.as_secs();
  let hours = total_seconds / 3600;
  let minutes = (total_seconds % 3600) / 60;
  let seconds = total_seconds % 60;
  let millis = elapsed.subsec_millis();
  format!("{hours:02}:{minutes:02}:{seconds:02}.{millis:03}")
}
