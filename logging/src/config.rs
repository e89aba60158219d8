// src/config.rs
// Programmatic configuration of the log manager: writer factories and the
// ordered initializer chain applied when a writer is constructed.

use crate::background::{BackgroundLogWriter, BackgroundOptions};
use crate::error::{Error, Result};
use crate::setup::SetupLog;
use crate::writer::{LogWriter, SynchronizedLogWriter};
use std::fmt;
use std::sync::Arc;

/// Describes one log writer the manager may construct.
pub trait LogWriterConfig: Send + Sync {
  /// Unique name; the key under which the writer is looked up.
  fn name(&self) -> &str;

  /// When true, the background pipeline decorator wraps this writer at
  /// construction time.
  fn background_logging(&self) -> bool {
    false
  }

  /// Builds the concrete writer. Called at most once per manager run.
  fn create_writer(&self, setup_log: &SetupLog) -> Result<Arc<dyn LogWriter>>;
}

impl fmt::Debug for dyn LogWriterConfig {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("LogWriterConfig")
      .field("name", &self.name())
      .field("background_logging", &self.background_logging())
      .finish()
  }
}

type WriterFactory = dyn Fn(&SetupLog) -> Result<Arc<dyn LogWriter>> + Send + Sync;

/// A writer config assembled from a name, flags and a factory closure.
pub struct BasicWriterConfig {
  name: String,
  background_logging: bool,
  factory: Box<WriterFactory>,
}

impl fmt::Debug for BasicWriterConfig {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("BasicWriterConfig")
      .field("name", &self.name)
      .field("background_logging", &self.background_logging)
      .finish()
  }
}

impl BasicWriterConfig {
  pub fn new<F>(name: impl Into<String>, factory: F) -> Self
  where
    F: Fn(&SetupLog) -> Result<Arc<dyn LogWriter>> + Send + Sync + 'static,
  {
    Self {
      name: name.into(),
      background_logging: false,
      factory: Box::new(factory),
    }
  }

  /// Requests the background pipeline decorator for this writer.
  pub fn with_background_logging(mut self) -> Self {
    self.background_logging = true;
    self
  }
}

impl LogWriterConfig for BasicWriterConfig {
  fn name(&self) -> &str {
    &self.name
  }

  fn background_logging(&self) -> bool {
    self.background_logging
  }

  fn create_writer(&self, setup_log: &SetupLog) -> Result<Arc<dyn LogWriter>> {
    (self.factory)(setup_log)
  }
}

/// A decorator applied while a configured writer is being constructed.
/// Initializers run in list order; each may wrap the writer or pass it
/// through untouched.
pub trait PipelineInitializer: Send + Sync {
  fn name(&self) -> &str;

  fn wrap(
    &self,
    config: &dyn LogWriterConfig,
    writer: Arc<dyn LogWriter>,
    setup_log: &SetupLog,
  ) -> Arc<dyn LogWriter>;
}

impl fmt::Debug for dyn PipelineInitializer {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "PipelineInitializer({})", self.name())
  }
}

/// Wraps writers whose config asks for background logging.
#[derive(Debug, Default)]
pub struct BackgroundInitializer {
  options: BackgroundOptions,
}

impl BackgroundInitializer {
  pub fn new(options: BackgroundOptions) -> Self {
    Self { options }
  }
}

impl PipelineInitializer for BackgroundInitializer {
  fn name(&self) -> &str {
    "background"
  }

  fn wrap(
    &self,
    config: &dyn LogWriterConfig,
    writer: Arc<dyn LogWriter>,
    setup_log: &SetupLog,
  ) -> Arc<dyn LogWriter> {
    if !config.background_logging() {
      return writer;
    }
    setup_log.report(
      config.name(),
      crate::model::LogLevel::Debug,
      "wrapping with background pipeline",
    );
    Arc::new(BackgroundLogWriter::new(
      writer,
      self.options.clone(),
      setup_log.clone(),
    ))
  }
}

/// Serializes writers that do not tolerate concurrent producers.
///
/// Runs after the background initializer, whose pipeline already serializes
/// through its single worker and reports `is_synchronized`; the redundant
/// serializer is therefore suppressed by this capability check.
#[derive(Debug, Default)]
pub struct SynchronizeInitializer;

impl PipelineInitializer for SynchronizeInitializer {
  fn name(&self) -> &str {
    "synchronize"
  }

  fn wrap(
    &self,
    config: &dyn LogWriterConfig,
    writer: Arc<dyn LogWriter>,
    setup_log: &SetupLog,
  ) -> Arc<dyn LogWriter> {
    if writer.is_synchronized() {
      return writer;
    }
    setup_log.report(
      config.name(),
      crate::model::LogLevel::Debug,
      "wrapping with serializer",
    );
    Arc::new(SynchronizedLogWriter::new(writer))
  }
}

/// The full configuration a `LogManager` owns: registered writer configs and
/// the initializer chain. Mutated freely before start, frozen while started.
pub struct LogManagerConfig {
  writers: Vec<Arc<dyn LogWriterConfig>>,
  initializers: Vec<Arc<dyn PipelineInitializer>>,
}

impl fmt::Debug for LogManagerConfig {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("LogManagerConfig")
      .field(
        "writers",
        &self.writers.iter().map(|w| w.name()).collect::<Vec<_>>(),
      )
      .field(
        "initializers",
        &self.initializers.iter().map(|i| i.name()).collect::<Vec<_>>(),
      )
      .finish()
  }
}

fn default_initializers() -> Vec<Arc<dyn PipelineInitializer>> {
  vec![
    Arc::new(BackgroundInitializer::default()),
    Arc::new(SynchronizeInitializer),
  ]
}

impl Default for LogManagerConfig {
  fn default() -> Self {
    Self {
      writers: Vec::new(),
      initializers: default_initializers(),
    }
  }
}

impl LogManagerConfig {
  pub fn new() -> Self {
    Self::default()
  }

  /// Registers a writer config. Names must be unique.
  pub fn add_writer(&mut self, config: Arc<dyn LogWriterConfig>) -> Result<()> {
    if self.writers.iter().any(|w| w.name() == config.name()) {
      return Err(Error::Config(format!(
        "a log writer named '{}' is already registered",
        config.name()
      )));
    }
    self.writers.push(config);
    Ok(())
  }

  pub fn writer(&self, name: &str) -> Option<Arc<dyn LogWriterConfig>> {
    self.writers.iter().find(|w| w.name() == name).cloned()
  }

  pub fn writers(&self) -> &[Arc<dyn LogWriterConfig>] {
    &self.writers
  }

  /// Appends an initializer to the chain.
  pub fn add_initializer(&mut self, initializer: Arc<dyn PipelineInitializer>) {
    self.initializers.push(initializer);
  }

  pub fn initializers(&self) -> &[Arc<dyn PipelineInitializer>] {
    &self.initializers
  }

  /// Restores the default initializer list and empties the writer set.
  pub fn reset(&mut self) {
    self.writers.clear();
    self.initializers = default_initializers();
  }
}
