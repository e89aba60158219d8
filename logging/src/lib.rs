//! `sluice_logging` - structured logging and tracing with a background
//! write pipeline.
//!
//! The core of the library is a multi-producer, single-consumer pipeline
//! that decouples application threads from slow log sinks: writes become a
//! bounded enqueue, one worker thread per pipeline drains the queues, and
//! the lifecycle contract guarantees a flush before a normal shutdown
//! completes. On top of that sit strongly-typed entry writers, composable
//! log writers, switch-gated tracers and the managers that orchestrate them.
//!
//! ```no_run
//! use sluice_logging::{
//!   BasicWriterConfig, LogLevel, LogManager, LogWriter, SimpleLogWriter,
//!   SwitchSet, ThresholdSwitch, TraceManager, TraceWriterConfig,
//! };
//! use sluice_logging::encoders::TextTraceWriter;
//! use std::sync::Arc;
//!
//! let manager = Arc::new(LogManager::new());
//! manager
//!   .configure(|config| {
//!     config.add_writer(Arc::new(
//!       BasicWriterConfig::new("console", |setup_log| {
//!         let writer = SimpleLogWriter::new("console", setup_log.clone());
//!         writer.add_entry_writer::<sluice_logging::TraceEntry, _>(Arc::new(
//!           TextTraceWriter::new(std::io::stdout(), setup_log.clone()),
//!         ))?;
//!         Ok(Arc::new(writer) as Arc<dyn LogWriter>)
//!       })
//!       .with_background_logging(),
//!     ))
//!   })
//!   .unwrap();
//!
//! let tracing = TraceManager::new(manager.clone());
//! let mut switches = SwitchSet::new();
//! switches.insert("", Arc::new(ThresholdSwitch::new(LogLevel::Info)));
//! tracing.add_config(TraceWriterConfig::new("console", switches));
//!
//! let tracer = tracing.tracer("app.Main");
//! tracer.info(format_args!("ready"));
//! ```

pub mod background;
pub mod config;
pub mod encoders;
pub mod error;
pub mod manager;
pub mod model;
pub mod setup;
pub mod startable;
pub mod trace;
pub mod writer;

// Re-export the types most call sites touch.
pub use background::{BackgroundLogWriter, BackgroundOptions, QueueEntryWriter};
pub use config::{
  BackgroundInitializer, BasicWriterConfig, LogManagerConfig, LogWriterConfig,
  PipelineInitializer, SynchronizeInitializer,
};
pub use error::{Error, Result};
pub use manager::{global, LogManager};
pub use model::{LogEntry, LogLevel, TraceEntry};
pub use setup::{SetupLog, SetupLogEntry};
pub use startable::{Startable, StartableState, StateListener};
pub use trace::{
  FanOutTraceWriter, OnOffSwitch, SwitchSet, ThresholdSwitch, TraceManager, TraceSpan,
  TraceSwitch, TraceWriter, TraceWriterConfig, Tracer,
};
pub use writer::{
  erase_entry_writer, AnyEntryWriter, EntryWriter, EntryWriterMap, FanOutEntryWriter,
  LogWriter, LogWriterExt, SimpleLogWriter, SynchronizedLogWriter, TypedEntryWriter,
};
