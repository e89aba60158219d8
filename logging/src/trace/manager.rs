// src/trace/manager.rs
// Tracer cache and per-target switch configuration on top of the log manager.

use crate::manager::LogManager;
use crate::model::{LogLevel, TraceEntry};
use crate::setup::SetupLog;
use crate::startable::{Lifecycle, Startable, StartableState, StateListener};
use crate::trace::switch::{SwitchSet, TraceSwitch};
use crate::trace::tracer::Tracer;
use crate::trace::writer::{TraceWriter, TracerTarget};
use crate::error::Result;
use parking_lot::Mutex;
use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

/// Pairs a switch set with the name of the log writer config whose trace
/// entry writer the switched entries are routed to.
#[derive(Debug, Clone)]
pub struct TraceWriterConfig {
  target: String,
  switches: Arc<SwitchSet>,
}

impl TraceWriterConfig {
  pub fn new(target: impl Into<String>, switches: SwitchSet) -> Self {
    Self {
      target: target.into(),
      switches: Arc::new(switches),
    }
  }

  pub fn target(&self) -> &str {
    &self.target
  }
}

/// Hands out tracers by name and keeps them wired to the configured targets.
///
/// Tracer identity is by trimmed name: the same name always yields the same
/// `Arc<Tracer>`. Reconfiguring and calling [`TraceManager::refresh`] swaps
/// the writer behind every cached tracer atomically; call sites keep their
/// tracer instances.
pub struct TraceManager {
  lifecycle: Lifecycle,
  log_manager: Arc<LogManager>,
  configs: Mutex<Vec<TraceWriterConfig>>,
  tracers: Mutex<HashMap<String, Arc<Tracer>>>,
}

impl fmt::Debug for TraceManager {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("TraceManager")
      .field("configs", &self.configs.lock().len())
      .field("tracers", &self.tracers.lock().len())
      .finish()
  }
}

impl TraceManager {
  /// Creates a trace manager sharing `log_manager`'s setup log, linked so
  /// that disposing the log manager disposes this one too.
  pub fn new(log_manager: Arc<LogManager>) -> Arc<Self> {
    let manager = Arc::new(Self {
      lifecycle: Lifecycle::new("trace-manager", log_manager.setup_log().clone()),
      log_manager,
      configs: Mutex::new(Vec::new()),
      tracers: Mutex::new(HashMap::new()),
    });
    let startable: Arc<dyn Startable> = manager.clone();
    let weak: Weak<dyn Startable> = Arc::downgrade(&startable);
    manager.log_manager.register_linked_disposable(weak);
    manager
  }

  pub fn setup_log(&self) -> &SetupLog {
    self.lifecycle.setup_log()
  }

  /// Adds a routing target. Takes effect for new tracers immediately and
  /// for existing ones on the next [`TraceManager::refresh`].
  pub fn add_config(&self, config: TraceWriterConfig) {
    self.configs.lock().push(config);
  }

  /// The tracer for `name` (trimmed), creating and wiring it on first use.
  pub fn tracer(&self, name: &str) -> Arc<Tracer> {
    let trimmed = name.trim();
    if let Some(tracer) = self.tracers.lock().get(trimmed) {
      return tracer.clone();
    }

    let target = self.build_target();
    let tracer = Arc::new(Tracer::new(trimmed, target));
    self
      .tracers
      .lock()
      .entry(trimmed.to_string())
      .or_insert(tracer)
      .clone()
  }

  /// Rewires every cached tracer against the current configuration. Each
  /// rewire is one atomic writer swap; concurrent trace calls observe the
  /// old or the new routing, never a mix.
  pub fn refresh(&self) {
    let tracers: Vec<Arc<Tracer>> = self.tracers.lock().values().cloned().collect();
    for tracer in tracers {
      tracer.replace_target(self.build_target());
    }
  }

  fn build_target(&self) -> TracerTarget {
    if self.lifecycle.state().is_disposed() {
      return TracerTarget::None;
    }
    self.lifecycle.ensure_started(|_| Ok(()));

    let configs: Vec<TraceWriterConfig> = self.configs.lock().clone();
    let mut writers = Vec::new();
    for config in configs {
      let writer = match self.log_manager.get_log_writer(&config.target) {
        Ok(writer) => writer,
        Err(error) => {
          self.setup_log().report_error(
            "trace-manager",
            LogLevel::Warn,
            format!("cannot route tracing to '{}'", config.target),
            &error,
          );
          continue;
        }
      };
      let Some(entry_writer) = writer.find_entry_writer(TypeId::of::<TraceEntry>()) else {
        self.setup_log().report(
          "trace-manager",
          LogLevel::Warn,
          format!(
            "log writer '{}' exposes no trace entry writer",
            config.target
          ),
        );
        continue;
      };
      let switch: Arc<dyn TraceSwitch> = config.switches.clone();
      writers.push(TraceWriter::new(
        switch,
        entry_writer,
        self.setup_log().clone(),
      ));
    }
    TracerTarget::from_writers(writers)
  }
}

impl Startable for TraceManager {
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
    self.lifecycle.run_dispose(|| {
      // Cached tracers stay valid at call sites; they just route nowhere.
      for tracer in self.tracers.lock().values() {
        tracer.replace_target(TracerTarget::None);
      }
      self.configs.lock().clear();
    })
  }

  fn on_state_change(&self, listener: StateListener) {
    self.lifecycle.add_listener(listener);
  }
}
