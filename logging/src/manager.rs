// src/manager.rs
// The top-level orchestrator owning configuration and started writers.

use crate::config::LogManagerConfig;
use crate::error::{Error, Result};
use crate::model::{LogEntry, LogLevel};
use crate::setup::SetupLog;
use crate::startable::{Lifecycle, Startable, StartableState, StateListener};
use crate::writer::{AnyEntryWriter, FanOutEntryWriter, LogWriter, TypedEntryWriter};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::any::TypeId;
use std::fmt;
use std::sync::{Arc, Weak};

/// Owns the configuration, constructs log writers lazily through the
/// initializer chain, and tracks started writers for orderly shutdown.
pub struct LogManager {
  lifecycle: Lifecycle,
  config: Mutex<LogManagerConfig>,
  // Constructed writers in startup order; stopped and disposed in reverse.
  constructed: Mutex<Vec<(String, Arc<dyn LogWriter>)>>,
}

impl fmt::Debug for LogManager {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("LogManager")
      .field("state", &self.lifecycle.state())
      .field("constructed", &self.constructed.lock().len())
      .finish()
  }
}

impl Default for LogManager {
  fn default() -> Self {
    Self::new()
  }
}

impl LogManager {
  pub fn new() -> Self {
    Self::with_config(LogManagerConfig::default())
  }

  pub fn with_config(config: LogManagerConfig) -> Self {
    Self {
      lifecycle: Lifecycle::new("log-manager", SetupLog::new()),
      config: Mutex::new(config),
      constructed: Mutex::new(Vec::new()),
    }
  }

  pub fn setup_log(&self) -> &SetupLog {
    self.lifecycle.setup_log()
  }

  /// Mutates the configuration. Fails while the manager is started; the
  /// configuration is frozen between start and stop.
  pub fn configure<F>(&self, mutate: F) -> Result<()>
  where
    F: FnOnce(&mut LogManagerConfig) -> Result<()>,
  {
    match self.lifecycle.state() {
      StartableState::Unstarted | StartableState::Stopped => {}
      state if state.is_disposed() => {
        return Err(Error::ObjectDisposed {
          component: "log-manager".to_string(),
        });
      }
      _ => {
        return Err(Error::AlreadyStarted {
          component: "log-manager".to_string(),
        });
      }
    }
    mutate(&mut self.config.lock())
  }

  /// Registers a component disposed on every manager stop. Held weakly so
  /// registration does not extend its lifetime.
  pub fn register_stop_disposable(&self, item: Weak<dyn Startable>) {
    self.lifecycle.register_stop_disposable(item);
  }

  /// Registers a component disposed together with the manager itself.
  pub fn register_linked_disposable(&self, item: Weak<dyn Startable>) {
    self.lifecycle.register_linked_disposable(item);
  }

  /// Attempts to start the manager exactly once, recording failures to the
  /// setup log instead of returning them.
  pub fn ensure_started(&self) {
    self.lifecycle.ensure_started(|_| self.start_constructed());
  }

  /// Looks up or lazily constructs the writer registered under `name`,
  /// starting the manager first if necessary.
  pub fn get_log_writer(&self, name: &str) -> Result<Arc<dyn LogWriter>> {
    if self.lifecycle.state() != StartableState::Started {
      self.start()?;
    }

    if let Some((_, writer)) = self
      .constructed
      .lock()
      .iter()
      .find(|(existing, _)| existing == name)
    {
      return Ok(writer.clone());
    }

    let config = self
      .config
      .lock()
      .writer(name)
      .ok_or_else(|| Error::KeyNotFound {
        name: name.to_string(),
      })?;

    let setup_log = self.setup_log().clone();
    let mut writer = config.create_writer(&setup_log)?;
    let initializers: Vec<_> = self.config.lock().initializers().to_vec();
    for initializer in initializers {
      writer = initializer.wrap(config.as_ref(), writer, &setup_log);
    }

    writer.start()?;
    let startable: Arc<dyn Startable> = writer.clone();
    let weak: Weak<dyn Startable> = Arc::downgrade(&startable);
    self.lifecycle.register_stop_disposable(weak);
    self
      .constructed
      .lock()
      .push((name.to_string(), writer.clone()));
    Ok(writer)
  }

  /// The (possibly composite) entry writer for `T` across all constructed
  /// log writers that expose it.
  pub fn entry_writer<T: LogEntry>(&self) -> Option<TypedEntryWriter<T>> {
    let entry_type = TypeId::of::<T>();
    let mut found: Vec<Arc<dyn AnyEntryWriter>> = self
      .constructed
      .lock()
      .iter()
      .filter_map(|(_, writer)| writer.find_entry_writer(entry_type))
      .collect();

    match found.len() {
      0 => None,
      1 => TypedEntryWriter::new(found.remove(0)),
      _ => {
        let fan_out = Arc::new(FanOutEntryWriter::new(
          entry_type,
          std::any::type_name::<T>(),
          found,
          self.setup_log().clone(),
        ));
        TypedEntryWriter::new(fan_out)
      }
    }
  }

  /// Healthy means the setup log holds nothing above `Info`.
  pub fn is_healthy(&self) -> bool {
    self.setup_log().is_healthy()
  }

  /// Restores the default configuration and clears the setup log. Only
  /// valid while the manager is not running.
  pub fn reset(&self) -> Result<()> {
    match self.lifecycle.state() {
      StartableState::Unstarted | StartableState::Stopped => {}
      state if state.is_disposed() => {
        return Err(Error::ObjectDisposed {
          component: "log-manager".to_string(),
        });
      }
      _ => {
        return Err(Error::AlreadyStarted {
          component: "log-manager".to_string(),
        });
      }
    }
    self.config.lock().reset();
    self.constructed.lock().clear();
    self.setup_log().clear();
    Ok(())
  }

  fn start_constructed(&self) -> Result<()> {
    let writers: Vec<_> = self.constructed.lock().clone();
    for (name, writer) in writers {
      writer.start().map_err(|error| Error::StartFailed {
        component: name,
        reason: error.to_string(),
      })?;
    }
    Ok(())
  }

  /// Stops and disposes all writers in reverse startup order, continuing
  /// past individual failures and recording each.
  fn shutdown_writers(&self) {
    let writers: Vec<_> = {
      let mut constructed = self.constructed.lock();
      constructed.drain(..).collect()
    };
    for (name, writer) in writers.into_iter().rev() {
      if let Err(error) = writer.stop() {
        self.setup_log().report_error(
          &name,
          LogLevel::Error,
          "log writer failed to stop",
          &error,
        );
      }
      if let Err(error) = writer.dispose() {
        self.setup_log().report_error(
          &name,
          LogLevel::Warn,
          "log writer failed to dispose",
          &error,
        );
      }
    }
  }
}

impl Startable for LogManager {
  fn state(&self) -> StartableState {
    self.lifecycle.state()
  }

  fn start(&self) -> Result<()> {
    self.lifecycle.run_start(|_| self.start_constructed())
  }

  fn stop(&self) -> Result<()> {
    self.lifecycle.run_stop(|| {
      self.shutdown_writers();
      Ok(())
    })
  }

  fn dispose(&self) -> Result<()> {
    self.lifecycle.run_dispose(|| self.shutdown_writers())
  }

  fn on_state_change(&self, listener: StateListener) {
    self.lifecycle.add_listener(listener);
  }
}

static GLOBAL: Lazy<Arc<LogManager>> = Lazy::new(|| Arc::new(LogManager::new()));

/// The process-wide default manager, created on first use.
pub fn global() -> &'static Arc<LogManager> {
  &GLOBAL
}
