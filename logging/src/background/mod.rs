// src/background/mod.rs
// The background logging pipeline: a decorator that replaces synchronous
// sink latency with a bounded enqueue and a single drain thread.

mod action;
mod proxy;
mod worker;

pub use proxy::QueueEntryWriter;

use crate::background::action::{ActionPriority, ActionScheduler};
use crate::background::worker::BackgroundWorker;
use crate::error::Result;
use crate::model::LogLevel;
use crate::setup::SetupLog;
use crate::startable::{Lifecycle, Startable, StartableState, StateListener};
use crate::writer::{AnyEntryWriter, LogWriter};
use parking_lot::Mutex;
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Renders a panic payload for the setup log.
pub(crate) fn describe_panic(payload: &(dyn Any + Send)) -> String {
  if let Some(message) = payload.downcast_ref::<&str>() {
    (*message).to_string()
  } else if let Some(message) = payload.downcast_ref::<String>() {
    message.clone()
  } else {
    "non-string panic payload".to_string()
  }
}

/// Tuning knobs of a background pipeline.
#[derive(Debug, Clone)]
pub struct BackgroundOptions {
  /// Permits per entry type; producers block once this many entries are in
  /// flight for one entry writer.
  pub queue_capacity: usize,
  /// How long a proxy `stop` waits for its drain marker before proceeding.
  /// Stopping is best-effort past this point: the worker keeps draining on
  /// its own.
  pub stop_timeout: Duration,
}

impl Default for BackgroundOptions {
  fn default() -> Self {
    Self {
      queue_capacity: 512,
      stop_timeout: Duration::from_millis(1000),
    }
  }
}

/// Decorates a log writer with per-entry-type bounded queues and one shared
/// background worker thread.
///
/// Producers pay for an enqueue instead of the sink's write latency. All
/// lifecycle work of the inner writer happens on the worker thread, so
/// `start` returns to the caller without waiting for a slow sink to warm up.
/// Dropping a pipeline that was never disposed still flushes: the drop path
/// records an error in the setup log and runs the dispose sequence
/// synchronously.
pub struct BackgroundLogWriter {
  name: String,
  lifecycle: Lifecycle,
  inner: Arc<dyn LogWriter>,
  proxies: Vec<(TypeId, Arc<QueueEntryWriter>)>,
  scheduler: ActionScheduler,
  worker: Mutex<Option<BackgroundWorker>>,
}

impl fmt::Debug for BackgroundLogWriter {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("BackgroundLogWriter")
      .field("name", &self.name)
      .field("state", &self.lifecycle.state())
      .field("proxies", &self.proxies.len())
      .finish()
  }
}

impl BackgroundLogWriter {
  pub fn new(inner: Arc<dyn LogWriter>, options: BackgroundOptions, setup_log: SetupLog) -> Self {
    let name = format!("background({})", inner.name());
    let scheduler = ActionScheduler::new();
    let proxies = inner
      .entry_writers()
      .into_iter()
      .map(|(type_id, writer)| {
        let proxy = Arc::new(QueueEntryWriter::new(
          writer,
          scheduler.clone(),
          options.queue_capacity,
          options.stop_timeout,
          setup_log.clone(),
        ));
        (type_id, proxy)
      })
      .collect();
    Self {
      lifecycle: Lifecycle::new(name.clone(), setup_log),
      name,
      inner,
      proxies,
      scheduler,
      worker: Mutex::new(None),
    }
  }

  fn setup_log(&self) -> &SetupLog {
    self.lifecycle.setup_log()
  }

  fn spin_up(&self) -> Result<()> {
    {
      let mut worker = self.worker.lock();
      if worker.is_none() {
        *worker = Some(BackgroundWorker::spawn(
          &self.name,
          self.scheduler.clone(),
          self.setup_log().clone(),
        )?);
      }
    }

    for (_, proxy) in &self.proxies {
      proxy.start()?;
    }

    // The inner writer starts on the worker thread; producers are already
    // being admitted while that happens.
    let inner = self.inner.clone();
    let setup_log = self.setup_log().clone();
    let name = self.name.clone();
    self.scheduler.post(
      ActionPriority::Normal,
      Box::new(move || {
        if let Err(error) = inner.start() {
          setup_log.report_error(&name, LogLevel::Error, "inner writer failed to start", &error);
        }
      }),
    );

    // Low-priority housekeeping: confirms the worker reached the tail of
    // the startup actions.
    let setup_log = self.setup_log().clone();
    let name = self.name.clone();
    self.scheduler.post(
      ActionPriority::Delay,
      Box::new(move || {
        setup_log.report(&name, LogLevel::Debug, "background worker warmed up");
      }),
    );
    Ok(())
  }

  /// Posts a queue-jumping marker and waits for the worker to observe it,
  /// bounded by `timeout`. Returns whether the marker was reached.
  ///
  /// Because the marker travels on the high-priority lane it runs at the
  /// next action boundary, ahead of queued writes; a `true` result means
  /// the worker is alive and dispatching, not that the queues are drained.
  pub fn sync(&self, timeout: Duration) -> bool {
    if self.worker.lock().is_none() {
      return false;
    }
    let marker = sluice::coord::Event::new();
    let event = marker.clone();
    self.scheduler.post(
      ActionPriority::High,
      Box::new(move || {
        event.set();
      }),
    );
    marker.wait_timeout(timeout)
  }

  /// Stops the proxies (draining each queue), stops the inner writer on the
  /// worker, then drains and joins the worker itself.
  fn halt(&self) -> Result<()> {
    for (_, proxy) in &self.proxies {
      proxy.stop()?;
    }

    let inner = self.inner.clone();
    let setup_log = self.setup_log().clone();
    let name = self.name.clone();
    self.scheduler.post(
      ActionPriority::Normal,
      Box::new(move || {
        if let Err(error) = inner.stop() {
          setup_log.report_error(&name, LogLevel::Error, "inner writer failed to stop", &error);
        }
      }),
    );

    if let Some(worker) = self.worker.lock().take() {
      worker.shutdown();
    }
    Ok(())
  }

  fn dispose_body(&self) {
    for (_, proxy) in &self.proxies {
      let _ = proxy.dispose();
    }

    let has_worker = self.worker.lock().is_some();
    if has_worker {
      let inner = self.inner.clone();
      let setup_log = self.setup_log().clone();
      let name = self.name.clone();
      self.scheduler.post(
        ActionPriority::Normal,
        Box::new(move || {
          if let Err(error) = inner.dispose() {
            setup_log.report_error(
              &name,
              LogLevel::Warn,
              "inner writer failed to dispose",
              &error,
            );
          }
        }),
      );
      if let Some(worker) = self.worker.lock().take() {
        worker.shutdown();
      }
    } else if let Err(error) = self.inner.dispose() {
      self.setup_log().report_error(
        &self.name,
        LogLevel::Warn,
        "inner writer failed to dispose",
        &error,
      );
    }
  }
}

impl Startable for BackgroundLogWriter {
  fn state(&self) -> StartableState {
    self.lifecycle.state()
  }

  fn start(&self) -> Result<()> {
    self.lifecycle.run_start(|is_restart| {
      if is_restart {
        self.halt()?;
      }
      self.spin_up()
    })
  }

  fn stop(&self) -> Result<()> {
    self.lifecycle.run_stop(|| self.halt())
  }

  fn dispose(&self) -> Result<()> {
    self.lifecycle.run_dispose(|| self.dispose_body())
  }

  fn on_state_change(&self, listener: StateListener) {
    self.lifecycle.add_listener(listener);
  }
}

impl LogWriter for BackgroundLogWriter {
  fn name(&self) -> &str {
    &self.name
  }

  // The single worker already serializes every write; no further wrapping
  // is needed in front of this decorator.
  fn is_synchronized(&self) -> bool {
    true
  }

  fn entry_writers(&self) -> Vec<(TypeId, Arc<dyn AnyEntryWriter>)> {
    self
      .proxies
      .iter()
      .map(|(type_id, proxy)| (*type_id, proxy.clone() as Arc<dyn AnyEntryWriter>))
      .collect()
  }

  fn find_entry_writer(&self, entry_type: TypeId) -> Option<Arc<dyn AnyEntryWriter>> {
    self
      .proxies
      .iter()
      .find(|(type_id, _)| *type_id == entry_type)
      .map(|(_, proxy)| proxy.clone() as Arc<dyn AnyEntryWriter>)
  }
}

impl Drop for BackgroundLogWriter {
  fn drop(&mut self) {
    if self.lifecycle.state().is_disposed() {
      return;
    }
    self.setup_log().report(
      &self.name,
      LogLevel::Error,
      "In finalizer - the pipeline was dropped without dispose(); flushing queued entries",
    );
    let _ = self.dispose();
  }
}
