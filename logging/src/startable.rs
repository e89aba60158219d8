// src/startable.rs
// The reusable lifecycle primitive shared by every managed component.

use crate::error::{Error, Result};
use crate::model::LogLevel;
use crate::setup::SetupLog;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Weak;

/// Lifecycle states of a managed component.
///
/// Transitions are monotonic with respect to disposal: once `Disposing` is
/// entered, only `Disposed` may follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StartableState {
  Unstarted,
  Starting,
  Started,
  Restarting,
  Stopping,
  Stopped,
  FailedToStart,
  FailedToStop,
  Disposing,
  Disposed,
}

impl StartableState {
  pub fn is_disposed(self) -> bool {
    matches!(self, StartableState::Disposing | StartableState::Disposed)
  }
}

impl fmt::Display for StartableState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    fmt::Debug::fmt(self, f)
  }
}

/// Callback invoked on every state transition with `(from, to)`.
pub type StateListener = Box<dyn Fn(StartableState, StartableState) + Send + Sync>;

/// The lifecycle contract of every managed component.
pub trait Startable: Send + Sync {
  fn state(&self) -> StartableState;

  /// Starts the component. Starting an already started component restarts
  /// it; starting a disposed component fails with `Error::ObjectDisposed`.
  fn start(&self) -> Result<()>;

  /// Stops the component. Idempotent; a no-op from `Unstarted`, `Stopped`
  /// and disposed states.
  fn stop(&self) -> Result<()>;

  /// Disposes the component. Terminal and idempotent.
  fn dispose(&self) -> Result<()>;

  /// Registers a listener fired on every state transition.
  fn on_state_change(&self, listener: StateListener);
}

/// Shared implementation of the startable state machine.
///
/// Components embed a `Lifecycle` and drive their transitions through
/// `run_start` / `run_stop` / `run_dispose`, which own the state checks so
/// that each component only supplies the work of the transition itself.
pub struct Lifecycle {
  name: String,
  state: Mutex<StartableState>,
  listeners: Mutex<Vec<StateListener>>,
  // Weak so that registration never extends a component's lifetime; a
  // collected component simply vanishes from the shutdown sequence.
  stop_disposables: Mutex<Vec<Weak<dyn Startable>>>,
  linked_disposables: Mutex<Vec<Weak<dyn Startable>>>,
  setup_log: SetupLog,
  auto_start_attempted: AtomicBool,
}

impl fmt::Debug for Lifecycle {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Lifecycle")
      .field("name", &self.name)
      .field("state", &*self.state.lock())
      .finish_non_exhaustive()
  }
}

impl Lifecycle {
  pub fn new(name: impl Into<String>, setup_log: SetupLog) -> Self {
    Self {
      name: name.into(),
      state: Mutex::new(StartableState::Unstarted),
      listeners: Mutex::new(Vec::new()),
      stop_disposables: Mutex::new(Vec::new()),
      linked_disposables: Mutex::new(Vec::new()),
      setup_log,
      auto_start_attempted: AtomicBool::new(false),
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn setup_log(&self) -> &SetupLog {
    &self.setup_log
  }

  pub fn state(&self) -> StartableState {
    *self.state.lock()
  }

  pub fn add_listener(&self, listener: StateListener) {
    self.listeners.lock().push(listener);
  }

  /// Registers a component disposed on every `run_stop` of this one.
  pub fn register_stop_disposable(&self, item: Weak<dyn Startable>) {
    self.stop_disposables.lock().push(item);
  }

  /// Registers a component disposed when this one is disposed.
  pub fn register_linked_disposable(&self, item: Weak<dyn Startable>) {
    self.linked_disposables.lock().push(item);
  }

  fn set_state(&self, to: StartableState) {
    let from = {
      let mut state = self.state.lock();
      std::mem::replace(&mut *state, to)
    };
    if from != to {
      for listener in self.listeners.lock().iter() {
        listener(from, to);
      }
    }
  }

  /// Runs a start transition. The body receives `true` when this is a
  /// restart of an already started component.
  pub fn run_start<F>(&self, body: F) -> Result<()>
  where
    F: FnOnce(bool) -> Result<()>,
  {
    let (from, is_restart) = {
      let mut state = self.state.lock();
      let from = *state;
      match from {
        StartableState::Disposing | StartableState::Disposed => {
          return Err(Error::ObjectDisposed {
            component: self.name.clone(),
          });
        }
        StartableState::Starting | StartableState::Restarting | StartableState::Stopping => {
          return Err(Error::AlreadyStarted {
            component: self.name.clone(),
          });
        }
        StartableState::Started => {
          *state = StartableState::Restarting;
          (from, true)
        }
        StartableState::Unstarted
        | StartableState::Stopped
        | StartableState::FailedToStart
        | StartableState::FailedToStop => {
          *state = StartableState::Starting;
          (from, false)
        }
      }
    };
    self.fire(
      from,
      if is_restart {
        StartableState::Restarting
      } else {
        StartableState::Starting
      },
    );

    match body(is_restart) {
      Ok(()) => {
        self.set_state(StartableState::Started);
        self
          .setup_log
          .report(&self.name, LogLevel::Debug, "started");
        Ok(())
      }
      Err(error) => {
        self.set_state(StartableState::FailedToStart);
        let failure = Error::StartFailed {
          component: self.name.clone(),
          reason: error.to_string(),
        };
        self
          .setup_log
          .report_error(&self.name, LogLevel::Error, "start failed", &failure);
        Err(failure)
      }
    }
  }

  /// Runs a stop transition, then disposes everything registered in the
  /// stop list. A no-op unless the component is actually running.
  pub fn run_stop<F>(&self, body: F) -> Result<()>
  where
    F: FnOnce() -> Result<()>,
  {
    let from = {
      let mut state = self.state.lock();
      let from = *state;
      match from {
        StartableState::Started | StartableState::FailedToStop => {
          *state = StartableState::Stopping;
          from
        }
        _ => return Ok(()),
      }
    };
    self.fire(from, StartableState::Stopping);

    let result = body();
    self.dispose_registered(&self.stop_disposables);

    match result {
      Ok(()) => {
        self.set_state(StartableState::Stopped);
        self
          .setup_log
          .report(&self.name, LogLevel::Debug, "stopped");
        Ok(())
      }
      Err(error) => {
        self.set_state(StartableState::FailedToStop);
        let failure = Error::StopFailed {
          component: self.name.clone(),
          reason: error.to_string(),
        };
        self
          .setup_log
          .report_error(&self.name, LogLevel::Error, "stop failed", &failure);
        Err(failure)
      }
    }
  }

  /// Runs a dispose transition. Terminal; repeated calls are no-ops.
  pub fn run_dispose<F>(&self, body: F) -> Result<()>
  where
    F: FnOnce(),
  {
    let from = {
      let mut state = self.state.lock();
      let from = *state;
      if from.is_disposed() {
        return Ok(());
      }
      *state = StartableState::Disposing;
      from
    };
    self.fire(from, StartableState::Disposing);

    body();
    self.dispose_registered(&self.stop_disposables);
    self.dispose_registered(&self.linked_disposables);

    self.set_state(StartableState::Disposed);
    Ok(())
  }

  /// Attempts `start` exactly once from `Unstarted`; failures are captured
  /// to the setup log but never propagated.
  pub fn ensure_started<F>(&self, body: F)
  where
    F: FnOnce(bool) -> Result<()>,
  {
    if self.auto_start_attempted.swap(true, Ordering::AcqRel) {
      return;
    }
    if self.state() == StartableState::Unstarted {
      // run_start already records failures to the setup log.
      let _ = self.run_start(body);
    }
  }

  fn dispose_registered(&self, list: &Mutex<Vec<Weak<dyn Startable>>>) {
    let drained: Vec<_> = list.lock().drain(..).collect();
    for weak in drained {
      if let Some(item) = weak.upgrade() {
        if let Err(error) = item.dispose() {
          self.setup_log.report_error(
            &self.name,
            LogLevel::Warn,
            "failed to dispose registered component",
            &error,
          );
        }
      }
    }
  }

  fn fire(&self, from: StartableState, to: StartableState) {
    for listener in self.listeners.lock().iter() {
      listener(from, to);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::AtomicUsize;
  use std::sync::Arc;

  fn lifecycle() -> Lifecycle {
    Lifecycle::new("test", SetupLog::new())
  }

  #[test]
  fn start_stop_happy_path() {
    let lc = lifecycle();
    assert_eq!(lc.state(), StartableState::Unstarted);
    lc.run_start(|_| Ok(())).unwrap();
    assert_eq!(lc.state(), StartableState::Started);
    lc.run_stop(|| Ok(())).unwrap();
    assert_eq!(lc.state(), StartableState::Stopped);
  }

  #[test]
  fn failed_start_is_recorded() {
    let log = SetupLog::new();
    let lc = Lifecycle::new("broken", log.clone());
    let result = lc.run_start(|_| Err(Error::Config("bad".into())));
    assert!(matches!(result, Err(Error::StartFailed { .. })));
    assert_eq!(lc.state(), StartableState::FailedToStart);
    assert!(!log.is_healthy());
  }

  #[test]
  fn stop_is_idempotent() {
    let lc = lifecycle();
    lc.run_stop(|| panic!("body must not run from Unstarted"))
      .unwrap();
    lc.run_start(|_| Ok(())).unwrap();
    lc.run_stop(|| Ok(())).unwrap();
    lc.run_stop(|| panic!("body must not run from Stopped"))
      .unwrap();
  }

  #[test]
  fn start_after_dispose_fails() {
    let lc = lifecycle();
    lc.run_dispose(|| {}).unwrap();
    assert_eq!(lc.state(), StartableState::Disposed);
    let result = lc.run_start(|_| Ok(()));
    assert!(matches!(result, Err(Error::ObjectDisposed { .. })));
  }

  #[test]
  fn dispose_is_terminal_and_idempotent() {
    let lc = lifecycle();
    lc.run_start(|_| Ok(())).unwrap();
    lc.run_dispose(|| {}).unwrap();
    let ran = std::cell::Cell::new(false);
    lc.run_dispose(|| ran.set(true)).unwrap();
    assert!(!ran.get(), "dispose body must not run twice");
  }

  #[test]
  fn restart_passes_flag_to_body() {
    let lc = lifecycle();
    lc.run_start(|is_restart| {
      assert!(!is_restart);
      Ok(())
    })
    .unwrap();
    lc.run_start(|is_restart| {
      assert!(is_restart);
      Ok(())
    })
    .unwrap();
    assert_eq!(lc.state(), StartableState::Started);
  }

  #[test]
  fn ensure_started_runs_once() {
    let lc = lifecycle();
    let runs = AtomicUsize::new(0);
    lc.ensure_started(|_| {
      runs.fetch_add(1, Ordering::SeqCst);
      Ok(())
    });
    lc.ensure_started(|_| {
      runs.fetch_add(1, Ordering::SeqCst);
      Ok(())
    });
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(lc.state(), StartableState::Started);
  }

  #[test]
  fn listeners_observe_transitions() {
    let lc = lifecycle();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    lc.add_listener(Box::new(move |from, to| {
      sink.lock().push((from, to));
    }));
    lc.run_start(|_| Ok(())).unwrap();
    let transitions = seen.lock().clone();
    assert!(transitions
      .iter()
      .any(|(_, to)| *to == StartableState::Started));
  }

  struct Disposable {
    lifecycle: Lifecycle,
    disposed: Arc<AtomicBool>,
  }

  impl Startable for Disposable {
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
      let disposed = self.disposed.clone();
      self.lifecycle.run_dispose(move || {
        disposed.store(true, Ordering::SeqCst);
      })
    }
    fn on_state_change(&self, listener: StateListener) {
      self.lifecycle.add_listener(listener);
    }
  }

  #[test]
  fn stop_list_disposes_weakly_registered_components() {
    let lc = lifecycle();
    lc.run_start(|_| Ok(())).unwrap();

    let disposed = Arc::new(AtomicBool::new(false));
    let item: Arc<dyn Startable> = Arc::new(Disposable {
      lifecycle: Lifecycle::new("item", SetupLog::new()),
      disposed: disposed.clone(),
    });
    lc.register_stop_disposable(Arc::downgrade(&item));

    lc.run_stop(|| Ok(())).unwrap();
    assert!(disposed.load(Ordering::SeqCst));
  }

  #[test]
  fn collected_stop_list_entries_do_not_block_shutdown() {
    let lc = lifecycle();
    lc.run_start(|_| Ok(())).unwrap();
    {
      let item: Arc<dyn Startable> = Arc::new(Disposable {
        lifecycle: Lifecycle::new("item", SetupLog::new()),
        disposed: Arc::new(AtomicBool::new(false)),
      });
      lc.register_stop_disposable(Arc::downgrade(&item));
      // item dropped here; the weak registration must not keep it alive.
    }
    lc.run_stop(|| Ok(())).unwrap();
    assert_eq!(lc.state(), StartableState::Stopped);
  }
}
