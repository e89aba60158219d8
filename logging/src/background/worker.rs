// src/background/worker.rs
// The single consumer thread draining a pipeline's action queues.

use crate::background::action::ActionScheduler;
use crate::background::describe_panic;
use crate::error::{Error, Result};
use crate::setup::SetupLog;
use sluice::sync_util::SpinWait;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Owns the one drain thread of a background pipeline.
///
/// The thread holds only the scheduler handle and the stop flag, never its
/// owning pipeline, so an abandoned pipeline can still be dropped and run
/// its flush path.
pub(crate) struct BackgroundWorker {
  stop_flag: Arc<AtomicBool>,
  handle: JoinHandle<()>,
}

impl fmt::Debug for BackgroundWorker {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("BackgroundWorker")
      .field("stopping", &self.stop_flag.load(Ordering::Relaxed))
      .finish()
  }
}

impl BackgroundWorker {
  pub(crate) fn spawn(
    name: &str,
    scheduler: ActionScheduler,
    setup_log: SetupLog,
  ) -> Result<Self> {
    let stop_flag = Arc::new(AtomicBool::new(false));
    let flag = stop_flag.clone();
    let thread_name = format!("{name}-worker");
    let owner = name.to_string();
    let handle = std::thread::Builder::new()
      .name(thread_name)
      .spawn(move || run(scheduler, flag, setup_log, owner))
      .map_err(|e| Error::WorkerSpawn(e.to_string()))?;
    Ok(Self { stop_flag, handle })
  }

  /// Asks the worker to exit once both queues are drained, then joins it.
  pub(crate) fn shutdown(self) {
    self.stop_flag.store(true, Ordering::Release);
    // The loop never lets an action panic escape, so a join failure would
    // mean a bug in the loop itself; nothing useful to do with it here.
    let _ = self.handle.join();
  }
}

fn run(scheduler: ActionScheduler, stop_flag: Arc<AtomicBool>, setup_log: SetupLog, owner: String) {
  let mut spin = SpinWait::new();
  let mut fault_count = 0usize;

  loop {
    if let Some(action) = scheduler.try_take_high() {
      execute(action, &setup_log, &owner, &mut fault_count);
      spin.reset();
      continue;
    }
    if let Some(action) = scheduler.try_take_normal() {
      execute(action, &setup_log, &owner, &mut fault_count);
      spin.reset();
      continue;
    }
    if spin.about_to_yield() && stop_flag.load(Ordering::Acquire) {
      // Exit only if the queues are still empty now that the flag has been
      // observed, and the flag still holds afterwards; testing in the other
      // order races with a producer posting right before the flag was set.
      if scheduler.is_empty() && stop_flag.load(Ordering::Acquire) {
        break;
      }
    }
    spin.snooze();
  }
}

fn execute(
  action: crate::background::action::Action,
  setup_log: &SetupLog,
  owner: &str,
  fault_count: &mut usize,
) {
  if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(action)) {
    *fault_count += 1;
    if *fault_count == 1 {
      setup_log.report_fault(
        owner,
        "background action panicked; further panics in this run are suppressed",
        describe_panic(&payload),
      );
    }
  }
}
