// tests/manager.rs
// Orchestration behavior of the log manager.

mod common;

use common::{CountingSink, PanickingSink};
use parking_lot::Mutex;
use sluice_logging::{
  BasicWriterConfig, Error, LogLevel, LogManager, LogWriter, SimpleLogWriter, Startable,
  StartableState, TraceEntry,
};
use std::sync::Arc;

fn counting_writer_config(name: &str, sink: Arc<CountingSink>) -> Arc<BasicWriterConfig> {
  let writer_name = name.to_string();
  Arc::new(BasicWriterConfig::new(name, move |setup_log| {
    let writer = SimpleLogWriter::new(writer_name.clone(), setup_log.clone()).synchronized();
    writer.add_entry_writer::<TraceEntry, _>(sink.clone())?;
    Ok(Arc::new(writer) as Arc<dyn LogWriter>)
  }))
}

fn entry(message: &str) -> TraceEntry {
  TraceEntry::new("test.Source", LogLevel::Info, message)
}

#[test]
fn global_manager_is_a_single_instance() {
  let first = sluice_logging::global();
  let second = sluice_logging::global();
  assert!(Arc::ptr_eq(first, second));
}

#[test]
fn unregistered_names_fail_with_key_not_found() {
  let manager = LogManager::new();
  let result = manager.get_log_writer("missing");
  assert!(matches!(result, Err(Error::KeyNotFound { .. })));
}

#[test]
fn get_log_writer_constructs_lazily_and_caches() {
  let sink = Arc::new(CountingSink::new());
  let manager = LogManager::new();
  manager
    .configure(|config| config.add_writer(counting_writer_config("memory", sink)))
    .unwrap();
  assert_eq!(manager.state(), StartableState::Unstarted);

  let first = manager.get_log_writer("memory").unwrap();
  // The lookup auto-started the manager and the writer.
  assert_eq!(manager.state(), StartableState::Started);
  assert_eq!(first.state(), StartableState::Started);

  let second = manager.get_log_writer("memory").unwrap();
  assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn entry_writer_fans_out_across_log_writers() {
  let first = Arc::new(CountingSink::new());
  let second = Arc::new(CountingSink::new());
  let manager = LogManager::new();
  manager
    .configure(|config| {
      config.add_writer(counting_writer_config("first", first.clone()))?;
      config.add_writer(counting_writer_config("second", second.clone()))
    })
    .unwrap();

  manager.get_log_writer("first").unwrap();
  manager.get_log_writer("second").unwrap();

  let writer = manager.entry_writer::<TraceEntry>().unwrap();
  writer.write(&entry("both"));
  assert_eq!(first.count(), 1);
  assert_eq!(second.count(), 1);

  assert!(manager.entry_writer::<String>().is_none());
}

#[test]
fn stop_runs_in_reverse_startup_order_and_disposes() {
  let order = Arc::new(Mutex::new(Vec::new()));
  let manager = LogManager::new();
  manager
    .configure(|config| {
      config.add_writer(counting_writer_config("first", Arc::new(CountingSink::new())))?;
      config.add_writer(counting_writer_config(
        "second",
        Arc::new(CountingSink::new()),
      ))
    })
    .unwrap();

  let first = manager.get_log_writer("first").unwrap();
  let second = manager.get_log_writer("second").unwrap();
  for (name, writer) in [("first", &first), ("second", &second)] {
    let order = order.clone();
    writer.on_state_change(Box::new(move |_, to| {
      if to == StartableState::Stopping {
        order.lock().push(name);
      }
    }));
  }

  manager.stop().unwrap();
  assert_eq!(*order.lock(), vec!["second", "first"]);
  assert_eq!(first.state(), StartableState::Disposed);
  assert_eq!(second.state(), StartableState::Disposed);
}

#[test]
fn reset_restores_a_configurable_healthy_state() {
  let manager = LogManager::new();
  manager
    .configure(|config| {
      config.add_writer(counting_writer_config("memory", Arc::new(CountingSink::new())))
    })
    .unwrap();
  manager.get_log_writer("memory").unwrap();
  manager.stop().unwrap();

  manager.reset().unwrap();
  assert!(manager.is_healthy());
  assert!(manager.setup_log().is_empty());
  assert!(matches!(
    manager.get_log_writer("memory"),
    Err(Error::KeyNotFound { .. })
  ));

  // Configure-and-start again produces an equivalent healthy state.
  let sink = Arc::new(CountingSink::new());
  manager
    .configure(|config| config.add_writer(counting_writer_config("memory", sink.clone())))
    .unwrap();
  manager.get_log_writer("memory").unwrap();
  manager
    .entry_writer::<TraceEntry>()
    .unwrap()
    .write(&entry("fresh"));
  assert_eq!(sink.count(), 1);
  assert!(manager.is_healthy());
  manager.stop().unwrap();
}

#[test]
fn configuration_is_frozen_while_started() {
  let manager = LogManager::new();
  manager
    .configure(|config| {
      config.add_writer(counting_writer_config("memory", Arc::new(CountingSink::new())))
    })
    .unwrap();
  manager.start().unwrap();

  let result = manager.configure(|_| Ok(()));
  assert!(matches!(result, Err(Error::AlreadyStarted { .. })));
  assert!(matches!(manager.reset(), Err(Error::AlreadyStarted { .. })));

  manager.stop().unwrap();
  manager.configure(|_| Ok(())).unwrap();
}

#[test]
fn faulting_sinks_make_the_manager_unhealthy() {
  let manager = LogManager::new();
  manager
    .configure(|config| {
      config.add_writer(Arc::new(
        BasicWriterConfig::new("broken", |setup_log| {
          let writer = SimpleLogWriter::new("broken", setup_log.clone()).synchronized();
          writer.add_entry_writer::<TraceEntry, _>(Arc::new(PanickingSink))?;
          Ok(Arc::new(writer) as Arc<dyn LogWriter>)
        })
        .with_background_logging(),
      ))
    })
    .unwrap();

  manager.get_log_writer("broken").unwrap();
  assert!(manager.is_healthy());

  // The pipeline isolates the sink's panic and records it; health turns.
  let trace = manager.entry_writer::<TraceEntry>().unwrap();
  trace.write(&entry("boom"));
  manager.stop().unwrap();

  assert!(!manager.is_healthy());
  assert!(manager
    .setup_log()
    .entries()
    .iter()
    .any(|e| e.entry.level == LogLevel::Error));
}
