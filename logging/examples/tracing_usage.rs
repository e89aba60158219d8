// examples/tracing_usage.rs
// Configuration-driven tracing: one console target behind the background
// pipeline, switch rules per tracer-name prefix.

use sluice_logging::encoders::TextTraceWriter;
use sluice_logging::{
  BasicWriterConfig, LogLevel, LogManager, LogWriter, OnOffSwitch, SimpleLogWriter, Startable,
  SwitchSet, ThresholdSwitch, TraceEntry, TraceManager, TraceWriterConfig,
};
use std::sync::Arc;

fn main() {
  let manager = Arc::new(LogManager::new());
  manager
    .configure(|config| {
      config.add_writer(Arc::new(
        BasicWriterConfig::new("console", |setup_log| {
          let writer = SimpleLogWriter::new("console", setup_log.clone());
          writer.add_entry_writer::<TraceEntry, _>(Arc::new(TextTraceWriter::new(
            std::io::stdout(),
            setup_log.clone(),
          )))?;
          Ok(Arc::new(writer) as Arc<dyn LogWriter>)
        })
        .with_background_logging(),
      ))
    })
    .expect("configuration failed");

  let tracing = TraceManager::new(manager.clone());
  let mut switches = SwitchSet::new();
  switches.insert("", Arc::new(ThresholdSwitch::new(LogLevel::Info)));
  switches.insert("demo.chatty.", Arc::new(OnOffSwitch::new(false)));
  tracing.add_config(TraceWriterConfig::new("console", switches));

  let main_tracer = tracing.tracer("demo.Main");
  let chatty = tracing.tracer("demo.chatty.Internals");

  {
    let _span = main_tracer.span("startup");
    main_tracer.info(format_args!("services wired"));
    main_tracer.debug(format_args!("below the threshold, dropped"));
    chatty.severe(format_args!("prefix rule drops even severe entries"));
  }

  main_tracer.warn(format_args!("shutting down"));
  manager.stop().expect("shutdown failed");
  assert!(manager.is_healthy());
}
