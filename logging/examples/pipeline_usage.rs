// examples/pipeline_usage.rs
// Driving the background pipeline directly: a slow sink, bounded
// backpressure and a guaranteed flush on dispose.

use sluice_logging::writer::LogWriterExt;
use sluice_logging::{
  BackgroundLogWriter, BackgroundOptions, EntryWriter, LogLevel, SetupLog, SimpleLogWriter,
  Startable, TraceEntry,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A sink that stalls the way a cold file or network target would.
#[derive(Default)]
struct SlowSink {
  written: AtomicUsize,
}

impl EntryWriter<TraceEntry> for SlowSink {
  fn write(&self, entry: &TraceEntry) {
    std::thread::sleep(Duration::from_millis(5));
    self.written.fetch_add(1, Ordering::SeqCst);
    println!("[sink] {}", entry.message);
  }
}

fn main() {
  let setup_log = SetupLog::new();
  let sink = Arc::new(SlowSink::default());

  let inner = SimpleLogWriter::new("slow", setup_log.clone()).synchronized();
  inner
    .add_entry_writer::<TraceEntry, _>(sink.clone())
    .expect("entry writer registration failed");

  let pipeline = BackgroundLogWriter::new(
    Arc::new(inner),
    BackgroundOptions {
      queue_capacity: 64,
      ..BackgroundOptions::default()
    },
    setup_log.clone(),
  );
  pipeline.start().expect("start failed");

  let writer = pipeline
    .entry_writer::<TraceEntry>()
    .expect("no trace entry writer");

  let begun = Instant::now();
  for i in 0..32 {
    writer.write(&TraceEntry::new("demo.Producer", LogLevel::Info, format!("entry {i}")));
  }
  println!("[main] 32 writes took {:?} on the foreground", begun.elapsed());

  pipeline.dispose().expect("dispose failed");
  println!(
    "[main] sink received {} entries after dispose",
    sink.written.load(Ordering::SeqCst)
  );

  for record in setup_log.entries() {
    println!("[setup] {} {}", record.entry.level, record.entry.message);
  }
}
