// src/trace/mod.rs
// Named trace sources, admission switches and switched writers.

mod manager;
mod switch;
mod tracer;
mod writer;

pub use manager::{TraceManager, TraceWriterConfig};
pub use switch::{OnOffSwitch, SwitchSet, ThresholdSwitch, TraceSwitch};
pub use tracer::{TraceSpan, Tracer};
pub use writer::{FanOutTraceWriter, TraceWriter, TracerTarget};
