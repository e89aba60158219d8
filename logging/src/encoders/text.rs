// src/encoders/text.rs

use crate::encoders::{
  abbreviate_type_name, format_date, format_timestamp, Color, Formatter,
};
use crate::model::{LogLevel, TraceEntry};
use crate::setup::SetupLog;
use crate::writer::EntryWriter;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::io::{self, Write};
use std::sync::atomic::{AtomicUsize, Ordering};

/// A plain-text `Formatter` over any `io::Write`.
pub struct TextFormatter<W: Write + Send> {
  writer: W,
  color_enabled: bool,
  line_delimiter: String,
  in_entry: bool,
}

impl<W: Write + Send> std::fmt::Debug for TextFormatter<W> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("TextFormatter")
      .field("color_enabled", &self.color_enabled)
      .field("in_entry", &self.in_entry)
      .finish()
  }
}

impl<W: Write + Send> TextFormatter<W> {
  pub fn new(writer: W) -> Self {
    Self {
      writer,
      color_enabled: false,
      line_delimiter: "\n".to_string(),
      in_entry: false,
    }
  }

  pub fn with_colors(mut self) -> Self {
    self.color_enabled = true;
    self
  }

  fn write_colored(&mut self, text: &str, color: Color, pad_width: usize) -> io::Result<()> {
    let padded = if pad_width > text.len() {
      format!("{text:<pad_width$}")
    } else {
      text.to_string()
    };
    match color.ansi_code().filter(|_| self.color_enabled) {
      Some(code) => write!(self.writer, "\x1b[{code}m{padded}\x1b[0m "),
      None => write!(self.writer, "{padded} "),
    }
  }

  fn unbalanced(what: &str) -> io::Error {
    io::Error::new(io::ErrorKind::Other, format!("unbalanced {what}"))
  }
}

impl<W: Write + Send> Formatter for TextFormatter<W> {
  fn begin_entry(&mut self, indent: usize) -> io::Result<()> {
    if self.in_entry {
      return Err(Self::unbalanced("begin_entry"));
    }
    self.in_entry = true;
    for _ in 0..indent {
      self.writer.write_all(b"  ")?;
    }
    Ok(())
  }

  fn end_entry(&mut self) -> io::Result<()> {
    if !self.in_entry {
      return Err(Self::unbalanced("end_entry"));
    }
    self.in_entry = false;
    self.writer.write_all(self.line_delimiter.as_bytes())?;
    self.writer.flush()
  }

  fn write_field(&mut self, text: &str, color: Color, pad_width: usize) -> io::Result<()> {
    self.write_colored(text, color, pad_width)
  }

  fn write_lines(&mut self, text: &str, color: Color, indent: usize) -> io::Result<()> {
    for (index, line) in text.split('\n').enumerate() {
      if index > 0 {
        self.writer.write_all(self.line_delimiter.as_bytes())?;
        for _ in 0..indent {
          self.writer.write_all(b"  ")?;
        }
      }
      match color.ansi_code().filter(|_| self.color_enabled) {
        Some(code) => write!(self.writer, "\x1b[{code}m{line}\x1b[0m")?,
        None => self.writer.write_all(line.as_bytes())?,
      }
    }
    Ok(())
  }

  fn write_timestamp(&mut self, utc: DateTime<Utc>) -> io::Result<()> {
    let stamp = format_timestamp(utc);
    write!(self.writer, "{stamp} ")
  }

  fn write_date(&mut self, utc: DateTime<Utc>) -> io::Result<()> {
    let date = format_date(utc);
    write!(self.writer, "{date} ")
  }

  fn write_abbreviated_type_name(
    &mut self,
    name: &str,
    color: Color,
    pad_width: usize,
  ) -> io::Result<()> {
    let abbreviated = abbreviate_type_name(name);
    self.write_colored(&abbreviated, color, pad_width)
  }

  fn line_delimiter(&self) -> &str {
    &self.line_delimiter
  }

  fn is_color_enabled(&self) -> bool {
    self.color_enabled
  }
}

fn level_color(level: LogLevel) -> Color {
  match level {
    LogLevel::Verbose | LogLevel::Debug => Color::Default,
    LogLevel::Info => Color::Green,
    LogLevel::Warn => Color::Yellow,
    LogLevel::Error | LogLevel::Severe => Color::Red,
  }
}

/// A trace entry writer rendering through a [`TextFormatter`].
///
/// The formatter sits behind a mutex, so this writer tolerates concurrent
/// producers and upholds the one-entry-in-flight pairing rule by itself.
pub struct TextTraceWriter<W: Write + Send> {
  formatter: Mutex<TextFormatter<W>>,
  message_only: bool,
  fault_count: AtomicUsize,
  setup_log: SetupLog,
}

impl<W: Write + Send> std::fmt::Debug for TextTraceWriter<W> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("TextTraceWriter")
      .field("message_only", &self.message_only)
      .finish()
  }
}

impl<W: Write + Send> TextTraceWriter<W> {
  /// Full rendering: timestamp, level, abbreviated tracer name, message and
  /// any detail or error block.
  pub fn new(writer: W, setup_log: SetupLog) -> Self {
    Self {
      formatter: Mutex::new(TextFormatter::new(writer)),
      message_only: false,
      fault_count: AtomicUsize::new(0),
      setup_log,
    }
  }

  /// Renders only the message text, one entry per line.
  pub fn message_only(writer: W, setup_log: SetupLog) -> Self {
    Self {
      formatter: Mutex::new(TextFormatter::new(writer)),
      message_only: true,
      fault_count: AtomicUsize::new(0),
      setup_log,
    }
  }

  fn render(&self, entry: &TraceEntry) -> io::Result<()> {
    let mut formatter = self.formatter.lock();
    formatter.begin_entry(0)?;
    if !self.message_only {
      formatter.write_timestamp(entry.timestamp)?;
      formatter.write_field(&entry.level.to_string(), level_color(entry.level), 7)?;
      formatter.write_abbreviated_type_name(&entry.tracer_name, Color::Cyan, 0)?;
    }
    formatter.write_lines(&entry.message, Color::Default, 1)?;
    if let Some(details) = &entry.details {
      formatter.write_lines(&format!("\n{details}"), Color::Default, 2)?;
    }
    if let Some(error) = &entry.error {
      formatter.write_lines(&format!("\n{error}"), Color::Red, 2)?;
    }
    formatter.end_entry()
  }
}

impl<W: Write + Send> EntryWriter<TraceEntry> for TextTraceWriter<W> {
  fn write(&self, entry: &TraceEntry) {
    if let Err(error) = self.render(entry) {
      let previous = self.fault_count.fetch_add(1, Ordering::AcqRel);
      if previous == 0 {
        self.setup_log.report_error(
          "text-writer",
          LogLevel::Error,
          "failed to render trace entry; further failures are suppressed",
          &error,
        );
      }
      // Leave no entry half-open after a failed render.
      let mut formatter = self.formatter.lock();
      formatter.in_entry = false;
    }
  }

  fn is_synchronized(&self) -> bool {
    true
  }
}
