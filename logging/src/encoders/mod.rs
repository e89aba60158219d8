// src/encoders/mod.rs
// Formatting strategies for rendering trace entries to text sinks.

pub mod json;
pub mod text;

pub use json::JsonTraceWriter;
pub use text::{TextFormatter, TextTraceWriter};

use chrono::{DateTime, Utc};
use std::io;

/// Colors a formatter may apply when `is_color_enabled` reports true.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
  Default,
  Red,
  Green,
  Yellow,
  Blue,
  Magenta,
  Cyan,
  White,
}

impl Color {
  /// The ANSI SGR code for the color, or `None` for the terminal default.
  pub(crate) fn ansi_code(self) -> Option<&'static str> {
    match self {
      Color::Default => None,
      Color::Red => Some("31"),
      Color::Green => Some("32"),
      Color::Yellow => Some("33"),
      Color::Blue => Some("34"),
      Color::Magenta => Some("35"),
      Color::Cyan => Some("36"),
      Color::White => Some("37"),
    }
  }
}

/// The contract text sinks program against.
///
/// `begin_entry` and `end_entry` must be paired, with at most one entry in
/// flight per formatter at a time; the synchronization layer upstream
/// guarantees the exclusion.
pub trait Formatter: Send {
  fn begin_entry(&mut self, indent: usize) -> io::Result<()>;
  fn end_entry(&mut self) -> io::Result<()>;

  fn write_field(&mut self, text: &str, color: Color, pad_width: usize) -> io::Result<()>;
  fn write_lines(&mut self, text: &str, color: Color, indent: usize) -> io::Result<()>;
  fn write_timestamp(&mut self, utc: DateTime<Utc>) -> io::Result<()>;
  fn write_date(&mut self, utc: DateTime<Utc>) -> io::Result<()>;
  fn write_abbreviated_type_name(
    &mut self,
    name: &str,
    color: Color,
    pad_width: usize,
  ) -> io::Result<()>;

  fn line_delimiter(&self) -> &str;
  fn is_color_enabled(&self) -> bool;
}

/// Shortens a dotted type name by abbreviating its first `dots / 2 + 1`
/// segments: each keeps its first character (lower-cased) plus the
/// segment's remaining non-lowercase characters.
///
/// `"Company.Product.Component"` becomes `"c.p.Component"`, and
/// `"FooBar.Baz"` becomes `"fB.Baz"`.
pub fn abbreviate_type_name(name: &str) -> String {
  let segments: Vec<&str> = name.split('.').collect();
  let dots = segments.len() - 1;
  let abbreviated = dots / 2 + 1;

  let mut out = String::with_capacity(name.len());
  for (index, segment) in segments.iter().enumerate() {
    if index > 0 {
      out.push('.');
    }
    if index < abbreviated {
      let mut chars = segment.chars();
      if let Some(first) = chars.next() {
        out.extend(first.to_lowercase());
      }
      out.extend(chars.filter(|c| !c.is_lowercase()));
    } else {
      out.push_str(segment);
    }
  }
  out
}

pub(crate) fn format_timestamp(utc: DateTime<Utc>) -> String {
  utc.format("%Y-%m-%d %H:%M:%S%.3f").to_string()
}

pub(crate) fn format_date(utc: DateTime<Utc>) -> String {
  utc.format("%Y-%m-%d").to_string()
}
