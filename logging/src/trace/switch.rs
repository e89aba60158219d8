// src/trace/switch.rs
// Admission predicates over (tracer name, level).

use crate::model::LogLevel;
use std::fmt;
use std::sync::Arc;

/// A pure predicate deciding whether a tracer may emit at a level.
pub trait TraceSwitch: Send + Sync {
  fn is_enabled(&self, tracer_name: &str, level: LogLevel) -> bool;
}

impl fmt::Debug for dyn TraceSwitch {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("TraceSwitch")
  }
}

/// Enabled when `level >= threshold`, regardless of the tracer name.
#[derive(Debug, Clone, Copy)]
pub struct ThresholdSwitch {
  threshold: LogLevel,
}

impl ThresholdSwitch {
  pub fn new(threshold: LogLevel) -> Self {
    Self { threshold }
  }

  pub fn threshold(&self) -> LogLevel {
    self.threshold
  }
}

impl TraceSwitch for ThresholdSwitch {
  fn is_enabled(&self, _tracer_name: &str, level: LogLevel) -> bool {
    level >= self.threshold
  }
}

/// Unconditionally on or off.
#[derive(Debug, Clone, Copy)]
pub struct OnOffSwitch {
  on: bool,
}

impl OnOffSwitch {
  pub fn new(on: bool) -> Self {
    Self { on }
  }
}

impl TraceSwitch for OnOffSwitch {
  fn is_enabled(&self, _tracer_name: &str, _level: LogLevel) -> bool {
    self.on
  }
}

/// Longest-prefix mapping from tracer-name patterns to switches.
///
/// The most specific matching rule wins; the empty pattern `""` matches
/// every name and serves as the default fallback. A name matching no rule
/// is disabled.
#[derive(Clone, Default)]
pub struct SwitchSet {
  rules: Vec<(String, Arc<dyn TraceSwitch>)>,
}

impl fmt::Debug for SwitchSet {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_list()
      .entries(self.rules.iter().map(|(pattern, _)| pattern))
      .finish()
  }
}

impl SwitchSet {
  pub fn new() -> Self {
    Self::default()
  }

  /// Adds or replaces the rule for `pattern`.
  pub fn insert(&mut self, pattern: impl Into<String>, switch: Arc<dyn TraceSwitch>) {
    let pattern = pattern.into();
    if let Some(existing) = self.rules.iter_mut().find(|(p, _)| *p == pattern) {
      existing.1 = switch;
    } else {
      self.rules.push((pattern, switch));
    }
  }

  /// The most specific rule matching `tracer_name`, if any.
  pub fn resolve(&self, tracer_name: &str) -> Option<&Arc<dyn TraceSwitch>> {
    self
      .rules
      .iter()
      .filter(|(pattern, _)| tracer_name.starts_with(pattern.as_str()))
      .max_by_key(|(pattern, _)| pattern.len())
      .map(|(_, switch)| switch)
  }

  pub fn is_empty(&self) -> bool {
    self.rules.is_empty()
  }
}

impl TraceSwitch for SwitchSet {
  fn is_enabled(&self, tracer_name: &str, level: LogLevel) -> bool {
    self
      .resolve(tracer_name)
      .map_or(false, |switch| switch.is_enabled(tracer_name, level))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn threshold_switch_compares_levels() {
    let switch = ThresholdSwitch::new(LogLevel::Warn);
    assert!(!switch.is_enabled("any", LogLevel::Info));
    assert!(switch.is_enabled("any", LogLevel::Warn));
    assert!(switch.is_enabled("any", LogLevel::Error));
  }

  #[test]
  fn on_off_switch_ignores_inputs() {
    assert!(OnOffSwitch::new(true).is_enabled("x", LogLevel::Verbose));
    assert!(!OnOffSwitch::new(false).is_enabled("x", LogLevel::Severe));
  }

  #[test]
  fn empty_pattern_is_the_default_fallback() {
    let mut set = SwitchSet::new();
    set.insert("", Arc::new(ThresholdSwitch::new(LogLevel::Warn)));
    assert!(set.is_enabled("a.b.C", LogLevel::Warn));
    assert!(!set.is_enabled("a.b.C", LogLevel::Info));
  }

  #[test]
  fn longest_prefix_wins() {
    let mut set = SwitchSet::new();
    set.insert("", Arc::new(ThresholdSwitch::new(LogLevel::Warn)));
    set.insert("a.b.", Arc::new(OnOffSwitch::new(false)));

    // The more specific prefix drops Warn too.
    assert!(!set.is_enabled("a.b.C", LogLevel::Warn));
    assert!(!set.is_enabled("a.b.C", LogLevel::Error));
    // Unrelated names still fall back to the threshold rule.
    assert!(set.is_enabled("other.D", LogLevel::Warn));
  }

  #[test]
  fn unmatched_name_is_disabled() {
    let mut set = SwitchSet::new();
    set.insert("app.", Arc::new(OnOffSwitch::new(true)));
    assert!(!set.is_enabled("lib.module", LogLevel::Severe));
  }

  #[test]
  fn insert_replaces_existing_pattern() {
    let mut set = SwitchSet::new();
    set.insert("", Arc::new(OnOffSwitch::new(false)));
    set.insert("", Arc::new(OnOffSwitch::new(true)));
    assert!(set.is_enabled("x", LogLevel::Verbose));
  }
}
