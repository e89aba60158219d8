// src/writer/mod.rs
// The entry-writer composition model: typed sinks, a type-erased registry
// and the LogWriter contract that groups them.

mod fanout;
mod simple;
mod synchronized;

pub use fanout::FanOutEntryWriter;
pub use simple::SimpleLogWriter;
pub use synchronized::SynchronizedLogWriter;

use crate::error::{Error, Result};
use crate::model::LogEntry;
use crate::startable::Startable;
use std::any::TypeId;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// A strongly-typed sink for one specific entry shape.
///
/// `write` must not panic outward; faults are reported through the setup log
/// by the layer that invokes the sink.
pub trait EntryWriter<T: LogEntry>: Send + Sync {
  fn is_enabled(&self) -> bool {
    true
  }

  fn write(&self, entry: &T);

  /// Whether concurrent `write` calls are safe without external locking.
  fn is_synchronized(&self) -> bool {
    false
  }
}

/// The type-erased face of an entry writer, keyed by the `TypeId` of the
/// entry shape it accepts.
pub trait AnyEntryWriter: Send + Sync {
  fn entry_type(&self) -> TypeId;
  fn entry_type_name(&self) -> &'static str;
  fn is_enabled(&self) -> bool;
  fn is_synchronized(&self) -> bool;

  /// Writes an entry whose concrete type matches `entry_type`. Entries of
  /// any other type are ignored.
  fn write_any(&self, entry: &dyn LogEntry);

  /// Downcast support for callers that need the concrete writer.
  fn as_any(&self) -> &dyn std::any::Any;
}

impl fmt::Debug for dyn AnyEntryWriter {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("AnyEntryWriter")
      .field("entry_type", &self.entry_type_name())
      .field("is_enabled", &self.is_enabled())
      .finish()
  }
}

struct Erased<T, W>
where
  T: LogEntry,
  W: EntryWriter<T> + 'static,
{
  writer: Arc<W>,
  _marker: PhantomData<fn(&T)>,
}

impl<T, W> AnyEntryWriter for Erased<T, W>
where
  T: LogEntry,
  W: EntryWriter<T> + 'static,
{
  fn entry_type(&self) -> TypeId {
    TypeId::of::<T>()
  }

  fn entry_type_name(&self) -> &'static str {
    std::any::type_name::<T>()
  }

  fn is_enabled(&self) -> bool {
    self.writer.is_enabled()
  }

  fn is_synchronized(&self) -> bool {
    self.writer.is_synchronized()
  }

  fn write_any(&self, entry: &dyn LogEntry) {
    if let Some(entry) = entry.as_any().downcast_ref::<T>() {
      self.writer.write(entry);
    }
  }

  fn as_any(&self) -> &dyn std::any::Any {
    self
  }
}

/// Erases a typed entry writer into the registry representation.
pub fn erase_entry_writer<T, W>(writer: Arc<W>) -> Arc<dyn AnyEntryWriter>
where
  T: LogEntry,
  W: EntryWriter<T> + 'static,
{
  Arc::new(Erased::<T, W> {
    writer,
    _marker: PhantomData,
  })
}

/// A typed handle over a type-erased entry writer, recovered from a
/// `LogWriter` lookup. The cheap way back from `dyn AnyEntryWriter` to a
/// `write(&T)` call site.
pub struct TypedEntryWriter<T: LogEntry> {
  inner: Arc<dyn AnyEntryWriter>,
  _marker: PhantomData<fn(&T)>,
}

impl<T: LogEntry> fmt::Debug for TypedEntryWriter<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("TypedEntryWriter")
      .field("entry_type", &self.inner.entry_type_name())
      .finish()
  }
}

impl<T: LogEntry> Clone for TypedEntryWriter<T> {
  fn clone(&self) -> Self {
    Self {
      inner: self.inner.clone(),
      _marker: PhantomData,
    }
  }
}

impl<T: LogEntry> TypedEntryWriter<T> {
  /// Wraps the erased writer, refusing a mismatch between `T` and the
  /// writer's declared entry type.
  pub fn new(inner: Arc<dyn AnyEntryWriter>) -> Option<Self> {
    (inner.entry_type() == TypeId::of::<T>()).then_some(Self {
      inner,
      _marker: PhantomData,
    })
  }

  pub fn is_enabled(&self) -> bool {
    self.inner.is_enabled()
  }

  pub fn write(&self, entry: &T) {
    self.inner.write_any(entry);
  }

  pub fn as_erased(&self) -> &Arc<dyn AnyEntryWriter> {
    &self.inner
  }
}

/// Mapping from entry-type id to an entry writer instance; keys unique,
/// insertion order preserved.
#[derive(Default)]
pub struct EntryWriterMap {
  writers: Vec<Arc<dyn AnyEntryWriter>>,
}

impl fmt::Debug for EntryWriterMap {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_list()
      .entries(self.writers.iter().map(|w| w.entry_type_name()))
      .finish()
  }
}

impl EntryWriterMap {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn insert(&mut self, writer: Arc<dyn AnyEntryWriter>) -> Result<()> {
    if self.writers.iter().any(|w| w.entry_type() == writer.entry_type()) {
      return Err(Error::DuplicateEntryType {
        type_name: writer.entry_type_name(),
      });
    }
    self.writers.push(writer);
    Ok(())
  }

  pub fn get(&self, entry_type: TypeId) -> Option<Arc<dyn AnyEntryWriter>> {
    self
      .writers
      .iter()
      .find(|w| w.entry_type() == entry_type)
      .cloned()
  }

  pub fn iter(&self) -> impl Iterator<Item = (TypeId, Arc<dyn AnyEntryWriter>)> + '_ {
    self.writers.iter().map(|w| (w.entry_type(), w.clone()))
  }

  pub fn len(&self) -> usize {
    self.writers.len()
  }

  pub fn is_empty(&self) -> bool {
    self.writers.is_empty()
  }
}

/// A named collection of entry writers, one per supported entry type.
///
/// Object-safe core of the contract; the typed lookup lives on
/// [`LogWriterExt`].
pub trait LogWriter: Startable {
  fn name(&self) -> &str;

  /// When true, concurrent writes on this writer's entry writers are safe
  /// without an external serializer.
  fn is_synchronized(&self) -> bool;

  /// All entry writers, keyed by entry type, in insertion order.
  fn entry_writers(&self) -> Vec<(TypeId, Arc<dyn AnyEntryWriter>)>;

  /// The entry writer declared for `entry_type`, if any.
  fn find_entry_writer(&self, entry_type: TypeId) -> Option<Arc<dyn AnyEntryWriter>>;
}

/// Typed conveniences over any `LogWriter`.
pub trait LogWriterExt: LogWriter {
  /// The writer accepting entries of type `T`, or `None` when the log
  /// writer does not expose that entry type.
  fn entry_writer<T: LogEntry>(&self) -> Option<TypedEntryWriter<T>> {
    self
      .find_entry_writer(TypeId::of::<T>())
      .and_then(TypedEntryWriter::new)
  }
}

impl<W: LogWriter + ?Sized> LogWriterExt for W {}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::TraceEntry;
  use parking_lot::Mutex;

  #[derive(Default)]
  struct Collecting {
    entries: Mutex<Vec<TraceEntry>>,
  }

  impl EntryWriter<TraceEntry> for Collecting {
    fn write(&self, entry: &TraceEntry) {
      self.entries.lock().push(entry.clone());
    }
  }

  #[test]
  fn erased_writer_round_trips_through_typed_handle() {
    let sink = Arc::new(Collecting::default());
    let erased = erase_entry_writer::<TraceEntry, _>(sink.clone());
    assert_eq!(erased.entry_type(), TypeId::of::<TraceEntry>());

    let typed = TypedEntryWriter::<TraceEntry>::new(erased).unwrap();
    typed.write(&TraceEntry::new("t", crate::model::LogLevel::Info, "m"));
    assert_eq!(sink.entries.lock().len(), 1);
  }

  #[test]
  fn typed_handle_rejects_type_mismatch() {
    let sink = Arc::new(Collecting::default());
    let erased = erase_entry_writer::<TraceEntry, _>(sink);
    assert!(TypedEntryWriter::<String>::new(erased).is_none());
  }

  #[test]
  fn write_any_ignores_foreign_entry_types() {
    let sink = Arc::new(Collecting::default());
    let erased = erase_entry_writer::<TraceEntry, _>(sink.clone());
    erased.write_any(&"not a trace entry".to_string());
    assert!(sink.entries.lock().is_empty());
  }

  #[test]
  fn map_rejects_duplicate_entry_types() {
    let mut map = EntryWriterMap::new();
    map
      .insert(erase_entry_writer::<TraceEntry, _>(Arc::new(
        Collecting::default(),
      )))
      .unwrap();
    let duplicate = map.insert(erase_entry_writer::<TraceEntry, _>(Arc::new(
      Collecting::default(),
    )));
    assert!(matches!(
      duplicate,
      Err(Error::DuplicateEntryType { .. })
    ));
    assert_eq!(map.len(), 1);
  }
}
