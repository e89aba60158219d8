use thiserror::Error;

/// The main error type for `sluice_logging`.
#[derive(Debug, Error)]
pub enum Error {
  #[error("'{component}' has been disposed")]
  ObjectDisposed { component: String },

  #[error("log writer configuration '{name}' is not registered")]
  KeyNotFound { name: String },

  #[error("failed to start '{component}': {reason}")]
  StartFailed { component: String, reason: String },

  #[error("failed to stop '{component}': {reason}")]
  StopFailed { component: String, reason: String },

  #[error("'{component}' is already started; stop it before reconfiguring")]
  AlreadyStarted { component: String },

  #[error("duplicate entry writer for entry type '{type_name}'")]
  DuplicateEntryType { type_name: &'static str },

  #[error("invalid configuration: {0}")]
  Config(String),

  #[error("failed to spawn background worker: {0}")]
  WorkerSpawn(String),
}

/// A specialized `Result` type for `sluice_logging` operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;
