//! Error types for `finmart-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// A submission kind outside the closed enumeration. This is a wiring
  /// mistake, never a user error.
  #[error("unknown submission kind: {0:?}")]
  UnknownKind(String),

  #[error("unknown status: {0:?}")]
  UnknownStatus(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
