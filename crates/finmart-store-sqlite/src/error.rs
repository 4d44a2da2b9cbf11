//! Error type for `finmart-store-sqlite`.

use finmart_core::store::{Fault, StoreFailure};
use rusqlite::ErrorCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] finmart_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("write to {0:?} denied by access policy")]
  PermissionDenied(String),

  #[error("document {id} not found in {collection:?}")]
  NotFound { collection: String, id: uuid::Uuid },
}

impl StoreFailure for Error {
  fn fault(&self) -> Fault {
    match self {
      Self::PermissionDenied(_) => Fault::PermissionDenied,
      Self::NotFound { .. } => Fault::NotFound,
      Self::Database(e) => classify(e),
      Self::Core(_) => Fault::Invalid,
      Self::Json(_) | Self::Uuid(_) | Self::DateParse(_) => Fault::Internal,
    }
  }
}

fn classify(err: &tokio_rusqlite::Error) -> Fault {
  match err {
    tokio_rusqlite::Error::ConnectionClosed => Fault::Unavailable,
    tokio_rusqlite::Error::Rusqlite(e) => match e.sqlite_error_code() {
      Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => Fault::Unavailable,
      Some(
        ErrorCode::ReadOnly
        | ErrorCode::PermissionDenied
        | ErrorCode::AuthorizationForStatementDenied,
      ) => Fault::PermissionDenied,
      _ => Fault::Internal,
    },
    _ => Fault::Internal,
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
