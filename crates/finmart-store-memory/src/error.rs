//! Error type for `finmart-store-memory`.

use finmart_core::store::{Fault, StoreFailure};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("write to {0:?} denied by access policy")]
  PermissionDenied(String),

  #[error("store unavailable")]
  Unavailable,

  #[error("document {id} not found in {collection:?}")]
  NotFound { collection: String, id: Uuid },
}

impl StoreFailure for Error {
  fn fault(&self) -> Fault {
    match self {
      Self::PermissionDenied(_) => Fault::PermissionDenied,
      Self::Unavailable => Fault::Unavailable,
      Self::NotFound { .. } => Fault::NotFound,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
