//! Caller-facing error taxonomy for the intake layer.
//!
//! Raw backend errors stop here: they are logged, classified through
//! [`Fault`], and never carried inside these types.

use finmart_core::store::Fault;
use thiserror::Error;
use uuid::Uuid;

/// Failure of [`crate::writer::SubmissionWriter::write`].
#[derive(Debug, Error)]
pub enum WriteError {
  /// Programmer error: the kind is not in the routing table.
  #[error("configuration error: {0}")]
  Configuration(#[source] finmart_core::Error),

  #[error("form data must be a JSON object")]
  InvalidFormData,

  /// This kind requires a signed-in caller. Detected before any store call.
  #[error("sign-in required")]
  Unauthenticated,

  /// The store's access policy rejected the write.
  #[error("submission temporarily unavailable")]
  StorePermissionDenied,

  /// Transient failure, still failing after retries.
  #[error("submission temporarily unavailable, please retry")]
  StoreUnavailable,
}

impl WriteError {
  /// Message safe to show an end user. Never includes backend details.
  pub fn user_message(&self) -> &'static str {
    match self {
      Self::Configuration(_) | Self::StorePermissionDenied => {
        "submission temporarily unavailable"
      }
      Self::StoreUnavailable => "submission temporarily unavailable, please retry",
      Self::InvalidFormData => "the form could not be read",
      Self::Unauthenticated => "please sign in to continue",
    }
  }

  pub(crate) fn from_fault(fault: Fault) -> Self {
    match fault {
      Fault::PermissionDenied => Self::StorePermissionDenied,
      Fault::Unavailable | Fault::NotFound | Fault::Invalid | Fault::Internal => {
        Self::StoreUnavailable
      }
    }
  }
}

/// Failure of an admin status operation. Admins are trusted operators, so
/// the class of failure is reported as-is.
#[derive(Debug, Error)]
pub enum TransitionError {
  #[error("invalid status: {0:?}")]
  InvalidStatus(String),

  #[error("unknown collection: {0:?}")]
  UnknownCollection(String),

  #[error("record {id} not found in {collection:?}")]
  NotFound { collection: String, id: Uuid },

  #[error("forbidden by store access policy")]
  Forbidden,

  #[error("record {0} is already in a terminal status")]
  Terminal(Uuid),

  #[error("records of kind {0} cannot be promoted")]
  NotPromotable(finmart_core::kind::Kind),

  #[error("store unavailable")]
  Unavailable,

  #[error("store error: {0}")]
  Store(String),
}

impl TransitionError {
  pub(crate) fn from_store<E: finmart_core::store::StoreFailure>(
    err: E,
    collection: &str,
    id: Uuid,
  ) -> Self {
    match err.fault() {
      Fault::NotFound => Self::NotFound { collection: collection.to_owned(), id },
      Fault::PermissionDenied => Self::Forbidden,
      Fault::Unavailable => Self::Unavailable,
      Fault::Invalid | Fault::Internal => Self::Store(err.to_string()),
    }
  }
}
