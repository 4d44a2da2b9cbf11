//! The submission writer: validate, route, stamp, persist.

use std::{sync::Arc, time::Duration};

use finmart_core::{
  document::NewDocument,
  kind::Kind,
  store::{Fault, StoreAdapter, StoreFailure as _},
};
use serde::Serialize;
use uuid::Uuid;

use crate::{error::WriteError, identity::Identity};

// ─── Retry policy ────────────────────────────────────────────────────────────

/// Backoff for transient store failures. Permission denials are never
/// retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
  /// Total attempts including the first; `1` disables retries.
  pub max_attempts: u32,
  /// Delay before the second attempt; doubles on each further attempt.
  pub base_delay:   Duration,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self { max_attempts: 3, base_delay: Duration::from_millis(200) }
  }
}

impl RetryPolicy {
  pub fn none() -> Self { Self { max_attempts: 1, base_delay: Duration::ZERO } }

  fn delay_before(&self, attempt: u32) -> Duration {
    self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(2))
  }
}

// ─── Writer ──────────────────────────────────────────────────────────────────

/// Where a successful write landed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Receipt {
  pub id:         Uuid,
  pub collection: &'static str,
}

/// Routes form submissions into the pending store.
pub struct SubmissionWriter<S> {
  store: Arc<S>,
  retry: RetryPolicy,
}

impl<S: StoreAdapter> SubmissionWriter<S> {
  pub fn new(store: Arc<S>) -> Self { Self { store, retry: RetryPolicy::default() } }

  pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
    self.retry = retry;
    self
  }

  /// Write a submission whose kind arrives as a wire name. Unknown names fail
  /// with [`WriteError::Configuration`] before anything else happens.
  pub async fn write_named(
    &self,
    kind: &str,
    form_data: serde_json::Value,
    identity: &Identity,
  ) -> Result<Receipt, WriteError> {
    let kind = Kind::parse(kind).map_err(|e| {
      tracing::error!(error = %e, "submission with unroutable kind");
      WriteError::Configuration(e)
    })?;
    self.write(kind, form_data, identity).await
  }

  /// Persist one `pending` submission of `kind`.
  ///
  /// Validation (form shape, authentication) happens locally; exactly one
  /// document is created on success and no reads are performed.
  pub async fn write(
    &self,
    kind: Kind,
    form_data: serde_json::Value,
    identity: &Identity,
  ) -> Result<Receipt, WriteError> {
    let route = kind.route();
    tracing::debug!(%kind, collection = route.collection, "routing submission");

    let serde_json::Value::Object(form_data) = form_data else {
      return Err(WriteError::InvalidFormData);
    };

    let owner = if route.requires_auth {
      Some(identity.subject().ok_or(WriteError::Unauthenticated)?.to_owned())
    } else {
      None
    };

    let doc = NewDocument::pending(kind, owner, form_data);

    let mut attempt = 1;
    loop {
      match self.store.create(route.collection, doc.clone()).await {
        Ok(created) => {
          tracing::info!(
            %kind,
            collection = route.collection,
            id = %created.id,
            "submission stored"
          );
          return Ok(Receipt { id: created.id, collection: route.collection });
        }
        Err(e) => {
          let fault = e.fault();
          tracing::warn!(
            %kind,
            collection = route.collection,
            attempt,
            error = %e,
            "submission write failed"
          );
          if fault != Fault::Unavailable || attempt >= self.retry.max_attempts {
            return Err(WriteError::from_fault(fault));
          }
          attempt += 1;
          tokio::time::sleep(self.retry.delay_before(attempt)).await;
        }
      }
    }
  }
}
