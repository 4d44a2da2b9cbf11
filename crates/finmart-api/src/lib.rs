//! JSON REST API for finmart.
//!
//! Exposes axum [`Router`]s backed by any pair of
//! [`finmart_core::store::StoreAdapter`]s: one for pending submissions and
//! one for approved records. Identity verification, admin authentication and
//! transport concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! let state = Arc::new(ApiState::new(pending, approved));
//! Router::new()
//!   .merge(finmart_api::api_router(state.clone()))
//!   .merge(finmart_api::admin_router(state).layer(auth))
//! ```

pub mod admin;
pub mod applications;
pub mod caller;
pub mod error;
pub mod submissions;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use finmart_core::store::StoreAdapter;
use finmart_intake::{
  aggregate::Aggregator,
  transition::TransitionManager,
  writer::{RetryPolicy, SubmissionWriter},
};

pub use caller::Caller;
pub use error::ApiError;

/// The intake services shared by every handler.
pub struct ApiState<P, A> {
  pub writer:      SubmissionWriter<P>,
  pub aggregator:  Aggregator<P, A>,
  pub transitions: TransitionManager<P, A>,
}

impl<P: StoreAdapter, A: StoreAdapter> ApiState<P, A> {
  pub fn new(pending: Arc<P>, approved: Arc<A>) -> Self {
    Self {
      writer:      SubmissionWriter::new(Arc::clone(&pending)),
      aggregator:  Aggregator::new(Arc::clone(&pending), Arc::clone(&approved)),
      transitions: TransitionManager::new(pending, approved),
    }
  }

  pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
    self.writer = self.writer.with_retry(retry);
    self
  }

  pub fn with_terminal_guard(mut self, enabled: bool) -> Self {
    self.transitions = self.transitions.with_terminal_guard(enabled);
    self
  }

  pub fn collapse_promoted(mut self, collapse: bool) -> Self {
    self.aggregator = self.aggregator.collapse_promoted(collapse);
    self
  }
}

/// End-user routes: submitting forms and reading one's own applications.
pub fn api_router<P, A>(state: Arc<ApiState<P, A>>) -> Router<()>
where
  P: StoreAdapter,
  A: StoreAdapter,
{
  Router::new()
    .route("/submissions/{kind}", post(submissions::create::<P, A>))
    .route("/applications", get(applications::list::<P, A>))
    .with_state(state)
}

/// Admin routes. Mount behind an authentication layer.
pub fn admin_router<P, A>(state: Arc<ApiState<P, A>>) -> Router<()>
where
  P: StoreAdapter,
  A: StoreAdapter,
{
  Router::new()
    .route("/admin/{collection}", get(admin::list::<P, A>))
    .route("/admin/{collection}/{id}/status", post(admin::set_status::<P, A>))
    .route("/admin/{collection}/{id}/promote", post(admin::promote::<P, A>))
    .with_state(state)
}
