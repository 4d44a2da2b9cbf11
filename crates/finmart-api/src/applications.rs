//! Handler for `GET /applications`: the caller's merged pending and
//! approved applications, newest first.

use std::sync::Arc;

use axum::{Json, extract::State};
use finmart_core::store::StoreAdapter;
use finmart_intake::aggregate::AggregatedApplication;
use serde::Serialize;

use crate::{ApiState, Caller, error::ApiError};

#[derive(Debug, Serialize)]
pub struct ApplicationsBody {
  pub applications: Vec<AggregatedApplication>,
  /// Set when at least one source could not be read; `applications` then
  /// holds whatever the remaining sources returned.
  pub partial:      bool,
}

/// `GET /applications`
pub async fn list<P, A>(
  State(state): State<Arc<ApiState<P, A>>>,
  Caller(identity): Caller,
) -> Result<Json<ApplicationsBody>, ApiError>
where
  P: StoreAdapter,
  A: StoreAdapter,
{
  let owner = identity.subject().ok_or(ApiError::Unauthenticated)?;
  let snapshot = state.aggregator.snapshot(owner).await;
  Ok(Json(ApplicationsBody {
    partial:      !snapshot.errors.is_empty(),
    applications: snapshot.applications,
  }))
}
