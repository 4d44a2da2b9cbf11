//! Handlers for `/admin` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/admin/{collection}` | Optional `?status=`; newest first |
//! | `POST` | `/admin/{collection}/{id}/status` | Body: `{"status":"approved"}` |
//! | `POST` | `/admin/{collection}/{id}/promote` | Returns 201 + the approved record |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use finmart_core::{
  document::{Document, Status},
  store::StoreAdapter,
};
use finmart_intake::TransitionError;
use serde::Deserialize;
use uuid::Uuid;

use crate::{ApiState, error::ApiError};

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub status: Option<String>,
}

/// `GET /admin/{collection}[?status=<status>]`
pub async fn list<P, A>(
  State(state): State<Arc<ApiState<P, A>>>,
  Path(collection): Path<String>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Document>>, ApiError>
where
  P: StoreAdapter,
  A: StoreAdapter,
{
  let status = params
    .status
    .as_deref()
    .map(|s| Status::parse(s).map_err(|_| TransitionError::InvalidStatus(s.to_owned())))
    .transpose()?;
  let docs = state.transitions.list(&collection, status).await?;
  Ok(Json(docs))
}

// ─── Status ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct StatusBody {
  pub status: String,
}

/// `POST /admin/{collection}/{id}/status`
pub async fn set_status<P, A>(
  State(state): State<Arc<ApiState<P, A>>>,
  Path((collection, id)): Path<(String, Uuid)>,
  Json(body): Json<StatusBody>,
) -> Result<Json<Document>, ApiError>
where
  P: StoreAdapter,
  A: StoreAdapter,
{
  let doc = state
    .transitions
    .transition(id, &collection, &body.status)
    .await?;
  Ok(Json(doc))
}

// ─── Promote ──────────────────────────────────────────────────────────────────

/// `POST /admin/{collection}/{id}/promote`
pub async fn promote<P, A>(
  State(state): State<Arc<ApiState<P, A>>>,
  Path((collection, id)): Path<(String, Uuid)>,
) -> Result<impl IntoResponse, ApiError>
where
  P: StoreAdapter,
  A: StoreAdapter,
{
  let approved = state.transitions.promote(id, &collection).await?;
  Ok((StatusCode::CREATED, Json(approved)))
}
