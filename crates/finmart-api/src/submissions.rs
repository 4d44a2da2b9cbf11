//! Handlers for `/submissions` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/submissions/{kind}` | Body: form-data object; returns 201 + `{id, collection}` |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State, rejection::JsonRejection},
  http::StatusCode,
  response::IntoResponse,
};
use finmart_core::store::StoreAdapter;
use finmart_intake::WriteError;
use serde_json::Value;

use crate::{ApiState, Caller, error::ApiError};

/// `POST /submissions/{kind}`
pub async fn create<P, A>(
  State(state): State<Arc<ApiState<P, A>>>,
  Path(kind): Path<String>,
  Caller(identity): Caller,
  body: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError>
where
  P: StoreAdapter,
  A: StoreAdapter,
{
  let Json(form) = body.map_err(|_| WriteError::InvalidFormData)?;
  let receipt = state.writer.write_named(&kind, form, &identity).await?;
  Ok((StatusCode::CREATED, Json(receipt)))
}
