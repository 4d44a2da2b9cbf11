//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use finmart_intake::{TransitionError, WriteError};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
///
/// End-user failures carry only the generic [`WriteError::user_message`];
/// admin failures report their class verbatim.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("sign-in required")]
  Unauthenticated,

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error(transparent)]
  Write(#[from] WriteError),

  #[error(transparent)]
  Transition(#[from] TransitionError),
}

impl ApiError {
  fn status(&self) -> StatusCode {
    match self {
      Self::Unauthenticated => StatusCode::UNAUTHORIZED,
      Self::BadRequest(_) => StatusCode::BAD_REQUEST,
      Self::Write(e) => match e {
        WriteError::Configuration(_) => StatusCode::NOT_FOUND,
        WriteError::InvalidFormData => StatusCode::BAD_REQUEST,
        WriteError::Unauthenticated => StatusCode::UNAUTHORIZED,
        WriteError::StorePermissionDenied | WriteError::StoreUnavailable => {
          StatusCode::SERVICE_UNAVAILABLE
        }
      },
      Self::Transition(e) => match e {
        TransitionError::InvalidStatus(_) => StatusCode::BAD_REQUEST,
        TransitionError::UnknownCollection(_) | TransitionError::NotFound { .. } => {
          StatusCode::NOT_FOUND
        }
        TransitionError::Forbidden => StatusCode::FORBIDDEN,
        TransitionError::Terminal(_) => StatusCode::CONFLICT,
        TransitionError::NotPromotable(_) => StatusCode::UNPROCESSABLE_ENTITY,
        TransitionError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        TransitionError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
      },
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let message = match &self {
      ApiError::Write(e) => e.user_message().to_owned(),
      other => other.to_string(),
    };
    (self.status(), Json(json!({ "error": message }))).into_response()
  }
}
