//! Request identity.
//!
//! Token verification happens upstream; by the time a request reaches this
//! API the verified subject id is carried in the `X-User-Id` header.

use std::convert::Infallible;

use axum::{extract::FromRequestParts, http::request::Parts};
use finmart_intake::Identity;

pub const USER_ID_HEADER: &str = "x-user-id";

/// The identity of the caller, anonymous when the header is absent.
#[derive(Debug, Clone)]
pub struct Caller(pub Identity);

impl<S: Send + Sync> FromRequestParts<S> for Caller {
  type Rejection = Infallible;

  async fn from_request_parts(
    parts: &mut Parts,
    _state: &S,
  ) -> Result<Self, Self::Rejection> {
    let subject = parts
      .headers
      .get(USER_ID_HEADER)
      .and_then(|v| v.to_str().ok())
      .map(str::to_owned);
    Ok(Caller(Identity::from(subject)))
  }
}
