//! Caller identity as seen by the intake layer.
//!
//! Token verification happens upstream; by the time a request reaches the
//! writer, identity is reduced to an optional subject id.

/// Who is submitting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
  subject_id: Option<String>,
}

impl Identity {
  pub fn anonymous() -> Self { Self::default() }

  pub fn signed_in(subject_id: impl Into<String>) -> Self {
    Self { subject_id: Some(subject_id.into()) }
  }

  /// The subject id, if present and non-blank.
  pub fn subject(&self) -> Option<&str> {
    self
      .subject_id
      .as_deref()
      .map(str::trim)
      .filter(|s| !s.is_empty())
  }
}

impl From<Option<String>> for Identity {
  fn from(subject_id: Option<String>) -> Self { Self { subject_id } }
}
