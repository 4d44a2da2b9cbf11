//! Submission documents as persisted by a store backend.
//!
//! The serialised shape is store-agnostic:
//! `{ id, type, userId, formData, status, applicationId, createdAt, updatedAt }`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};
use uuid::Uuid;

use crate::{Error, Result, kind::Kind};

/// Kind-specific form fields. Only "is an object" is checked by this layer.
pub type FormData = serde_json::Map<String, serde_json::Value>;

// ─── Status ──────────────────────────────────────────────────────────────────

/// Review status of a submission; the admin console exposes exactly these
/// four values.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Default,
  Serialize,
  Deserialize,
  Display,
  EnumIter,
  EnumString,
  IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Status {
  #[default]
  Pending,
  Processing,
  Approved,
  Rejected,
}

impl Status {
  pub fn as_str(self) -> &'static str { self.into() }

  /// Parse an admin-supplied status string.
  pub fn parse(s: &str) -> Result<Self> {
    s.parse().map_err(|_| Error::UnknownStatus(s.to_owned()))
  }

  /// `approved` and `rejected` end the review lifecycle.
  pub fn is_terminal(self) -> bool {
    matches!(self, Self::Approved | Self::Rejected)
  }
}

// ─── Document ────────────────────────────────────────────────────────────────

/// A persisted submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
  /// Store-assigned; never changes.
  pub id:             Uuid,
  #[serde(rename = "type")]
  pub kind:           Kind,
  /// Present only for kinds that require a signed-in caller.
  pub user_id:        Option<String>,
  pub form_data:      FormData,
  pub status:         Status,
  /// On approved-store records: the id of the pending submission this record
  /// was promoted from.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub application_id: Option<Uuid>,
  /// Server-assigned.
  pub created_at:     DateTime<Utc>,
  /// Server-assigned; advances on every status change.
  pub updated_at:     DateTime<Utc>,
}

/// Input to [`crate::store::StoreAdapter::create`]. The id and both
/// timestamps are always assigned by the store.
#[derive(Debug, Clone)]
pub struct NewDocument {
  pub kind:           Kind,
  pub user_id:        Option<String>,
  pub form_data:      FormData,
  pub status:         Status,
  pub application_id: Option<Uuid>,
}

impl NewDocument {
  /// A fresh `pending` submission.
  pub fn pending(kind: Kind, user_id: Option<String>, form_data: FormData) -> Self {
    Self {
      kind,
      user_id,
      form_data,
      status: Status::Pending,
      application_id: None,
    }
  }

  /// Materialise into a [`Document`] with the store-assigned fields.
  pub fn into_document(self, id: Uuid, now: DateTime<Utc>) -> Document {
    Document {
      id,
      kind: self.kind,
      user_id: self.user_id,
      form_data: self.form_data,
      status: self.status,
      application_id: self.application_id,
      created_at: now,
      updated_at: now,
    }
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn status_parsing_is_closed() {
    assert_eq!(Status::parse("approved").unwrap(), Status::Approved);
    assert_eq!(Status::parse("processing").unwrap(), Status::Processing);
    assert!(matches!(
      Status::parse("archived"),
      Err(Error::UnknownStatus(ref s)) if s == "archived"
    ));
    assert!(Status::parse("APPROVED").is_err());
  }

  #[test]
  fn terminal_statuses() {
    assert!(Status::Approved.is_terminal());
    assert!(Status::Rejected.is_terminal());
    assert!(!Status::Pending.is_terminal());
    assert!(!Status::Processing.is_terminal());
    assert_eq!(Status::default(), Status::Pending);
  }

  #[test]
  fn document_serialises_to_contract_shape() {
    let mut form = FormData::new();
    form.insert("amount".into(), json!(50000));
    let now = Utc::now();
    let doc = NewDocument::pending(Kind::UserLoan, Some("u1".into()), form)
      .into_document(Uuid::nil(), now);

    let value = serde_json::to_value(&doc).unwrap();
    assert_eq!(value["type"], json!("user-loan"));
    assert_eq!(value["userId"], json!("u1"));
    assert_eq!(value["formData"]["amount"], json!(50000));
    assert_eq!(value["status"], json!("pending"));
    assert!(value.get("applicationId").is_none());
    assert_eq!(doc.created_at, doc.updated_at);
  }
}
