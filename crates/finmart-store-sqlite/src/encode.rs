//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microseconds, `Z`)
//! so lexical order equals chronological order. Form data is compact JSON.
//! UUIDs are hyphenated lowercase strings.

use chrono::{DateTime, SecondsFormat, Utc};
use finmart_core::{
  document::{Document, FormData, Status},
  kind::Kind,
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Form data ────────────────────────────────────────────────────────────────

pub fn encode_form(form: &FormData) -> Result<String> {
  Ok(serde_json::to_string(form)?)
}

pub fn decode_form(s: &str) -> Result<FormData> { Ok(serde_json::from_str(s)?) }

// ─── Row type ────────────────────────────────────────────────────────────────

/// Column list matching [`RawDocument::from_row`].
pub const COLUMNS: &str =
  "id, kind, user_id, form_data, status, application_id, created_at, updated_at";

/// Raw strings read directly from a `documents` row.
pub struct RawDocument {
  pub id:             String,
  pub kind:           String,
  pub user_id:        Option<String>,
  pub form_data:      String,
  pub status:         String,
  pub application_id: Option<String>,
  pub created_at:     String,
  pub updated_at:     String,
}

impl RawDocument {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:             row.get(0)?,
      kind:           row.get(1)?,
      user_id:        row.get(2)?,
      form_data:      row.get(3)?,
      status:         row.get(4)?,
      application_id: row.get(5)?,
      created_at:     row.get(6)?,
      updated_at:     row.get(7)?,
    })
  }

  pub fn into_document(self) -> Result<Document> {
    Ok(Document {
      id:             decode_uuid(&self.id)?,
      kind:           Kind::parse(&self.kind)?,
      user_id:        self.user_id,
      form_data:      decode_form(&self.form_data)?,
      status:         Status::parse(&self.status)?,
      application_id: self.application_id.as_deref().map(decode_uuid).transpose()?,
      created_at:     decode_dt(&self.created_at)?,
      updated_at:     decode_dt(&self.updated_at)?,
    })
  }
}
