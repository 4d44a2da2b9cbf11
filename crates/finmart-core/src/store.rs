//! The `StoreAdapter` trait and supporting query types.
//!
//! The trait is implemented by storage backends (`finmart-store-memory`,
//! `finmart-store-sqlite`). The intake layer depends on this abstraction and
//! receives adapters by injection, never through a global client.

use std::future::Future;

use uuid::Uuid;

use crate::{
  document::{Document, NewDocument, Status},
  kind::Kind,
  live::LiveQuery,
};

// ─── Query type ──────────────────────────────────────────────────────────────

/// Equality filter for [`StoreAdapter::query`] and
/// [`StoreAdapter::subscribe`]. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
  pub user_id:        Option<String>,
  pub kind:           Option<Kind>,
  pub status:         Option<Status>,
  /// Approved-store records promoted from this pending submission.
  pub application_id: Option<Uuid>,
}

impl Filter {
  /// Match documents owned by `user_id`.
  pub fn owner(user_id: impl Into<String>) -> Self {
    Self { user_id: Some(user_id.into()), ..Self::default() }
  }

  pub fn with_kind(mut self, kind: Kind) -> Self {
    self.kind = Some(kind);
    self
  }

  pub fn with_status(mut self, status: Status) -> Self {
    self.status = Some(status);
    self
  }

  pub fn with_application_id(mut self, id: Uuid) -> Self {
    self.application_id = Some(id);
    self
  }

  pub fn matches(&self, doc: &Document) -> bool {
    self
      .user_id
      .as_deref()
      .is_none_or(|u| doc.user_id.as_deref() == Some(u))
      && self.kind.is_none_or(|k| doc.kind == k)
      && self.status.is_none_or(|s| doc.status == s)
      && self.application_id.is_none_or(|id| doc.application_id == Some(id))
  }
}

/// Newest first; ties broken by id so the order is total.
pub fn sort_newest_first(docs: &mut [Document]) {
  docs.sort_by(|a, b| {
    b.created_at
      .cmp(&a.created_at)
      .then_with(|| a.id.cmp(&b.id))
  });
}

// ─── Fault classification ────────────────────────────────────────────────────

/// Backend-independent classification of a store failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
  /// The store's access policy rejected the operation.
  PermissionDenied,
  /// Transient network or service failure; safe to retry.
  Unavailable,
  /// The addressed document does not exist.
  NotFound,
  /// The store rejected malformed input.
  Invalid,
  /// Anything else.
  Internal,
}

/// Implemented by every backend error type so callers can react to the class
/// of failure without inspecting backend-specific variants.
pub trait StoreFailure: std::error::Error + Send + Sync + 'static {
  fn fault(&self) -> Fault;
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// A capability-limited interface over one backing store.
///
/// Every operation addresses a named collection. Identifiers and timestamps
/// are assigned by the store, never by callers.
///
/// All methods return `Send` futures so adapters can be shared across tasks
/// of a multi-threaded runtime.
pub trait StoreAdapter: Send + Sync + 'static {
  type Error: StoreFailure;

  /// Persist a new document. The store assigns `id`, `created_at` and
  /// `updated_at`.
  fn create<'a>(
    &'a self,
    collection: &'a str,
    doc: NewDocument,
  ) -> impl Future<Output = Result<Document, Self::Error>> + Send + 'a;

  /// Fetch a single document. Returns `None` if it does not exist.
  fn get<'a>(
    &'a self,
    collection: &'a str,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Document>, Self::Error>> + Send + 'a;

  /// All documents in `collection` matching `filter`, newest first.
  fn query<'a>(
    &'a self,
    collection: &'a str,
    filter: &'a Filter,
  ) -> impl Future<Output = Result<Vec<Document>, Self::Error>> + Send + 'a;

  /// Open a live query. The returned [`LiveQuery`] yields the full matching
  /// snapshot (newest first) immediately and again after every change to
  /// `collection`, in commit order. Dropping it detaches the query.
  fn subscribe<'a>(
    &'a self,
    collection: &'a str,
    filter: Filter,
  ) -> impl Future<Output = Result<LiveQuery<Self::Error>, Self::Error>> + Send + 'a;

  /// Set `status` on a single document; the store advances `updated_at`.
  /// Fails with a [`Fault::NotFound`] error if the id does not exist.
  fn update_status<'a>(
    &'a self,
    collection: &'a str,
    id: Uuid,
    status: Status,
  ) -> impl Future<Output = Result<Document, Self::Error>> + Send + 'a;
}
