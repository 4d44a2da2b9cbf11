//! Admin-side status changes.
//!
//! A transition is a single `status` update through the owning store; the
//! store advances `updated_at` and notifies live queries, which is how the
//! change reaches any open aggregate. Concurrent transitions on one record
//! are last-write-wins.

use std::sync::Arc;

use finmart_core::{
  document::{Document, NewDocument, Status},
  kind::{Kind, collections},
  store::{Filter, StoreAdapter},
};
use uuid::Uuid;

use crate::error::TransitionError;

/// Collections an admin may address, pending side.
fn is_pending_collection(name: &str) -> bool {
  Kind::ALL.iter().any(|k| k.route().collection == name)
}

/// Status operations over the pending store `P` and approved store `A`.
pub struct TransitionManager<P, A> {
  pending:        Arc<P>,
  approved:       Arc<A>,
  terminal_guard: bool,
}

impl<P: StoreAdapter, A: StoreAdapter> TransitionManager<P, A> {
  pub fn new(pending: Arc<P>, approved: Arc<A>) -> Self {
    Self { pending, approved, terminal_guard: false }
  }

  /// Refuse transitions out of `approved`/`rejected`, and promotion of a
  /// rejected record. Costs one read per transition and is still racy
  /// against concurrent writers.
  pub fn with_terminal_guard(mut self, enabled: bool) -> Self {
    self.terminal_guard = enabled;
    self
  }

  /// Transition using an admin-supplied status string. Anything outside the
  /// four known values is rejected before the store is touched.
  pub async fn transition(
    &self,
    id: Uuid,
    collection: &str,
    status: &str,
  ) -> Result<Document, TransitionError> {
    let status = Status::parse(status)
      .map_err(|_| TransitionError::InvalidStatus(status.to_owned()))?;
    self.transition_to(id, collection, status).await
  }

  /// Set `status` on record `id` in `collection`.
  pub async fn transition_to(
    &self,
    id: Uuid,
    collection: &str,
    status: Status,
  ) -> Result<Document, TransitionError> {
    let doc = if collections::is_approved(collection) {
      update(&*self.approved, collection, id, status, self.terminal_guard).await?
    } else if is_pending_collection(collection) {
      update(&*self.pending, collection, id, status, self.terminal_guard).await?
    } else {
      return Err(TransitionError::UnknownCollection(collection.to_owned()));
    };

    tracing::info!(collection, %id, status = %status, "status transitioned");
    Ok(doc)
  }

  /// Records in `collection`, newest first, optionally filtered by status.
  pub async fn list(
    &self,
    collection: &str,
    status: Option<Status>,
  ) -> Result<Vec<Document>, TransitionError> {
    let filter = Filter { status, ..Filter::default() };
    let nil = Uuid::nil();
    if collections::is_approved(collection) {
      self
        .approved
        .query(collection, &filter)
        .await
        .map_err(|e| TransitionError::from_store(e, collection, nil))
    } else if is_pending_collection(collection) {
      self
        .pending
        .query(collection, &filter)
        .await
        .map_err(|e| TransitionError::from_store(e, collection, nil))
    } else {
      Err(TransitionError::UnknownCollection(collection.to_owned()))
    }
  }

  /// Approve a user application and record it in the approved store.
  ///
  /// The approved record carries `application_id = id`, giving the two
  /// stores a real join key. Promotion is idempotent: an approved record
  /// already naming `id` is returned instead of creating another, and a
  /// pending record left unapproved by an earlier failed attempt is approved
  /// on the retry. Concurrent promotions of one record are not serialised.
  pub async fn promote(
    &self,
    id: Uuid,
    collection: &str,
  ) -> Result<Document, TransitionError> {
    if !is_pending_collection(collection) {
      return Err(TransitionError::UnknownCollection(collection.to_owned()));
    }

    let source = self
      .pending
      .get(collection, id)
      .await
      .map_err(|e| TransitionError::from_store(e, collection, id))?
      .ok_or_else(|| TransitionError::NotFound { collection: collection.to_owned(), id })?;

    let family = source
      .kind
      .family()
      .ok_or(TransitionError::NotPromotable(source.kind))?;
    if self.terminal_guard && source.status == Status::Rejected {
      return Err(TransitionError::Terminal(id));
    }

    let target = family.approved_collection();
    let existing = self
      .approved
      .query(target, &Filter::default().with_application_id(id))
      .await
      .map_err(|e| TransitionError::from_store(e, target, id))?
      .into_iter()
      .next();

    let pending_status = source.status;
    let approved = match existing {
      Some(approved) => {
        tracing::debug!(collection, %id, approved_id = %approved.id, "already promoted");
        approved
      }
      None => self
        .approved
        .create(target, NewDocument {
          kind:           source.kind,
          user_id:        source.user_id,
          form_data:      source.form_data,
          status:         Status::Approved,
          application_id: Some(id),
        })
        .await
        .map_err(|e| TransitionError::from_store(e, target, id))?,
    };

    if pending_status != Status::Approved {
      self
        .pending
        .update_status(collection, id, Status::Approved)
        .await
        .map_err(|e| {
          tracing::warn!(collection, %id, error = %e, "promoted record left unapproved");
          TransitionError::from_store(e, collection, id)
        })?;
    }

    tracing::info!(collection, %id, approved_id = %approved.id, "application promoted");
    Ok(approved)
  }
}

async fn update<S: StoreAdapter>(
  store: &S,
  collection: &str,
  id: Uuid,
  status: Status,
  terminal_guard: bool,
) -> Result<Document, TransitionError> {
  if terminal_guard {
    let current = store
      .get(collection, id)
      .await
      .map_err(|e| TransitionError::from_store(e, collection, id))?
      .ok_or_else(|| TransitionError::NotFound { collection: collection.to_owned(), id })?;
    if current.status.is_terminal() {
      return Err(TransitionError::Terminal(id));
    }
  }

  store
    .update_status(collection, id, status)
    .await
    .map_err(|e| {
      tracing::warn!(collection, %id, error = %e, "status transition failed");
      TransitionError::from_store(e, collection, id)
    })
}

#[cfg(test)]
mod tests {
  use std::time::Duration;

  use finmart_core::document::FormData;
  use finmart_store_memory::MemoryStore;
  use serde_json::json;
  use tokio::sync::mpsc;

  use super::*;
  use crate::aggregate::{AggregateScope, Aggregator, Source};

  fn manager(p: &MemoryStore, a: &MemoryStore) -> TransitionManager<MemoryStore, MemoryStore> {
    TransitionManager::new(Arc::new(p.clone()), Arc::new(a.clone()))
  }

  async fn user_loan(p: &MemoryStore) -> Document {
    let mut form = FormData::new();
    form.insert("amount".into(), json!(120000));
    p.create(
      "loan_applications",
      NewDocument::pending(Kind::UserLoan, Some("u1".into()), form),
    )
    .await
    .unwrap()
  }

  #[tokio::test]
  async fn approve_updates_status_and_advances_updated_at() {
    let (p, a) = (MemoryStore::new(), MemoryStore::new());
    let doc = user_loan(&p).await;

    let updated = manager(&p, &a)
      .transition(doc.id, "loan_applications", "approved")
      .await
      .unwrap();
    assert_eq!(updated.status, Status::Approved);
    assert!(updated.updated_at > doc.updated_at);
    assert_eq!(p.dump("loan_applications")[0].status, Status::Approved);
  }

  #[tokio::test]
  async fn missing_record_is_not_found() {
    let (p, a) = (MemoryStore::new(), MemoryStore::new());
    let err = manager(&p, &a)
      .transition(Uuid::new_v4(), "loan_applications", "approved")
      .await
      .unwrap_err();
    assert!(matches!(err, TransitionError::NotFound { .. }));
  }

  #[tokio::test]
  async fn invalid_status_never_reaches_the_store() {
    let (p, a) = (MemoryStore::new(), MemoryStore::new());
    let doc = user_loan(&p).await;
    let before = p.calls();

    for bad in ["archived", "Approved", ""] {
      let err = manager(&p, &a)
        .transition(doc.id, "loan_applications", bad)
        .await
        .unwrap_err();
      assert!(matches!(err, TransitionError::InvalidStatus(ref s) if s == bad));
    }
    assert_eq!(p.calls(), before);
  }

  #[tokio::test]
  async fn policy_rejection_is_forbidden() {
    let (p, a) = (MemoryStore::new(), MemoryStore::new());
    let doc = user_loan(&p).await;
    p.deny_writes("loan_applications");
    let err = manager(&p, &a)
      .transition(doc.id, "loan_applications", "rejected")
      .await
      .unwrap_err();
    assert!(matches!(err, TransitionError::Forbidden));
  }

  #[tokio::test]
  async fn unknown_collection_is_rejected() {
    let (p, a) = (MemoryStore::new(), MemoryStore::new());
    let err = manager(&p, &a)
      .transition(Uuid::new_v4(), "users", "approved")
      .await
      .unwrap_err();
    assert!(matches!(err, TransitionError::UnknownCollection(_)));
    assert_eq!(p.calls() + a.calls(), 0);
  }

  #[tokio::test]
  async fn terminal_statuses_are_rewritable_without_the_guard() {
    let (p, a) = (MemoryStore::new(), MemoryStore::new());
    let doc = user_loan(&p).await;
    let m = manager(&p, &a);
    m.transition(doc.id, "loan_applications", "rejected").await.unwrap();
    let again = m.transition(doc.id, "loan_applications", "processing").await.unwrap();
    assert_eq!(again.status, Status::Processing);
  }

  #[tokio::test]
  async fn terminal_guard_refuses_leaving_a_terminal_status() {
    let (p, a) = (MemoryStore::new(), MemoryStore::new());
    let doc = user_loan(&p).await;
    let m = manager(&p, &a).with_terminal_guard(true);
    m.transition(doc.id, "loan_applications", "processing").await.unwrap();
    m.transition(doc.id, "loan_applications", "approved").await.unwrap();
    let err = m
      .transition(doc.id, "loan_applications", "pending")
      .await
      .unwrap_err();
    assert!(matches!(err, TransitionError::Terminal(id) if id == doc.id));
  }

  #[tokio::test]
  async fn approved_store_collections_route_to_the_approved_store() {
    let (p, a) = (MemoryStore::new(), MemoryStore::new());
    let doc = user_loan(&p).await;
    let m = manager(&p, &a);
    let approved = m.promote(doc.id, "loan_applications").await.unwrap();

    let rejected = m
      .transition(approved.id, "approved_loans", "rejected")
      .await
      .unwrap();
    assert_eq!(rejected.status, Status::Rejected);
    assert_eq!(a.dump("approved_loans")[0].status, Status::Rejected);
  }

  #[tokio::test]
  async fn list_filters_by_status() {
    let (p, a) = (MemoryStore::new(), MemoryStore::new());
    let first = user_loan(&p).await;
    user_loan(&p).await;
    let m = manager(&p, &a);
    m.transition(first.id, "loan_applications", "processing").await.unwrap();

    assert_eq!(m.list("loan_applications", None).await.unwrap().len(), 2);
    let processing = m
      .list("loan_applications", Some(Status::Processing))
      .await
      .unwrap();
    assert_eq!(processing.len(), 1);
    assert_eq!(processing[0].id, first.id);
    assert!(matches!(
      m.list("nope", None).await,
      Err(TransitionError::UnknownCollection(_))
    ));
  }

  // ── Promotion ───────────────────────────────────────────────────────────

  #[tokio::test]
  async fn promote_threads_the_application_id() {
    let (p, a) = (MemoryStore::new(), MemoryStore::new());
    let doc = user_loan(&p).await;

    let approved = manager(&p, &a).promote(doc.id, "loan_applications").await.unwrap();
    assert_eq!(approved.application_id, Some(doc.id));
    assert_eq!(approved.user_id.as_deref(), Some("u1"));
    assert_eq!(approved.status, Status::Approved);
    assert_eq!(approved.form_data, doc.form_data);
    assert_eq!(a.dump("approved_loans"), vec![approved]);
    assert_eq!(p.dump("loan_applications")[0].status, Status::Approved);
  }

  #[tokio::test]
  async fn promote_rejects_kinds_without_a_family() {
    let (p, a) = (MemoryStore::new(), MemoryStore::new());
    let doc = p
      .create("admin_loans", NewDocument::pending(Kind::Loan, None, FormData::new()))
      .await
      .unwrap();
    let err = manager(&p, &a).promote(doc.id, "admin_loans").await.unwrap_err();
    assert!(matches!(err, TransitionError::NotPromotable(Kind::Loan)));
    assert!(a.dump("approved_loans").is_empty());
  }

  #[tokio::test]
  async fn failed_promotion_leaves_pending_untouched() {
    let (p, a) = (MemoryStore::new(), MemoryStore::new());
    let doc = user_loan(&p).await;
    a.deny_writes("approved_loans");
    let err = manager(&p, &a).promote(doc.id, "loan_applications").await.unwrap_err();
    assert!(matches!(err, TransitionError::Forbidden));
    assert_eq!(p.dump("loan_applications")[0].status, Status::Pending);
  }

  #[tokio::test]
  async fn promoting_twice_keeps_one_approved_record() {
    let (p, a) = (MemoryStore::new(), MemoryStore::new());
    let doc = user_loan(&p).await;
    let m = manager(&p, &a);

    let first = m.promote(doc.id, "loan_applications").await.unwrap();
    let promoted_at = p.dump("loan_applications")[0].updated_at;
    let second = m.promote(doc.id, "loan_applications").await.unwrap();

    assert_eq!(second, first);
    assert_eq!(a.dump("approved_loans").len(), 1);
    // No second status write on the already approved pending record.
    assert_eq!(p.dump("loan_applications")[0].updated_at, promoted_at);

    let collapsed = Aggregator::new(Arc::new(p.clone()), Arc::new(a.clone()))
      .with_scope(AggregateScope::only(finmart_core::kind::Family::Loan))
      .collapse_promoted(true)
      .snapshot("u1")
      .await;
    assert_eq!(collapsed.applications.len(), 1);
    assert_eq!(collapsed.applications[0].source, Source::Approved);
  }

  #[tokio::test]
  async fn retry_after_denied_pending_update_completes_without_duplicating() {
    let (p, a) = (MemoryStore::new(), MemoryStore::new());
    let doc = user_loan(&p).await;
    let m = manager(&p, &a);

    p.deny_writes("loan_applications");
    let err = m.promote(doc.id, "loan_applications").await.unwrap_err();
    assert!(matches!(err, TransitionError::Forbidden));
    assert_eq!(p.dump("loan_applications")[0].status, Status::Pending);
    let written = a.dump("approved_loans");
    assert_eq!(written.len(), 1);

    p.allow_writes("loan_applications");
    let approved = m.promote(doc.id, "loan_applications").await.unwrap();
    assert_eq!(approved.id, written[0].id);
    assert_eq!(a.dump("approved_loans").len(), 1);
    assert_eq!(p.dump("loan_applications")[0].status, Status::Approved);
  }

  #[tokio::test]
  async fn terminal_guard_refuses_promoting_a_rejected_record() {
    let (p, a) = (MemoryStore::new(), MemoryStore::new());
    let doc = user_loan(&p).await;
    let m = manager(&p, &a).with_terminal_guard(true);
    m.transition(doc.id, "loan_applications", "rejected").await.unwrap();

    let err = m.promote(doc.id, "loan_applications").await.unwrap_err();
    assert!(matches!(err, TransitionError::Terminal(id) if id == doc.id));
    assert!(a.dump("approved_loans").is_empty());
  }

  // ── Reflection into the aggregate ───────────────────────────────────────

  #[tokio::test]
  async fn transitions_reach_an_open_aggregate() {
    let (p, a) = (MemoryStore::new(), MemoryStore::new());
    let doc = user_loan(&p).await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let _sub = Aggregator::new(Arc::new(p.clone()), Arc::new(a.clone()))
      .with_scope(AggregateScope::only(finmart_core::kind::Family::Loan))
      .subscribe("u1", move |list| {
        let _ = tx.send(list);
      })
      .await;

    manager(&p, &a).promote(doc.id, "loan_applications").await.unwrap();

    let settled = tokio::time::timeout(Duration::from_secs(2), async {
      loop {
        let list: Vec<_> = rx.recv().await.unwrap();
        let pending_approved = list
          .iter()
          .any(|e| e.source == Source::Pending && e.status == Status::Approved);
        let has_approved = list.iter().any(|e| e.source == Source::Approved);
        if pending_approved && has_approved {
          return list;
        }
      }
    })
    .await
    .expect("aggregate reflects promotion");
    assert_eq!(settled.len(), 2);
  }
}
