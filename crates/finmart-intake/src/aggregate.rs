//! The realtime aggregator: one merged, ordered view over the pending and
//! approved stores for a single owner.
//!
//! Each underlying live query is forwarded by its own task into a single
//! channel. One driver task per subscription owns the latest snapshot from
//! every source and is the only place recomputation happens, so emissions are
//! serialised and never re-entrant.
//!
//! Pending and approved records share no key. A submission that has been
//! promoted appears twice (once per source) unless `collapse_promoted` is
//! set, in which case pending entries referenced by an approved record's
//! `application_id` are hidden.

use std::{
  cell::Cell,
  collections::HashSet,
  sync::{
    Arc, Mutex, MutexGuard, PoisonError,
    atomic::{AtomicBool, Ordering},
  },
};

use chrono::{DateTime, Utc};
use finmart_core::{
  document::{Document, Status},
  kind::{Family, Kind},
  live::Snapshot,
  store::{Fault, Filter, StoreAdapter, StoreFailure},
};
use serde::Serialize;
use tokio::{sync::mpsc, task::JoinHandle};
use uuid::Uuid;

/// Form fields consulted, in order, for [`AggregatedApplication::display_amount`].
const AMOUNT_FIELDS: &[&str] = &[
  "amount",
  "loanAmount",
  "loan_amount",
  "coverageAmount",
  "coverage_amount",
  "sumInsured",
  "premium",
];

// ─── Output types ────────────────────────────────────────────────────────────

/// Which store an aggregated entry came from. Part of an entry's identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
  Pending,
  Approved,
}

/// One entry of the merged view, normalised across both stores.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedApplication {
  pub id:             Uuid,
  #[serde(rename = "type")]
  pub kind:           Kind,
  pub display_amount: Option<String>,
  pub status:         Status,
  pub created_at:     DateTime<Utc>,
  pub source:         Source,
  /// Approved entries only: the pending submission they were promoted from.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub application_id: Option<Uuid>,
}

impl AggregatedApplication {
  fn from_document(doc: Document, source: Source) -> Self {
    Self {
      display_amount: display_amount(&doc),
      id: doc.id,
      kind: doc.kind,
      status: doc.status,
      created_at: doc.created_at,
      source,
      application_id: doc.application_id,
    }
  }
}

fn display_amount(doc: &Document) -> Option<String> {
  AMOUNT_FIELDS.iter().find_map(|field| match doc.form_data.get(*field)? {
    serde_json::Value::Number(n) => Some(n.to_string()),
    serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_owned()),
    _ => None,
  })
}

/// A live query that failed. Delivered to the optional error callback; the
/// remaining sources keep running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceError {
  pub source:     Source,
  pub collection: &'static str,
  pub fault:      Fault,
  /// Operator-facing description; not meant for end users.
  pub message:    String,
}

impl SourceError {
  fn new<E: StoreFailure>(spec: &SourceSpec, err: &E) -> Self {
    Self {
      source:     spec.source,
      collection: spec.collection,
      fault:      err.fault(),
      message:    err.to_string(),
    }
  }
}

/// Result of [`Aggregator::snapshot`].
#[derive(Debug, Clone, Default)]
pub struct AggregateSnapshot {
  pub applications: Vec<AggregatedApplication>,
  pub errors:       Vec<SourceError>,
}

// ─── Configuration ───────────────────────────────────────────────────────────

/// Which kind-families an aggregator watches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateScope {
  families: Vec<Family>,
}

impl Default for AggregateScope {
  fn default() -> Self { Self { families: vec![Family::Loan, Family::Insurance] } }
}

impl AggregateScope {
  pub fn only(family: Family) -> Self { Self { families: vec![family] } }

  pub fn families(&self) -> &[Family] { &self.families }
}

#[derive(Debug, Clone)]
struct SourceSpec {
  source:     Source,
  collection: &'static str,
  filter:     Filter,
}

// ─── Aggregator ──────────────────────────────────────────────────────────────

type SnapshotFn = Box<dyn FnMut(Vec<AggregatedApplication>) + Send>;
type ErrorFn = Box<dyn FnMut(SourceError) + Send>;

struct Delivery {
  on_snapshot: SnapshotFn,
  on_error:    Option<ErrorFn>,
}

thread_local! {
  /// Address of the slot whose callback is running on this thread, or 0.
  static DELIVERING: Cell<usize> = const { Cell::new(0) };
}

/// Callback slot shared by a [`Subscription`] and its driver task.
struct Slot {
  delivery: Mutex<Option<Delivery>>,
  closed:   AtomicBool,
}

/// Restores the previous [`DELIVERING`] value, even on unwind.
struct Restore(usize);

impl Drop for Restore {
  fn drop(&mut self) { DELIVERING.set(self.0); }
}

impl Slot {
  fn id(&self) -> usize { self as *const Self as usize }

  /// Run `f` with this slot marked as delivering on the current thread.
  fn deliver(&self, f: impl FnOnce()) {
    let _restore = Restore(DELIVERING.replace(self.id()));
    f();
  }

  fn delivering(&self) -> bool { DELIVERING.get() == self.id() }

  fn is_closed(&self) -> bool { self.closed.load(Ordering::SeqCst) }
}

/// Merges the pending store `P` and approved store `A` per owner.
pub struct Aggregator<P, A> {
  pending:           Arc<P>,
  approved:          Arc<A>,
  scope:             AggregateScope,
  collapse_promoted: bool,
}

impl<P: StoreAdapter, A: StoreAdapter> Aggregator<P, A> {
  pub fn new(pending: Arc<P>, approved: Arc<A>) -> Self {
    Self {
      pending,
      approved,
      scope: AggregateScope::default(),
      collapse_promoted: false,
    }
  }

  pub fn with_scope(mut self, scope: AggregateScope) -> Self {
    self.scope = scope;
    self
  }

  /// Hide pending entries that an approved entry names as its origin.
  pub fn collapse_promoted(mut self, collapse: bool) -> Self {
    self.collapse_promoted = collapse;
    self
  }

  /// One live query per (family, store): pending filtered to the family's
  /// kind, approved filtered to the owner only.
  fn sources(&self, owner: &str) -> Vec<SourceSpec> {
    self
      .scope
      .families()
      .iter()
      .flat_map(|family| {
        [
          SourceSpec {
            source:     Source::Pending,
            collection: family.pending_collection(),
            filter:     Filter::owner(owner).with_kind(family.kind()),
          },
          SourceSpec {
            source:     Source::Approved,
            collection: family.approved_collection(),
            filter:     Filter::owner(owner),
          },
        ]
      })
      .collect()
  }

  /// Watch `owner`'s applications. `on_snapshot` receives the complete
  /// merged list, newest first, every time any source changes.
  ///
  /// See [`Aggregator::subscribe_with_errors`].
  pub async fn subscribe<F>(&self, owner: &str, on_snapshot: F) -> Subscription
  where
    F: FnMut(Vec<AggregatedApplication>) + Send + 'static,
  {
    self.start(owner, Box::new(on_snapshot), None).await
  }

  /// As [`Aggregator::subscribe`], additionally reporting each failing
  /// source to `on_error`. A failing source keeps its last good snapshot in
  /// the merged view; the other sources are unaffected.
  pub async fn subscribe_with_errors<F, G>(
    &self,
    owner: &str,
    on_snapshot: F,
    on_error: G,
  ) -> Subscription
  where
    F: FnMut(Vec<AggregatedApplication>) + Send + 'static,
    G: FnMut(SourceError) + Send + 'static,
  {
    self
      .start(owner, Box::new(on_snapshot), Some(Box::new(on_error)))
      .await
  }

  async fn start(
    &self,
    owner: &str,
    on_snapshot: SnapshotFn,
    on_error: Option<ErrorFn>,
  ) -> Subscription {
    let specs = self.sources(owner);
    let (tx, rx) = mpsc::unbounded_channel();
    let mut tasks = Vec::with_capacity(specs.len() + 1);

    for (slot, spec) in specs.iter().enumerate() {
      let forwarder = match spec.source {
        Source::Pending => forward(&*self.pending, spec, slot, tx.clone()).await,
        Source::Approved => forward(&*self.approved, spec, slot, tx.clone()).await,
      };
      tasks.extend(forwarder);
    }
    drop(tx);

    let slot = Arc::new(Slot {
      delivery: Mutex::new(Some(Delivery { on_snapshot, on_error })),
      closed:   AtomicBool::new(false),
    });
    let sources = specs.iter().map(|s| s.source).collect();
    tasks.push(tokio::spawn(drive(
      rx,
      sources,
      self.collapse_promoted,
      Arc::clone(&slot),
    )));

    tracing::debug!(owner, sources = specs.len(), "aggregate subscription opened");
    Subscription { slot, tasks: Mutex::new(tasks) }
  }

  /// One-shot merged view, with the same normalisation and ordering as the
  /// live path. Failing sources are reported alongside the partial result.
  pub async fn snapshot(&self, owner: &str) -> AggregateSnapshot {
    let mut out = AggregateSnapshot::default();
    let mut entries = Vec::new();

    for spec in self.sources(owner) {
      let result = match spec.source {
        Source::Pending => self
          .pending
          .query(spec.collection, &spec.filter)
          .await
          .map_err(|e| SourceError::new(&spec, &e)),
        Source::Approved => self
          .approved
          .query(spec.collection, &spec.filter)
          .await
          .map_err(|e| SourceError::new(&spec, &e)),
      };
      match result {
        Ok(docs) => entries.extend(
          docs
            .into_iter()
            .map(|d| AggregatedApplication::from_document(d, spec.source)),
        ),
        Err(err) => {
          tracing::warn!(collection = err.collection, error = %err.message, "aggregate source failed");
          out.errors.push(err);
        }
      }
    }

    out.applications = merge(entries, self.collapse_promoted);
    out
  }
}

/// Open one live query and forward its emissions, tagged with `slot`.
async fn forward<S: StoreAdapter>(
  store: &S,
  spec: &SourceSpec,
  slot: usize,
  tx: mpsc::UnboundedSender<(usize, Result<Snapshot, SourceError>)>,
) -> Option<JoinHandle<()>> {
  match store.subscribe(spec.collection, spec.filter.clone()).await {
    Ok(mut live) => {
      let spec = spec.clone();
      Some(tokio::spawn(async move {
        while let Some(item) = live.next().await {
          let item = item.map_err(|e| SourceError::new(&spec, &e));
          if tx.send((slot, item)).is_err() {
            break;
          }
        }
      }))
    }
    Err(e) => {
      let _ = tx.send((slot, Err(SourceError::new(spec, &e))));
      None
    }
  }
}

/// The single writer for one subscription.
async fn drive(
  mut rx: mpsc::UnboundedReceiver<(usize, Result<Snapshot, SourceError>)>,
  sources: Vec<Source>,
  collapse_promoted: bool,
  slot: Arc<Slot>,
) {
  let mut latest: Vec<Option<Vec<AggregatedApplication>>> = vec![None; sources.len()];

  while let Some((idx, item)) = rx.recv().await {
    match item {
      Ok(docs) => {
        latest[idx] = Some(
          docs
            .into_iter()
            .map(|d| AggregatedApplication::from_document(d, sources[idx]))
            .collect(),
        );
        let merged = merge(latest.iter().flatten().flatten().cloned(), collapse_promoted);

        let mut guard = lock(&slot.delivery);
        let Some(target) = guard.as_mut() else { break };
        slot.deliver(|| (target.on_snapshot)(merged));
        if slot.is_closed() {
          *guard = None;
          break;
        }
      }
      Err(err) => {
        tracing::warn!(
          collection = err.collection,
          fault = ?err.fault,
          error = %err.message,
          "aggregate source failed"
        );
        let mut guard = lock(&slot.delivery);
        let Some(target) = guard.as_mut() else { break };
        if let Some(on_error) = target.on_error.as_mut() {
          slot.deliver(|| on_error(err));
        }
        if slot.is_closed() {
          *guard = None;
          break;
        }
      }
    }
  }
}

fn merge(
  entries: impl IntoIterator<Item = AggregatedApplication>,
  collapse_promoted: bool,
) -> Vec<AggregatedApplication> {
  let mut entries: Vec<_> = entries.into_iter().collect();

  if collapse_promoted {
    let promoted: HashSet<Uuid> = entries
      .iter()
      .filter(|e| e.source == Source::Approved)
      .filter_map(|e| e.application_id)
      .collect();
    entries.retain(|e| e.source == Source::Approved || !promoted.contains(&e.id));
  }

  entries.sort_by(|a, b| {
    b.created_at
      .cmp(&a.created_at)
      .then_with(|| a.id.cmp(&b.id))
  });
  entries
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
  m.lock().unwrap_or_else(PoisonError::into_inner)
}

// ─── Subscription handle ─────────────────────────────────────────────────────

/// Handle on a live aggregate. Dropping it unsubscribes.
pub struct Subscription {
  slot:  Arc<Slot>,
  tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Subscription {
  /// Detach every underlying live query.
  ///
  /// Once this returns the callbacks are never invoked again: a callback
  /// already running on another thread finishes first, and nothing queued
  /// is delivered. Calling it again is a no-op. Called from inside one of
  /// this subscription's own callbacks, the close takes effect as soon as
  /// that callback returns.
  pub fn unsubscribe(&self) {
    let was_active = !self.slot.closed.swap(true, Ordering::SeqCst);
    // The driver holds the slot while a callback runs; it drops the
    // delivery itself once it sees `closed`.
    if !self.slot.delivering() {
      lock(&self.slot.delivery).take();
    }
    for task in lock(&self.tasks).drain(..) {
      task.abort();
    }
    if was_active {
      tracing::debug!("aggregate subscription closed");
    }
  }

  pub fn is_active(&self) -> bool { !self.slot.is_closed() }
}

impl Drop for Subscription {
  fn drop(&mut self) { self.unsubscribe(); }
}
