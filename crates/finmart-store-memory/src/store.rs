//! [`MemoryStore`] — the in-process implementation of [`StoreAdapter`].

use std::{
  collections::{HashMap, HashSet},
  sync::{
    Arc, Mutex, MutexGuard, PoisonError,
    atomic::{AtomicUsize, Ordering},
  },
};

use finmart_core::{
  clock::ServerClock,
  document::{Document, NewDocument, Status},
  live::{LiveQuery, Watchers},
  store::{Filter, StoreAdapter, sort_newest_first},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A realtime document store held entirely in memory.
///
/// Cloning is cheap — all clones share the same collections and live queries.
#[derive(Clone, Default)]
pub struct MemoryStore {
  inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
  state:    Mutex<State>,
  watchers: Watchers<Error>,
  clock:    ServerClock,
  calls:    AtomicUsize,
}

#[derive(Default)]
struct State {
  collections:    HashMap<String, Vec<Document>>,
  denied:         HashSet<String>,
  failures_armed: usize,
}

impl State {
  fn snapshot(&self, collection: &str, filter: &Filter) -> Vec<Document> {
    let mut docs: Vec<Document> = self
      .collections
      .get(collection)
      .map(|docs| docs.iter().filter(|d| filter.matches(d)).cloned().collect())
      .unwrap_or_default();
    sort_newest_first(&mut docs);
    docs
  }
}

impl MemoryStore {
  pub fn new() -> Self { Self::default() }

  fn lock(&self) -> MutexGuard<'_, State> {
    self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Count the call and consume one armed failure, if any.
  fn enter(&self, state: &mut State) -> Result<()> {
    self.inner.calls.fetch_add(1, Ordering::SeqCst);
    if state.failures_armed > 0 {
      state.failures_armed -= 1;
      return Err(Error::Unavailable);
    }
    Ok(())
  }

  fn check_writable(state: &State, collection: &str) -> Result<()> {
    if state.denied.contains(collection) {
      return Err(Error::PermissionDenied(collection.to_owned()));
    }
    Ok(())
  }

  /// Push the current snapshot to every live query on `collection`.
  /// Must be called with the state lock held so emissions follow commit order.
  fn fan_out(&self, state: &State, collection: &str) {
    for feed in self.inner.watchers.feeds_for(collection) {
      feed.send(Ok(state.snapshot(collection, feed.filter())));
    }
  }

  // ── Test and policy controls ────────────────────────────────────────────

  /// Reject all further writes to `collection` as an access-policy denial.
  pub fn deny_writes(&self, collection: &str) {
    self.lock().denied.insert(collection.to_owned());
  }

  /// Lift a denial set by [`MemoryStore::deny_writes`].
  pub fn allow_writes(&self, collection: &str) {
    self.lock().denied.remove(collection);
  }

  /// Fail the next `n` adapter calls with [`Error::Unavailable`].
  pub fn fail_next(&self, n: usize) { self.lock().failures_armed = n; }

  /// Deliver an [`Error::Unavailable`] to every live query on `collection`
  /// without closing them.
  pub fn break_live_queries(&self, collection: &str) {
    let _state = self.lock();
    for feed in self.inner.watchers.feeds_for(collection) {
      feed.send(Err(Error::Unavailable));
    }
  }

  /// Total adapter calls made against this store (including failed ones).
  pub fn calls(&self) -> usize { self.inner.calls.load(Ordering::SeqCst) }

  /// Number of attached live queries.
  pub fn live_queries(&self) -> usize { self.inner.watchers.len() }

  /// Every document in `collection`, in insertion order. Not counted as an
  /// adapter call.
  pub fn dump(&self, collection: &str) -> Vec<Document> {
    self.lock().collections.get(collection).cloned().unwrap_or_default()
  }
}

// ─── StoreAdapter impl ───────────────────────────────────────────────────────

impl StoreAdapter for MemoryStore {
  type Error = Error;

  async fn create(&self, collection: &str, doc: NewDocument) -> Result<Document> {
    let mut state = self.lock();
    self.enter(&mut state)?;
    Self::check_writable(&state, collection)?;

    let now = self.inner.clock.now();
    let doc = doc.into_document(Uuid::new_v4(), now);
    state
      .collections
      .entry(collection.to_owned())
      .or_default()
      .push(doc.clone());
    tracing::debug!(collection, id = %doc.id, "document created");

    self.fan_out(&state, collection);
    Ok(doc)
  }

  async fn get(&self, collection: &str, id: Uuid) -> Result<Option<Document>> {
    let mut state = self.lock();
    self.enter(&mut state)?;
    Ok(
      state
        .collections
        .get(collection)
        .and_then(|docs| docs.iter().find(|d| d.id == id))
        .cloned(),
    )
  }

  async fn query(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>> {
    let mut state = self.lock();
    self.enter(&mut state)?;
    Ok(state.snapshot(collection, filter))
  }

  async fn subscribe(&self, collection: &str, filter: Filter) -> Result<LiveQuery<Error>> {
    let mut state = self.lock();
    self.enter(&mut state)?;

    let initial = state.snapshot(collection, &filter);
    let (query, feed) = self.inner.watchers.open(collection, filter);
    feed.send(Ok(initial));
    Ok(query)
  }

  async fn update_status(
    &self,
    collection: &str,
    id: Uuid,
    status: Status,
  ) -> Result<Document> {
    let mut state = self.lock();
    self.enter(&mut state)?;
    Self::check_writable(&state, collection)?;

    let now = self.inner.clock.now();
    let doc = state
      .collections
      .get_mut(collection)
      .and_then(|docs| docs.iter_mut().find(|d| d.id == id))
      .ok_or_else(|| Error::NotFound { collection: collection.to_owned(), id })?;
    doc.status = status;
    doc.updated_at = now;
    let doc = doc.clone();
    tracing::debug!(collection, %id, status = %status, "status updated");

    self.fan_out(&state, collection);
    Ok(doc)
  }
}
