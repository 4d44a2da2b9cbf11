//! Live-query plumbing shared by store backends.
//!
//! A [`LiveQuery`] is a cancelable stream of complete snapshots. Backends keep
//! a [`Watchers`] registry and push a fresh snapshot to every interested
//! [`Feed`] after each committed change. Dropping the `LiveQuery` closes its
//! channel; the backend prunes the feed on the next fan-out.

use std::sync::{Mutex, PoisonError};

use tokio::sync::mpsc;

use crate::{document::Document, store::Filter};

/// One emission: the full matching result set, newest first.
pub type Snapshot = Vec<Document>;

// ─── Consumer side ───────────────────────────────────────────────────────────

/// A cancelable stream of snapshots for one `(collection, filter)` pair.
pub struct LiveQuery<E> {
  rx: mpsc::UnboundedReceiver<Result<Snapshot, E>>,
}

impl<E> LiveQuery<E> {
  /// Wait for the next snapshot. Returns `None` once the backend has gone
  /// away; live queries never complete otherwise.
  pub async fn next(&mut self) -> Option<Result<Snapshot, E>> { self.rx.recv().await }

  /// Stop receiving. Equivalent to dropping the query.
  pub fn cancel(mut self) { self.rx.close(); }
}

impl<E> std::fmt::Debug for LiveQuery<E> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("LiveQuery").finish_non_exhaustive()
  }
}

// ─── Producer side ───────────────────────────────────────────────────────────

/// The backend's handle on one live query.
pub struct Feed<E> {
  collection: String,
  filter:     Filter,
  tx:         mpsc::UnboundedSender<Result<Snapshot, E>>,
}

impl<E> Clone for Feed<E> {
  fn clone(&self) -> Self {
    Self {
      collection: self.collection.clone(),
      filter:     self.filter.clone(),
      tx:         self.tx.clone(),
    }
  }
}

impl<E> Feed<E> {
  pub fn collection(&self) -> &str { &self.collection }

  pub fn filter(&self) -> &Filter { &self.filter }

  /// Push one emission. Returns `false` if the consumer has detached.
  pub fn send(&self, item: Result<Snapshot, E>) -> bool { self.tx.send(item).is_ok() }

  pub fn is_closed(&self) -> bool { self.tx.is_closed() }
}

/// Registry of open live queries for one backend.
pub struct Watchers<E> {
  feeds: Mutex<Vec<Feed<E>>>,
}

impl<E> Default for Watchers<E> {
  fn default() -> Self { Self { feeds: Mutex::new(Vec::new()) } }
}

impl<E> Watchers<E> {
  /// Register a new live query and return both ends.
  pub fn open(&self, collection: &str, filter: Filter) -> (LiveQuery<E>, Feed<E>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let feed = Feed { collection: collection.to_owned(), filter, tx };
    self
      .feeds
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .push(feed.clone());
    (LiveQuery { rx }, feed)
  }

  /// Feeds watching `collection`, pruning any whose consumer has detached.
  pub fn feeds_for(&self, collection: &str) -> Vec<Feed<E>> {
    let mut feeds = self.feeds.lock().unwrap_or_else(PoisonError::into_inner);
    feeds.retain(|f| !f.is_closed());
    feeds
      .iter()
      .filter(|f| f.collection == collection)
      .cloned()
      .collect()
  }

  /// Number of attached live queries.
  pub fn len(&self) -> usize {
    let mut feeds = self.feeds.lock().unwrap_or_else(PoisonError::into_inner);
    feeds.retain(|f| !f.is_closed());
    feeds.len()
  }

  pub fn is_empty(&self) -> bool { self.len() == 0 }
}
