//! [`SqliteStore`] — the SQLite implementation of [`StoreAdapter`].

use std::{collections::HashSet, path::Path, sync::Arc};

use finmart_core::{
  clock::ServerClock,
  document::{Document, NewDocument, Status},
  live::{LiveQuery, Watchers},
  store::{Filter, StoreAdapter, sort_newest_first},
};
use rusqlite::OptionalExtension as _;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{COLUMNS, RawDocument, encode_dt, encode_form, encode_uuid},
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A document store backed by a single SQLite file.
///
/// Cloning is cheap — the connection, clock and live-query registry are all
/// shared.
#[derive(Clone)]
pub struct SqliteStore {
  conn:     tokio_rusqlite::Connection,
  shared:   Arc<Shared>,
  /// Collections whose writes are rejected by access policy.
  denied:   Arc<HashSet<String>>,
}

struct Shared {
  clock:    ServerClock,
  watchers: Watchers<Error>,
  /// Serialises commit + fan-out so every live query sees snapshots in
  /// commit order.
  commit:   Mutex<()>,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Self::init(conn).await
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Self::init(conn).await
  }

  async fn init(conn: tokio_rusqlite::Connection) -> Result<Self> {
    conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(Self {
      conn,
      shared: Arc::new(Shared {
        clock:    ServerClock::default(),
        watchers: Watchers::default(),
        commit:   Mutex::new(()),
      }),
      denied: Arc::new(HashSet::new()),
    })
  }

  /// Reject writes to `collection` as an access-policy denial.
  pub fn deny_writes(mut self, collection: &str) -> Self {
    Arc::make_mut(&mut self.denied).insert(collection.to_owned());
    self
  }

  fn check_writable(&self, collection: &str) -> Result<()> {
    if self.denied.contains(collection) {
      return Err(Error::PermissionDenied(collection.to_owned()));
    }
    Ok(())
  }

  async fn select(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>> {
    let collection = collection.to_owned();
    let user_id    = filter.user_id.clone();
    let kind       = filter.kind.map(|k| k.as_str().to_owned());
    let status     = filter.status.map(|s| s.as_str().to_owned());
    let app_id     = filter.application_id.map(encode_uuid);

    let raws: Vec<RawDocument> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {COLUMNS} FROM documents
           WHERE collection = ?1
             AND (?2 IS NULL OR user_id = ?2)
             AND (?3 IS NULL OR kind = ?3)
             AND (?4 IS NULL OR status = ?4)
             AND (?5 IS NULL OR application_id = ?5)
           ORDER BY created_at DESC, id ASC"
        ))?;
        let rows = stmt
          .query_map(
            rusqlite::params![collection, user_id, kind, status, app_id],
            RawDocument::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    let mut docs = raws
      .into_iter()
      .map(RawDocument::into_document)
      .collect::<Result<Vec<_>>>()?;
    sort_newest_first(&mut docs);
    Ok(docs)
  }

  /// Re-run every live query on `collection` and push the results. Callers
  /// hold the commit lock.
  async fn fan_out(&self, collection: &str) {
    for feed in self.shared.watchers.feeds_for(collection) {
      let snapshot = self.select(collection, feed.filter()).await;
      if let Err(e) = &snapshot {
        tracing::warn!(collection, error = %e, "live query refresh failed");
      }
      feed.send(snapshot);
    }
  }
}

// ─── StoreAdapter impl ───────────────────────────────────────────────────────

impl StoreAdapter for SqliteStore {
  type Error = Error;

  async fn create(&self, collection: &str, doc: NewDocument) -> Result<Document> {
    self.check_writable(collection)?;
    let _commit = self.shared.commit.lock().await;

    let doc = doc.into_document(Uuid::new_v4(), self.shared.clock.now());

    let collection_str = collection.to_owned();
    let id_str         = encode_uuid(doc.id);
    let kind_str       = doc.kind.as_str().to_owned();
    let user_id        = doc.user_id.clone();
    let form_str       = encode_form(&doc.form_data)?;
    let status_str     = doc.status.as_str().to_owned();
    let app_id_str     = doc.application_id.map(encode_uuid);
    let created_str    = encode_dt(doc.created_at);
    let updated_str    = encode_dt(doc.updated_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO documents (
             collection, id, kind, user_id, form_data,
             status, application_id, created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
          rusqlite::params![
            collection_str,
            id_str,
            kind_str,
            user_id,
            form_str,
            status_str,
            app_id_str,
            created_str,
            updated_str,
          ],
        )?;
        Ok(())
      })
      .await?;
    tracing::debug!(collection, id = %doc.id, "document created");

    self.fan_out(collection).await;
    Ok(doc)
  }

  async fn get(&self, collection: &str, id: Uuid) -> Result<Option<Document>> {
    let collection = collection.to_owned();
    let id_str     = encode_uuid(id);

    let raw: Option<RawDocument> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {COLUMNS} FROM documents WHERE collection = ?1 AND id = ?2"
              ),
              rusqlite::params![collection, id_str],
              RawDocument::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawDocument::into_document).transpose()
  }

  async fn query(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>> {
    self.select(collection, filter).await
  }

  async fn subscribe(&self, collection: &str, filter: Filter) -> Result<LiveQuery<Error>> {
    let _commit = self.shared.commit.lock().await;

    let initial = self.select(collection, &filter).await?;
    let (query, feed) = self.shared.watchers.open(collection, filter);
    feed.send(Ok(initial));
    Ok(query)
  }

  async fn update_status(
    &self,
    collection: &str,
    id: Uuid,
    status: Status,
  ) -> Result<Document> {
    self.check_writable(collection)?;
    let _commit = self.shared.commit.lock().await;

    let collection_str = collection.to_owned();
    let id_str         = encode_uuid(id);
    let status_str     = status.as_str().to_owned();
    let updated_str    = encode_dt(self.shared.clock.now());

    let raw: Option<RawDocument> = self
      .conn
      .call(move |conn| {
        let changed = conn.execute(
          "UPDATE documents SET status = ?1, updated_at = ?2
           WHERE collection = ?3 AND id = ?4",
          rusqlite::params![status_str, updated_str, collection_str, id_str],
        )?;
        if changed == 0 {
          return Ok(None);
        }
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {COLUMNS} FROM documents WHERE collection = ?1 AND id = ?2"
              ),
              rusqlite::params![collection_str, id_str],
              RawDocument::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    let doc = raw
      .ok_or_else(|| Error::NotFound { collection: collection.to_owned(), id })?
      .into_document()?;
    tracing::debug!(collection, %id, status = %status, "status updated");

    self.fan_out(collection).await;
    Ok(doc)
  }
}
