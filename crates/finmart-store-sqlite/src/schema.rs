//! SQL schema for the finmart SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

-- One row per document. Documents never move between collections.
CREATE TABLE IF NOT EXISTS documents (
    collection      TEXT NOT NULL,
    id              TEXT NOT NULL,
    kind            TEXT NOT NULL,   -- wire name of the submission kind
    user_id         TEXT,            -- NULL for anonymous kinds
    form_data       TEXT NOT NULL,   -- JSON object
    status          TEXT NOT NULL DEFAULT 'pending',
    application_id  TEXT,            -- pending submission this was promoted from
    created_at      TEXT NOT NULL,   -- RFC 3339 UTC, microseconds; server-assigned
    updated_at      TEXT NOT NULL,
    PRIMARY KEY (collection, id),
    CHECK (status IN ('pending', 'processing', 'approved', 'rejected'))
);

CREATE INDEX IF NOT EXISTS documents_owner_idx
    ON documents(collection, user_id, created_at);
CREATE INDEX IF NOT EXISTS documents_status_idx
    ON documents(collection, status);

PRAGMA user_version = 1;
";
