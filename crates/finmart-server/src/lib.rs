//! Composition root for the finmart HTTP server.
//!
//! Wires a pending and an approved store into the intake services, mounts
//! the end-user and admin APIs, and guards the admin routes with HTTP Basic
//! auth.

pub mod auth;
pub mod error;

pub use error::Error;

use std::{path::PathBuf, sync::Arc, time::Duration};

use axum::{Router, middleware};
use finmart_api::{ApiState, admin_router, api_router};
use finmart_core::store::StoreAdapter;
use finmart_intake::writer::RetryPolicy;
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use auth::{AuthConfig, require_admin};

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `FINMART_*` environment variables.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:                 String,
  #[serde(default = "default_port")]
  pub port:                 u16,
  /// SQLite file backing the approved store.
  #[serde(default = "default_store_path")]
  pub store_path:           PathBuf,
  #[serde(default = "default_admin_username")]
  pub admin_username:       String,
  /// argon2 PHC string; generate with `--hash-password`.
  #[serde(default)]
  pub admin_password_hash:  String,
  #[serde(default = "default_retry_attempts")]
  pub write_retry_attempts: u32,
  #[serde(default = "default_retry_base_ms")]
  pub write_retry_base_ms:  u64,
  #[serde(default)]
  pub terminal_guard:       bool,
  /// Hide pending entries once they have an approved counterpart.
  #[serde(default)]
  pub collapse_promoted:    bool,
}

fn default_host() -> String { "127.0.0.1".to_string() }
fn default_port() -> u16 { 8080 }
fn default_store_path() -> PathBuf { PathBuf::from("~/.local/share/finmart/approved.db") }
fn default_admin_username() -> String { "admin".to_string() }
fn default_retry_attempts() -> u32 { 3 }
fn default_retry_base_ms() -> u64 { 200 }

impl ServerConfig {
  pub fn retry_policy(&self) -> RetryPolicy {
    RetryPolicy {
      max_attempts: self.write_retry_attempts.max(1),
      base_delay:   Duration::from_millis(self.write_retry_base_ms),
    }
  }

  pub fn auth(&self) -> AuthConfig {
    AuthConfig {
      username:      self.admin_username.clone(),
      password_hash: self.admin_password_hash.clone(),
    }
  }
}

// ─── Application state ────────────────────────────────────────────────────────

/// Everything the router needs.
pub struct AppState<P, A> {
  pub api:  Arc<ApiState<P, A>>,
  pub auth: Arc<AuthConfig>,
}

impl<P: StoreAdapter, A: StoreAdapter> AppState<P, A> {
  pub fn new(pending: Arc<P>, approved: Arc<A>, config: &ServerConfig) -> Self {
    let api = ApiState::new(pending, approved)
      .with_retry(config.retry_policy())
      .with_terminal_guard(config.terminal_guard)
      .collapse_promoted(config.collapse_promoted);
    Self { api: Arc::new(api), auth: Arc::new(config.auth()) }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the full server [`Router`]: public API plus auth-guarded admin API.
pub fn router<P, A>(state: AppState<P, A>) -> Router
where
  P: StoreAdapter,
  A: StoreAdapter,
{
  let admin = admin_router(Arc::clone(&state.api))
    .layer(middleware::from_fn_with_state(state.auth, require_admin));

  Router::new()
    .merge(api_router(state.api))
    .merge(admin)
    .layer(TraceLayer::new_for_http())
}
