//! Async HTTP client wrapping the finmart JSON API.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use finmart_core::document::{Document, Status};
use reqwest::{Client, Response};
use serde::Deserialize;
use uuid::Uuid;

/// Connection settings for the finmart API.
#[derive(Debug, Clone)]
pub struct ApiConfig {
  pub base_url: String,
  pub username: String,
  pub password: String,
}

/// Where the server stored a submission.
#[derive(Debug, Deserialize)]
pub struct Receipt {
  pub id:         Uuid,
  pub collection: String,
}

/// One row of `GET /applications`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
  pub id:             Uuid,
  #[serde(rename = "type")]
  pub kind:           String,
  pub display_amount: Option<String>,
  pub status:         Status,
  pub created_at:     DateTime<Utc>,
  pub source:         String,
}

#[derive(Debug, Deserialize)]
pub struct Applications {
  pub applications: Vec<Application>,
  pub partial:      bool,
}

#[derive(Deserialize)]
struct ErrorBody {
  error: String,
}

/// Async HTTP client for the finmart JSON REST API.
#[derive(Clone)]
pub struct ApiClient {
  client: Client,
  config: ApiConfig,
}

impl ApiClient {
  pub fn new(config: ApiConfig) -> Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(30))
      .build()
      .context("failed to build HTTP client")?;
    Ok(Self { client, config })
  }

  fn url(&self, path: &str) -> String {
    format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
  }

  fn auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
    if self.config.username.is_empty() {
      req
    } else {
      req.basic_auth(&self.config.username, Some(&self.config.password))
    }
  }

  fn identify(req: reqwest::RequestBuilder, user: Option<&str>) -> reqwest::RequestBuilder {
    match user {
      Some(user) => req.header("x-user-id", user),
      None => req,
    }
  }

  // ── Submissions ───────────────────────────────────────────────────────────

  /// `POST /submissions/{kind}`
  pub async fn submit(
    &self,
    kind: &str,
    form: &serde_json::Value,
    user: Option<&str>,
  ) -> Result<Receipt> {
    let what = format!("POST /submissions/{kind}");
    let req = self.client.post(self.url(&format!("/submissions/{kind}"))).json(form);
    let resp = Self::identify(req, user)
      .send()
      .await
      .with_context(|| format!("{what} failed"))?;
    check(resp, &what).await?.json().await.context("deserialising receipt")
  }

  /// `GET /applications`
  pub async fn applications(&self, user: &str) -> Result<Applications> {
    let req = self.client.get(self.url("/applications"));
    let resp = Self::identify(req, Some(user))
      .send()
      .await
      .context("GET /applications failed")?;
    check(resp, "GET /applications")
      .await?
      .json()
      .await
      .context("deserialising applications")
  }

  // ── Admin ─────────────────────────────────────────────────────────────────

  /// `GET /admin/{collection}[?status=]`
  pub async fn list(&self, collection: &str, status: Option<&str>) -> Result<Vec<Document>> {
    let what = format!("GET /admin/{collection}");
    let mut req = self.auth(self.client.get(self.url(&format!("/admin/{collection}"))));
    if let Some(status) = status {
      req = req.query(&[("status", status)]);
    }
    let resp = req.send().await.with_context(|| format!("{what} failed"))?;
    check(resp, &what).await?.json().await.context("deserialising records")
  }

  /// `POST /admin/{collection}/{id}/status`
  pub async fn set_status(&self, collection: &str, id: Uuid, status: &str) -> Result<Document> {
    let what = format!("POST /admin/{collection}/{id}/status");
    let resp = self
      .auth(self.client.post(self.url(&format!("/admin/{collection}/{id}/status"))))
      .json(&serde_json::json!({ "status": status }))
      .send()
      .await
      .with_context(|| format!("{what} failed"))?;
    check(resp, &what).await?.json().await.context("deserialising record")
  }

  /// `POST /admin/{collection}/{id}/promote`
  pub async fn promote(&self, collection: &str, id: Uuid) -> Result<Document> {
    let what = format!("POST /admin/{collection}/{id}/promote");
    let resp = self
      .auth(self.client.post(self.url(&format!("/admin/{collection}/{id}/promote"))))
      .send()
      .await
      .with_context(|| format!("{what} failed"))?;
    check(resp, &what).await?.json().await.context("deserialising record")
  }
}

/// Turn a non-success response into an error carrying the server's message.
async fn check(resp: Response, what: &str) -> Result<Response> {
  let status = resp.status();
  if status.is_success() {
    return Ok(resp);
  }
  let message = resp
    .json::<ErrorBody>()
    .await
    .map(|b| b.error)
    .unwrap_or_else(|_| status.canonical_reason().unwrap_or("error").to_string());
  Err(anyhow!("{what} → {status}: {message}"))
}
