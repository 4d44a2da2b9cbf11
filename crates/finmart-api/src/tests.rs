use std::sync::Arc;

use axum::{
  Router,
  body::Body,
  http::{Request, StatusCode, header},
};
use finmart_core::{
  document::{Document, NewDocument, Status},
  kind::Kind,
  store::StoreAdapter,
};
use finmart_intake::writer::RetryPolicy;
use finmart_store_memory::MemoryStore;
use finmart_store_sqlite::SqliteStore;
use serde_json::{Value, json};
use tower::ServiceExt as _;
use uuid::Uuid;

use crate::{ApiState, admin_router, api_router};

fn app<P: StoreAdapter, A: StoreAdapter>(pending: &Arc<P>, approved: &Arc<A>) -> Router {
  let state = Arc::new(
    ApiState::new(Arc::clone(pending), Arc::clone(approved)).with_retry(RetryPolicy::none()),
  );
  Router::new()
    .merge(api_router(Arc::clone(&state)))
    .merge(admin_router(state))
}

fn stores() -> (Arc<MemoryStore>, Arc<MemoryStore>) {
  (Arc::new(MemoryStore::new()), Arc::new(MemoryStore::new()))
}

async fn send(
  app: Router,
  method: &str,
  uri: &str,
  user: Option<&str>,
  body: Option<Value>,
) -> (StatusCode, Value) {
  let mut req = Request::builder().method(method).uri(uri);
  if let Some(user) = user {
    req = req.header("x-user-id", user);
  }
  let req = match body {
    Some(body) => req
      .header(header::CONTENT_TYPE, "application/json")
      .body(Body::from(body.to_string())),
    None => req.body(Body::empty()),
  }
  .unwrap();

  let resp = app.oneshot(req).await.unwrap();
  let status = resp.status();
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
    .await
    .unwrap();
  let value = if bytes.is_empty() {
    Value::Null
  } else {
    serde_json::from_slice(&bytes).unwrap()
  };
  (status, value)
}

async fn seed_user_loan(store: &MemoryStore, owner: &str) -> Document {
  let form = json!({ "amount": 5000 }).as_object().unwrap().clone();
  store
    .create(
      "loan_applications",
      NewDocument::pending(Kind::UserLoan, Some(owner.into()), form),
    )
    .await
    .unwrap()
}

// ─── Submissions ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn anonymous_contact_submission_is_created() {
  let (p, a) = stores();
  let (status, body) = send(
    app(&p, &a),
    "POST",
    "/submissions/contact",
    None,
    Some(json!({ "name": "Asha", "message": "hi" })),
  )
  .await;

  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(body["collection"], "admin_messages");
  let docs = p.dump("admin_messages");
  assert_eq!(docs.len(), 1);
  assert_eq!(body["id"], docs[0].id.to_string());
  assert_eq!(docs[0].status, Status::Pending);
  assert_eq!(docs[0].user_id, None);
}

#[tokio::test]
async fn user_loan_requires_identity() {
  let (p, a) = stores();
  let (status, body) = send(
    app(&p, &a),
    "POST",
    "/submissions/user-loan",
    None,
    Some(json!({ "amount": 1 })),
  )
  .await;

  assert_eq!(status, StatusCode::UNAUTHORIZED);
  assert_eq!(body["error"], "please sign in to continue");
  assert_eq!(p.calls(), 0);
}

#[tokio::test]
async fn signed_in_user_loan_records_owner() {
  let (p, a) = stores();
  let (status, _) = send(
    app(&p, &a),
    "POST",
    "/submissions/user-loan",
    Some("u1"),
    Some(json!({ "amount": 1 })),
  )
  .await;

  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(p.dump("loan_applications")[0].user_id.as_deref(), Some("u1"));
}

#[tokio::test]
async fn chat_alias_routes_to_tickets() {
  let (p, a) = stores();
  let (status, body) = send(
    app(&p, &a),
    "POST",
    "/submissions/chat",
    Some("u1"),
    Some(json!({ "subject": "help" })),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(body["collection"], "data_tmp");
}

#[tokio::test]
async fn unknown_kind_is_not_found() {
  let (p, a) = stores();
  let (status, _) = send(
    app(&p, &a),
    "POST",
    "/submissions/mortgage",
    Some("u1"),
    Some(json!({})),
  )
  .await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  assert_eq!(p.calls(), 0);
}

#[tokio::test]
async fn non_object_form_is_bad_request() {
  let (p, a) = stores();
  let (status, body) = send(
    app(&p, &a),
    "POST",
    "/submissions/contact",
    None,
    Some(json!([1, 2, 3])),
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["error"], "the form could not be read");
}

#[tokio::test]
async fn store_denial_surfaces_generic_message() {
  let (p, a) = stores();
  p.deny_writes("admin_messages");
  let (status, body) = send(
    app(&p, &a),
    "POST",
    "/submissions/contact",
    None,
    Some(json!({ "name": "x" })),
  )
  .await;

  assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
  assert_eq!(body["error"], "submission temporarily unavailable");
  assert!(!body["error"].as_str().unwrap().contains("admin_messages"));
}

// ─── Applications ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn applications_requires_identity() {
  let (p, a) = stores();
  let (status, _) = send(app(&p, &a), "GET", "/applications", None, None).await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn applications_are_scoped_to_the_caller() {
  let (p, a) = stores();
  let mine = seed_user_loan(&p, "u1").await;
  seed_user_loan(&p, "u2").await;

  let (status, body) = send(app(&p, &a), "GET", "/applications", Some("u1"), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["partial"], false);
  let list = body["applications"].as_array().unwrap();
  assert_eq!(list.len(), 1);
  assert_eq!(list[0]["id"], mine.id.to_string());
  assert_eq!(list[0]["type"], "user-loan");
  assert_eq!(list[0]["displayAmount"], "5000");
  assert_eq!(list[0]["source"], "pending");
}

#[tokio::test]
async fn applications_flag_partial_results() {
  let (p, a) = stores();
  seed_user_loan(&p, "u1").await;
  a.fail_next(usize::MAX);

  let (status, body) = send(app(&p, &a), "GET", "/applications", Some("u1"), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["partial"], true);
  assert_eq!(body["applications"].as_array().unwrap().len(), 1);
}

// ─── Admin ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn admin_status_transition() {
  let (p, a) = stores();
  let doc = seed_user_loan(&p, "u1").await;

  let (status, body) = send(
    app(&p, &a),
    "POST",
    &format!("/admin/loan_applications/{}/status", doc.id),
    None,
    Some(json!({ "status": "processing" })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["status"], "processing");
  assert_eq!(p.dump("loan_applications")[0].status, Status::Processing);
}

#[tokio::test]
async fn admin_invalid_status_is_bad_request() {
  let (p, a) = stores();
  let doc = seed_user_loan(&p, "u1").await;
  let before = p.calls();

  let (status, body) = send(
    app(&p, &a),
    "POST",
    &format!("/admin/loan_applications/{}/status", doc.id),
    None,
    Some(json!({ "status": "archived" })),
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert!(body["error"].as_str().unwrap().contains("archived"));
  assert_eq!(p.calls(), before);
}

#[tokio::test]
async fn admin_missing_record_is_not_found() {
  let (p, a) = stores();
  let (status, _) = send(
    app(&p, &a),
    "POST",
    &format!("/admin/loan_applications/{}/status", Uuid::new_v4()),
    None,
    Some(json!({ "status": "approved" })),
  )
  .await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn admin_policy_denial_is_forbidden() {
  let (p, a) = stores();
  let doc = seed_user_loan(&p, "u1").await;
  p.deny_writes("loan_applications");
  let (status, _) = send(
    app(&p, &a),
    "POST",
    &format!("/admin/loan_applications/{}/status", doc.id),
    None,
    Some(json!({ "status": "approved" })),
  )
  .await;
  assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admin_list_filters_by_status() {
  let (p, a) = stores();
  let first = seed_user_loan(&p, "u1").await;
  seed_user_loan(&p, "u2").await;
  p.update_status("loan_applications", first.id, Status::Rejected)
    .await
    .unwrap();

  let (status, body) = send(
    app(&p, &a),
    "GET",
    "/admin/loan_applications?status=rejected",
    None,
    None,
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  let list = body.as_array().unwrap();
  assert_eq!(list.len(), 1);
  assert_eq!(list[0]["id"], first.id.to_string());

  let (status, _) = send(
    app(&p, &a),
    "GET",
    "/admin/loan_applications?status=bogus",
    None,
    None,
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);

  let (status, _) = send(app(&p, &a), "GET", "/admin/users", None, None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn promote_into_sqlite_approved_store() {
  let p = Arc::new(MemoryStore::new());
  let a = Arc::new(SqliteStore::open_in_memory().await.unwrap());
  let doc = seed_user_loan(&p, "u1").await;

  let (status, body) = send(
    app(&p, &a),
    "POST",
    &format!("/admin/loan_applications/{}/promote", doc.id),
    None,
    None,
  )
  .await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(body["applicationId"], doc.id.to_string());
  assert_eq!(body["status"], "approved");

  let (_, body) = send(app(&p, &a), "GET", "/applications", Some("u1"), None).await;
  let list = body["applications"].as_array().unwrap();
  assert_eq!(list.len(), 2);
  assert!(list.iter().all(|e| e["status"] == "approved"));
  assert!(list.iter().any(|e| e["source"] == "approved"));
}

#[tokio::test]
async fn promote_rejects_admin_kinds() {
  let (p, a) = stores();
  let doc = p
    .create(
      "admin_loans",
      NewDocument::pending(Kind::Loan, None, Default::default()),
    )
    .await
    .unwrap();

  let (status, _) = send(
    app(&p, &a),
    "POST",
    &format!("/admin/admin_loans/{}/promote", doc.id),
    None,
    None,
  )
  .await;
  assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}
