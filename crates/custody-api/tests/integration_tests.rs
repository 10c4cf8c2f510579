//! # Integration Tests for custody-api
//!
//! Drives the full router in-process over the in-memory store and the
//! in-memory notarizer: custody scenarios end to end, race safety, the
//! single-active-credential invariant, issuer gating, the artifact proxy,
//! and the ambient endpoints.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use custody_api::state::{AppConfig, AppState};
use custody_crypto::{Argon2SecretService, ArgonCost};
use custody_notary_client::{MockNotarizer, Notarizer};

// -- Helpers ------------------------------------------------------------------

fn app_with(config: AppConfig) -> (Router, Arc<MockNotarizer>) {
    let notary = Arc::new(MockNotarizer::new());
    let secrets = Arc::new(Argon2SecretService::new(ArgonCost::MINIMAL).unwrap());
    let state = AppState::in_memory(
        config,
        secrets,
        Some(notary.clone() as Arc<dyn Notarizer>),
    );
    (custody_api::app(state), notary)
}

/// Auth disabled: every caller is the operator.
fn test_app() -> (Router, Arc<MockNotarizer>) {
    app_with(AppConfig::default())
}

fn test_app_with_auth(token: &str, admins: &[&str]) -> Router {
    let config = AppConfig {
        auth_token: Some(token.to_string()),
        admin_emails: admins.iter().map(|s| s.to_string()).collect(),
        ..AppConfig::default()
    };
    app_with(config).0
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
    auth: Option<&str>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = auth {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
    (status, value)
}

async fn post(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    send(app, "POST", uri, Some(body), None).await
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    send(app, "GET", uri, None, None).await
}

async fn create(app: &Router, sku: &str, serial: &str) -> Value {
    let (status, body) = post(
        app,
        "/v1/items",
        json!({"sku": sku, "serial": serial, "item_name": "Field Watch"}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create failed: {body}");
    body
}

async fn claim(app: &Router, sku: &str, serial: &str, secret: &str, name: &str) -> (StatusCode, Value) {
    post(
        app,
        "/v1/claims",
        json!({"sku": sku, "serial": serial, "secret": secret, "claimant_name": name}),
    )
    .await
}

fn secret_of(body: &Value) -> String {
    body["secret"].as_str().unwrap().to_string()
}

/// Non-revoked credentials per item, from the audit export.
async fn active_credentials(app: &Router, item_id: &str) -> usize {
    let (status, audit) = get(app, "/v1/audit").await;
    assert_eq!(status, StatusCode::OK);
    audit["credentials"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|c| c["item_id"] == item_id && c["revoked"] == false)
        .count()
}

// -- Health & docs ------------------------------------------------------------

#[tokio::test]
async fn health_endpoints() {
    let (app, _) = test_app();
    assert_eq!(
        get(&app, "/health/liveness").await,
        (StatusCode::OK, Value::String("ok".into()))
    );
    assert_eq!(
        get(&app, "/health/readiness").await,
        (StatusCode::OK, Value::String("ready".into()))
    );
}

#[tokio::test]
async fn openapi_document_is_served() {
    let (app, _) = test_app();
    let (status, spec) = get(&app, "/openapi.json").await;
    assert_eq!(status, StatusCode::OK);
    assert!(spec["paths"]["/v1/claims"].is_object());
}

// -- Scenarios ----------------------------------------------------------------

#[tokio::test]
async fn scenario_a_claim_rotates_secret() {
    let (app, _) = test_app();
    let created = create(&app, "SKU1", "S1").await;
    let s0 = secret_of(&created);
    let item_id = created["item_id"].as_str().unwrap().to_string();
    assert!(!created["certificate"]["cid"].as_str().unwrap().is_empty());
    assert_eq!(active_credentials(&app, &item_id).await, 1);

    let (status, claimed) = claim(&app, "SKU1", "S1", &s0, "Alice").await;
    assert_eq!(status, StatusCode::OK, "{claimed}");
    let s1 = secret_of(&claimed);
    assert_ne!(s0, s1);
    assert_eq!(claimed["custody_state"], "ACTIVE");
    assert!(claimed["handoff_document"].as_str().unwrap().contains(&s1));
    assert_eq!(active_credentials(&app, &item_id).await, 1);

    let (status, view) = get(&app, "/v1/items/SKU1/S1").await;
    assert_eq!(status, StatusCode::OK);
    let events = view["events"].as_array().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["claimant_name"], "Alice");
    assert_eq!(view["custody_state"], "ACTIVE");

    // s0 is spent.
    let (status, body) = claim(&app, "SKU1", "S1", &s0, "Mallory").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "FORBIDDEN");
    let (status, _) = post(
        &app,
        "/v1/transfers",
        json!({"sku": "SKU1", "serial": "S1", "secret": s0}),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn second_claim_returns_no_handoff_document() {
    let (app, _) = test_app();
    let s0 = secret_of(&create(&app, "SKU1", "S2").await);
    let (_, first) = claim(&app, "SKU1", "S2", &s0, "Alice").await;
    let (status, second) = claim(&app, "SKU1", "S2", &secret_of(&first), "Bob").await;
    assert_eq!(status, StatusCode::OK);
    assert!(second["handoff_document"].is_null());

    let (_, view) = get(&app, "/v1/items/SKU1/S2").await;
    let names: Vec<_> = view["events"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["claimant_name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, ["Alice", "Bob"]);
}

#[tokio::test]
async fn scenario_b_and_c_transfer_then_cancel() {
    let (app, _) = test_app();
    let created = create(&app, "SKU1", "S1").await;
    let item_id = created["item_id"].as_str().unwrap().to_string();
    let (_, claimed) = claim(&app, "SKU1", "S1", &secret_of(&created), "Alice").await;
    let s1 = secret_of(&claimed);
    let transfer = json!({"sku": "SKU1", "serial": "S1", "secret": s1, "new_owner_name": "Bob"});

    // B: one pending transfer per item.
    let (status, started) = post(&app, "/v1/transfers", transfer.clone()).await;
    assert_eq!(status, StatusCode::OK, "{started}");
    assert_eq!(started["custody_state"], "PENDING_TRANSFER");
    assert!(started["handoff"]["url"]
        .as_str()
        .unwrap()
        .starts_with("/v1/artifacts/"));
    let (_, view) = get(&app, "/v1/items/SKU1/S1").await;
    assert_eq!(view["transfer_pending"], true);

    let (status, body) = post(&app, "/v1/transfers", transfer).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");

    // C: cancelling revokes s1 and clears the pointer.
    let (status, cancelled) = post(
        &app,
        "/v1/transfers/cancel",
        json!({"sku": "SKU1", "serial": "S1", "secret": s1}),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{cancelled}");
    assert_eq!(cancelled["custody_state"], "REVOKED");
    assert!(!cancelled["notice"]["cid"].as_str().unwrap().is_empty());

    let (_, view) = get(&app, "/v1/items/SKU1/S1").await;
    assert_eq!(view["custody_state"], "REVOKED");
    assert_eq!(view["transfer_pending"], false);
    assert_eq!(active_credentials(&app, &item_id).await, 0);

    let (status, _) = claim(&app, "SKU1", "S1", &s1, "Bob").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = post(
        &app,
        "/v1/transfers",
        json!({"sku": "SKU1", "serial": "S1", "secret": s1}),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn pending_transfer_is_claimed_with_the_published_secret() {
    let (app, _) = test_app();
    let created = create(&app, "SKU1", "S3").await;
    let (_, claimed) = claim(&app, "SKU1", "S3", &secret_of(&created), "Alice").await;
    let s1 = secret_of(&claimed);
    let (status, _) = post(
        &app,
        "/v1/transfers",
        json!({"sku": "SKU1", "serial": "S3", "secret": s1}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, bob) = claim(&app, "SKU1", "S3", &s1, "Bob").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bob["custody_state"], "ACTIVE");
    let (_, view) = get(&app, "/v1/items/SKU1/S3").await;
    assert_eq!(view["transfer_pending"], false);
}

#[tokio::test]
async fn scenario_d_dispute() {
    let (app, _) = test_app();
    let created = create(&app, "SKU1", "S1").await;
    let (_, claimed) = claim(&app, "SKU1", "S1", &secret_of(&created), "Alice").await;
    let s1 = secret_of(&claimed);
    let event_id = claimed["event_id"].as_str().unwrap().to_string();
    let uri = format!("/v1/events/{event_id}/dispute");

    let (status, body) = post(&app, &uri, json!({"secret": s1, "reason": "bogus-reason"})).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    let (_, view) = get(&app, "/v1/items/SKU1/S1").await;
    assert_eq!(view["events"][0]["disputed"], false);
    assert!(view["events"][0]["dispute_reason"].is_null());

    let (status, event) = post(&app, &uri, json!({"secret": s1, "reason": "fraud"})).await;
    assert_eq!(status, StatusCode::OK, "{event}");
    assert_eq!(event["disputed"], true);
    assert_eq!(event["dispute_reason"], "fraud");

    let (status, _) = post(
        &app,
        &uri,
        json!({"secret": secret_of(&created), "reason": "lost"}),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn dispute_unknown_event_is_404() {
    let (app, _) = test_app();
    let uri = format!("/v1/events/{}/dispute", uuid::Uuid::new_v4());
    let (status, _) = post(&app, &uri, json!({"secret": "x", "reason": "lost"})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn scenario_e_attestation() {
    let (app, _) = test_app();
    let created = create(&app, "SKU1", "S1").await;
    let (_, claimed) = claim(&app, "SKU1", "S1", &secret_of(&created), "Alice").await;
    let s1 = secret_of(&claimed);
    let uri = format!("/v1/events/{}/attest", claimed["event_id"].as_str().unwrap());

    let (status, body) = post(&app, &uri, json!({"secret": s1, "passphrase": s1})).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let request = json!({"secret": s1, "passphrase": "blue heron"});
    let (status, first) = post(&app, &uri, request.clone()).await;
    assert_eq!(status, StatusCode::OK, "{first}");
    let (_, second) = post(&app, &uri, request).await;

    assert_eq!(first["chain_sha256"], second["chain_sha256"]);
    let chain = |v: &Value| -> Vec<String> {
        v["text"]
            .as_str()
            .unwrap()
            .lines()
            .filter(|l| !l.starts_with("issued-at:"))
            .map(str::to_string)
            .collect()
    };
    assert_eq!(chain(&first), chain(&second));
    assert!(first["text"].as_str().unwrap().contains("passphrase: blue heron"));
}

// -- Properties ---------------------------------------------------------------

#[tokio::test]
async fn concurrent_claims_with_one_secret_exactly_one_wins() {
    let (app, _) = test_app();
    let created = create(&app, "SKU1", "RACE").await;
    let item_id = created["item_id"].as_str().unwrap().to_string();
    let s0 = secret_of(&created);

    let (a, b) = tokio::join!(
        claim(&app, "SKU1", "RACE", &s0, "Alice"),
        claim(&app, "SKU1", "RACE", &s0, "Bob"),
    );
    let statuses = [a.0, b.0];
    assert_eq!(
        statuses.iter().filter(|s| **s == StatusCode::OK).count(),
        1,
        "{statuses:?}"
    );
    let loser = if a.0 == StatusCode::OK { b.0 } else { a.0 };
    assert!(
        loser == StatusCode::FORBIDDEN || loser == StatusCode::CONFLICT,
        "{loser}"
    );

    let (_, view) = get(&app, "/v1/items/SKU1/RACE").await;
    assert_eq!(view["events"].as_array().unwrap().len(), 1);
    assert_eq!(active_credentials(&app, &item_id).await, 1);
}

#[tokio::test]
async fn failed_upload_leaves_no_trace_and_secret_stays_valid() {
    let (app, notary) = test_app();
    let created = create(&app, "SKU1", "S1").await;
    let s0 = secret_of(&created);

    notary.fail_uploads(Some(502));
    let (status, body) = claim(&app, "SKU1", "S1", &s0, "Alice").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["code"], "UPSTREAM_ERROR");
    assert_eq!(body["error"]["details"]["upstream_status"], 502);

    notary.clear_failure();
    let (_, view) = get(&app, "/v1/items/SKU1/S1").await;
    assert!(view["events"].as_array().unwrap().is_empty());
    let (status, _) = claim(&app, "SKU1", "S1", &s0, "Alice").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn duplicate_item_is_409() {
    let (app, _) = test_app();
    create(&app, "SKU1", "S1").await;
    let (status, _) = post(&app, "/v1/items", json!({"sku": "SKU1", "serial": " S1 "})).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn unknown_item_is_404() {
    let (app, _) = test_app();
    let (status, _) = get(&app, "/v1/items/SKU1/NOPE").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = claim(&app, "SKU1", "NOPE", "whatever", "Alice").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_json_is_400() {
    let (app, _) = test_app();
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/claims")
                .header("content-type", "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn blank_claimant_is_422() {
    let (app, _) = test_app();
    let s0 = secret_of(&create(&app, "SKU1", "S1").await);
    let (status, _) = claim(&app, "SKU1", "S1", &s0, "   ").await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn without_notarizer_transitions_are_503() {
    let secrets = Arc::new(Argon2SecretService::new(ArgonCost::MINIMAL).unwrap());
    let app = custody_api::app(AppState::in_memory(AppConfig::default(), secrets, None));

    let (status, body) = post(&app, "/v1/items", json!({"sku": "SKU1", "serial": "S1"})).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["code"], "SERVICE_UNAVAILABLE");
    let (status, _) = get(&app, "/v1/stamps").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

// -- Issuer gating ------------------------------------------------------------

#[tokio::test]
async fn issuer_routes_require_an_admin() {
    let app = test_app_with_auth("tok", &["boss@example.com"]);
    let item = json!({"sku": "SKU1", "serial": "S1"});

    let (status, _) = send(&app, "POST", "/v1/items", Some(item.clone()), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = send(&app, "POST", "/v1/items", Some(item.clone()), Some("wrong")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = send(
        &app,
        "POST",
        "/v1/items",
        Some(item.clone()),
        Some("bob@example.com:tok"),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, created) = send(
        &app,
        "POST",
        "/v1/items",
        Some(item),
        Some("Boss@Example.com:tok"),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    // Secret-gated routes accept anonymous callers.
    let (status, _) = claim(&app, "SKU1", "S1", &secret_of(&created), "Alice").await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, "GET", "/v1/audit", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, audit) = send(&app, "GET", "/v1/audit", None, Some("tok")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(audit["items"][0]["created_by"], "boss@example.com");

    let (status, _) = send(&app, "POST", "/v1/serials/generate", None, Some("bob@example.com:tok")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

// -- Batch --------------------------------------------------------------------

#[tokio::test]
async fn batch_stamps_only_the_last_item() {
    let (app, notary) = test_app();
    create(&app, "SKU1", "DUP").await;
    let before = notary.uploads().len();

    let (status, body) = post(
        &app,
        "/v1/items/batch",
        json!({"items": [
            {"sku": "SKU1", "serial": "B1"},
            {"sku": "SKU1", "serial": "DUP"},
            {"sku": "SKU1", "serial": "B3"},
        ]}),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["created"], 2);
    assert_eq!(body["failed"], 1);
    assert_eq!(body["results"][1]["error"]["code"], "CONFLICT");
    assert!(body["results"][2]["item"]["secret"].is_string());

    let stamps: Vec<bool> = notary.uploads()[before..]
        .iter()
        .map(|u| u.notarize_now)
        .collect();
    assert_eq!(stamps, [false, false, true, true]);
}

// -- Documents ----------------------------------------------------------------

#[tokio::test]
async fn handoff_is_served_through_proxy_and_reassociates() {
    let (app, _) = test_app();
    let created = create(&app, "SKU-7", "S-1").await;
    let url = created["handoff"]["url"].as_str().unwrap().to_string();
    assert!(url.ends_with("filename=sale-SKU-7-S-1.svg"));

    let response = app
        .clone()
        .oneshot(Request::builder().uri(&url).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "image/svg+xml");
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let svg = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(svg.contains(&secret_of(&created)));

    let (status, meta) = post(&app, "/v1/documents/extract-meta", json!({"document": svg})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(meta["sku"], "SKU-7");
    assert_eq!(meta["serial"], "S-1");
    assert_eq!(meta["item_exists"], true);

    let (status, _) = post(
        &app,
        "/v1/documents/extract-meta",
        json!({"document": "<svg></svg>"}),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn proxy_rejects_non_proxyable_cids() {
    let (app, _) = test_app();
    let (status, _) = get(&app, "/v1/artifacts/bafyshort").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let unknown = format!("Qm{}", "a".repeat(44));
    let (status, _) = get(&app, &format!("/v1/artifacts/{unknown}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn stamps_report_credits() {
    let (app, _) = test_app();
    let (status, body) = get(&app, "/v1/stamps?network=private").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["network"], "private");
    assert_eq!(body["credits"], 1000);
}

const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";
const BOUNDARY: &str = "custody-test-boundary";

fn image_form(filename: &str, content_type: &str, bytes: &[u8], visibility: Option<&str>) -> Vec<u8> {
    let mut body = Vec::new();
    if let Some(visibility) = visibility {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"visibility\"\r\n\r\n{visibility}\r\n"
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

async fn upload_image(app: &Router, form: Vec<u8>, auth: Option<&str>) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/v1/images")
        .header("content-type", format!("multipart/form-data; boundary={BOUNDARY}"));
    if let Some(token) = auth {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let response = app
        .clone()
        .oneshot(builder.body(Body::from(form)).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[tokio::test]
async fn photo_upload_feeds_item_creation() {
    let (app, notary) = test_app();
    let (status, image) = upload_image(&app, image_form("watch.png", "image/png", PNG, None), None).await;
    assert_eq!(status, StatusCode::OK, "{image}");
    let cid = image["cid"].as_str().unwrap().to_string();
    assert_eq!(image["ipfs_uri"], format!("ipfs://{cid}"));

    let upload = notary.uploads().pop().unwrap();
    assert_eq!(upload.filename, "watch.png");
    assert_eq!(upload.content_type, "image/png");
    assert!(!upload.notarize_now);

    let (status, _) = post(
        &app,
        "/v1/items",
        json!({"sku": "SKU1", "serial": "S1", "photo": image["ipfs_uri"]}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn private_photo_is_served_through_proxy() {
    let (app, _) = test_app();
    let form = image_form("watch.jpg", "image/jpeg", &[0xFF, 0xD8, 0xFF, 0xE0, 1, 2], Some("private"));
    let (status, image) = upload_image(&app, form, None).await;
    assert_eq!(status, StatusCode::OK, "{image}");
    let url = image["url"].as_str().unwrap();
    assert!(url.starts_with("/v1/artifacts/"));
    assert!(url.ends_with("filename=watch.jpg"));
}

#[tokio::test]
async fn photo_upload_rejects_wrong_type_and_oversized_files() {
    let (app, notary) = test_app();

    let (status, body) = upload_image(&app, image_form("a.gif", "image/gif", b"GIF89a", None), None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (status, _) = upload_image(&app, image_form("a.png", "image/png", b"not a png", None), None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let mut big = PNG.to_vec();
    big.resize(2 * 1024 * 1024 + 1, 0);
    let (status, _) = upload_image(&app, image_form("big.png", "image/png", &big, None), None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    assert!(notary.uploads().is_empty());
}

#[tokio::test]
async fn photo_upload_requires_an_issuer() {
    let app = test_app_with_auth("tok", &[]);
    let form = || image_form("watch.png", "image/png", PNG, None);
    let (status, _) = upload_image(&app, form(), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = upload_image(&app, form(), Some("bob@example.com:tok")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = upload_image(&app, form(), Some("tok")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn event_stream_relays_notary_events() {
    let (app, _) = test_app();
    let created = create(&app, "SKU1", "S1").await;

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/v1/events/stream").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "text/event-stream");
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert_eq!(text.matches("event: upload\n").count(), 2);
    assert!(text.contains(created["certificate"]["cid"].as_str().unwrap()));
}

#[tokio::test]
async fn event_stream_reports_upstream_failure_as_event() {
    let (app, notary) = test_app();
    notary.fail_uploads(Some(401));
    let response = app
        .clone()
        .oneshot(Request::builder().uri("/v1/events/stream").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.starts_with("event: error\ndata: "));
    assert!(text.contains("upstream error 401"));
}

// -- Config, serials, checkout -------------------------------------------------

#[tokio::test]
async fn single_sku_is_forced() {
    let (app, _) = app_with(AppConfig {
        single_sku: Some("ONLY".into()),
        ..AppConfig::default()
    });
    let (_, config) = get(&app, "/v1/config").await;
    assert_eq!(config["single_sku"], "ONLY");
    assert_eq!(config["free_mode"], false);
    assert_eq!(
        config["dispute_reasons"],
        json!(["lost", "stolen", "fraud", "other"])
    );

    let created = create(&app, "OTHER", "S1").await;
    assert_eq!(created["sku"], "ONLY");
    let (status, _) = get(&app, "/v1/items/ANY/S1").await;
    assert_eq!(status, StatusCode::OK);

    let (_, serial) = post(&app, "/v1/serials/generate", json!({})).await;
    assert_eq!(serial["sku"], "ONLY");
}

#[tokio::test]
async fn generated_serial_shape() {
    let (app, _) = test_app();
    let (status, body) = send(&app, "POST", "/v1/serials/generate", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sku"], "CL1000");
    let serial = body["serial"].as_str().unwrap();
    assert_eq!(serial.len(), 12);
    assert!(serial.starts_with("CL"));
}

#[tokio::test]
async fn checkout_follows_free_mode() {
    let (app, _) = test_app();
    let (status, body) = post(&app, "/v1/checkout", json!({})).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["code"], "SERVICE_UNAVAILABLE");

    let (app, _) = app_with(AppConfig {
        free_mode: true,
        ..AppConfig::default()
    });
    let (status, body) = post(&app, "/v1/checkout", json!({"return_url": "/done"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["decision"], "allow");
    assert_eq!(body["url"], "/done");
}

// -- Audit --------------------------------------------------------------------

#[tokio::test]
async fn audit_exports_without_hashes() {
    let (app, _) = test_app();
    let created = create(&app, "SKU1", "S1").await;
    let (_, claimed) = claim(&app, "SKU1", "S1", &secret_of(&created), "Alice").await;
    let event_uri = format!("/v1/events/{}/dispute", claimed["event_id"].as_str().unwrap());
    post(&app, &event_uri, json!({"secret": secret_of(&claimed), "reason": "lost"})).await;

    let (status, audit) = get(&app, "/v1/audit").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(audit["totals"]["items"], 1);
    assert_eq!(audit["totals"]["credentials"], 2);
    assert_eq!(audit["totals"]["active_credentials"], 1);
    assert_eq!(audit["totals"]["events"], 1);
    assert_eq!(audit["totals"]["disputed_events"], 1);
    assert_eq!(audit["events"][0]["dispute_reason"], "lost");

    let raw = audit.to_string();
    assert!(!raw.contains("argon2"));
    assert!(!raw.contains("salt"));
    assert!(!raw.contains(&secret_of(&claimed)));
}
