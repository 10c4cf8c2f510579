//! # Admin & Client Config API
//!
//! - `GET  /v1/audit`: issuer-only JSON export of the store; credential
//!   hashes and salts are never included
//! - `POST /v1/checkout`: payment gate
//! - `GET  /v1/config`: public settings the front-end needs

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use custody_core::DisputeReason;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{ArtifactView, EventView};
use crate::auth::{require_issuer, CallerIdentity};
use crate::error::{AppError, ErrorBody};
use crate::extractors::extract_json;
use crate::gate::GateDecision;
use crate::state::AppState;

// -- Audit --------------------------------------------------------------------

#[derive(Debug, Serialize, ToSchema)]
pub struct AuditItem {
    pub item_id: Uuid,
    pub sku: String,
    pub serial: String,
    pub item_name: Option<String>,
    pub item_description: Option<String>,
    pub photo_cid: Option<String>,
    pub certificate: Option<ArtifactView>,
    pub pending_credential_id: Option<Uuid>,
    pub created_by: Option<String>,
    pub created_at: String,
}

/// Credential metadata. The secret hash and salt stay server-side.
#[derive(Debug, Serialize, ToSchema)]
pub struct AuditCredential {
    pub credential_id: Uuid,
    pub item_id: Uuid,
    pub handoff_cid: Option<String>,
    pub revoked: bool,
    pub revoked_at: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuditEvent {
    pub item_id: Uuid,
    pub credential_id: Uuid,
    #[serde(flatten)]
    pub event: EventView,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuditTotals {
    pub items: usize,
    pub credentials: usize,
    pub active_credentials: usize,
    pub pending_transfers: usize,
    pub events: usize,
    pub disputed_events: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuditExport {
    pub generated_at: String,
    pub totals: AuditTotals,
    pub items: Vec<AuditItem>,
    pub credentials: Vec<AuditCredential>,
    pub events: Vec<AuditEvent>,
}

// -- Checkout & config --------------------------------------------------------

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CheckoutRequest {
    /// Where the front-end resumes after checkout.
    pub return_url: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ClientConfigResponse {
    pub single_sku: Option<String>,
    pub dispute_reasons: Vec<String>,
    pub free_mode: bool,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/audit", get(audit))
        .route("/v1/checkout", post(checkout))
        .route("/v1/config", get(client_config))
}

/// GET /v1/audit: Full store export.
#[utoipa::path(
    get,
    path = "/v1/audit",
    responses(
        (status = 200, description = "Store export", body = AuditExport),
        (status = 401, description = "Issuer sign-in required", body = ErrorBody),
        (status = 403, description = "Caller is not an issuer", body = ErrorBody),
    ),
    tag = "admin"
)]
async fn audit(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<Json<AuditExport>, AppError> {
    require_issuer(state.issuer_policy.as_ref(), &caller)?;
    let snapshot = state.machine.audit().await?;

    let totals = AuditTotals {
        items: snapshot.items.len(),
        credentials: snapshot.credentials.len(),
        active_credentials: snapshot.credentials.iter().filter(|c| !c.revoked).count(),
        pending_transfers: snapshot
            .items
            .iter()
            .filter(|i| i.pending_credential.is_some())
            .count(),
        events: snapshot.events.len(),
        disputed_events: snapshot.events.iter().filter(|e| e.disputed).count(),
    };

    let items = snapshot
        .items
        .iter()
        .map(|item| AuditItem {
            item_id: item.id.into_uuid(),
            sku: item.key.sku().to_string(),
            serial: item.key.serial().to_string(),
            item_name: item.item_name.clone(),
            item_description: item.item_description.clone(),
            photo_cid: item.photo_cid.as_ref().map(|c| c.to_string()),
            certificate: item.certificate.as_ref().map(ArtifactView::public),
            pending_credential_id: item.pending_credential.map(|c| c.into_uuid()),
            created_by: item.created_by.clone(),
            created_at: item.created_at.to_iso8601(),
        })
        .collect();

    let credentials = snapshot
        .credentials
        .iter()
        .map(|c| AuditCredential {
            credential_id: c.id.into_uuid(),
            item_id: c.item_id.into_uuid(),
            handoff_cid: c.handoff.as_ref().map(|h| h.cid.to_string()),
            revoked: c.revoked,
            revoked_at: c.revoked_at.map(|t| t.to_iso8601()),
            created_at: c.created_at.to_iso8601(),
        })
        .collect();

    let events = snapshot
        .events
        .iter()
        .map(|e| AuditEvent {
            item_id: e.item_id.into_uuid(),
            credential_id: e.credential_id.into_uuid(),
            event: EventView::from(e),
        })
        .collect();

    tracing::info!(
        caller = caller.email.as_deref().unwrap_or("operator"),
        items = totals.items,
        "audit export"
    );
    Ok(Json(AuditExport {
        generated_at: custody_core::Timestamp::now().to_iso8601(),
        totals,
        items,
        credentials,
        events,
    }))
}

/// POST /v1/checkout: Consult the payment gate.
#[utoipa::path(
    post,
    path = "/v1/checkout",
    request_body = CheckoutRequest,
    responses(
        (status = 200, description = "Checkout allowed", body = GateDecision),
        (status = 503, description = "Payments are not configured", body = ErrorBody),
    ),
    tag = "admin"
)]
async fn checkout(
    State(state): State<AppState>,
    body: Result<Json<CheckoutRequest>, JsonRejection>,
) -> Result<Json<GateDecision>, AppError> {
    let req = extract_json(body)?;
    match state
        .payment_gate
        .charge_or_free_mode_ok(req.return_url.as_deref())
    {
        allow @ GateDecision::Allow { .. } => Ok(Json(allow)),
        GateDecision::Deny { reason } => Err(AppError::ServiceUnavailable(reason)),
    }
}

/// GET /v1/config: Public client configuration.
#[utoipa::path(
    get,
    path = "/v1/config",
    responses(
        (status = 200, description = "Client configuration", body = ClientConfigResponse),
    ),
    tag = "admin"
)]
async fn client_config(State(state): State<AppState>) -> Json<ClientConfigResponse> {
    Json(ClientConfigResponse {
        single_sku: state.config.single_sku.clone(),
        dispute_reasons: DisputeReason::ALL
            .iter()
            .map(|r| r.as_str().to_string())
            .collect(),
        free_mode: state.config.free_mode,
    })
}
