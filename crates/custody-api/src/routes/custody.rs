//! # Custody Transitions API
//!
//! Secret-gated claim, transfer and cancellation. The caller's identity
//! plays no part; the item secret in the body is the only authorization.
//! Request bodies carrying a secret deliberately do not implement `Debug`.
//!
//! ## Endpoints
//!
//! - `POST /v1/claims`: consume the active credential, rotate the secret
//! - `POST /v1/transfers`: publish a hand-off document, mark pending
//! - `POST /v1/transfers/cancel`: revoke the pending credential

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use custody_core::ItemKey;
use custody_crypto::PlainSecret;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::ArtifactView;
use crate::error::{AppError, ErrorBody};
use crate::extractors::{extract_validated_json, Validate};
use crate::state::{AppConfig, AppState};

// -- Request DTOs -------------------------------------------------------------

/// Request to claim ownership of an item.
#[derive(Deserialize, ToSchema)]
pub struct ClaimRequest {
    #[serde(default)]
    pub sku: String,
    pub serial: String,
    /// The item's current secret.
    pub secret: String,
    pub claimant_name: String,
}

/// Request to start a transfer to a new owner.
#[derive(Deserialize, ToSchema)]
pub struct TransferRequest {
    #[serde(default)]
    pub sku: String,
    pub serial: String,
    pub secret: String,
    /// Printed on the hand-off document.
    pub new_owner_name: Option<String>,
}

/// Request to cancel a pending transfer.
#[derive(Deserialize, ToSchema)]
pub struct CancelTransferRequest {
    #[serde(default)]
    pub sku: String,
    pub serial: String,
    pub secret: String,
}

fn require_secret(secret: &str) -> Result<(), String> {
    if secret.trim().is_empty() {
        return Err("secret must not be empty".to_string());
    }
    Ok(())
}

impl Validate for ClaimRequest {
    fn validate(&self) -> Result<(), String> {
        require_secret(&self.secret)?;
        if self.claimant_name.trim().is_empty() {
            return Err("claimant_name must not be empty".to_string());
        }
        Ok(())
    }
}

impl Validate for TransferRequest {
    fn validate(&self) -> Result<(), String> {
        require_secret(&self.secret)
    }
}

impl Validate for CancelTransferRequest {
    fn validate(&self) -> Result<(), String> {
        require_secret(&self.secret)
    }
}

fn item_key(config: &AppConfig, sku: &str, serial: &str) -> Result<ItemKey, AppError> {
    Ok(ItemKey::new(config.effective_sku(sku), serial)?)
}

// -- Response DTOs ------------------------------------------------------------

/// A recorded claim. `secret` is the new owner's secret, shown once.
#[derive(Debug, Serialize, ToSchema)]
pub struct ClaimResponse {
    pub event_id: Uuid,
    pub secret: String,
    pub certificate: ArtifactView,
    /// Rendered hand-off SVG, returned only for an item's first claim.
    pub handoff_document: Option<String>,
    pub custody_state: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TransferResponse {
    /// Private hand-off document carrying the current secret.
    pub handoff: ArtifactView,
    pub custody_state: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CancelTransferResponse {
    pub notice: ArtifactView,
    /// Always `REVOKED`: cancelling leaves no live credential.
    pub custody_state: String,
}

// -- Router -------------------------------------------------------------------

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/claims", post(claim))
        .route("/v1/transfers", post(initiate_transfer))
        .route("/v1/transfers/cancel", post(cancel_transfer))
}

// -- Handlers -----------------------------------------------------------------

/// POST /v1/claims: Claim ownership with the current secret.
#[utoipa::path(
    post,
    path = "/v1/claims",
    request_body = ClaimRequest,
    responses(
        (status = 200, description = "Claim recorded, secret rotated", body = ClaimResponse),
        (status = 403, description = "Invalid credential", body = ErrorBody),
        (status = 404, description = "Item not found", body = ErrorBody),
        (status = 409, description = "Credential already consumed", body = ErrorBody),
        (status = 422, description = "Validation error", body = ErrorBody),
        (status = 502, description = "Notarization failed", body = ErrorBody),
    ),
    tag = "custody"
)]
async fn claim(
    State(state): State<AppState>,
    body: Result<Json<ClaimRequest>, JsonRejection>,
) -> Result<Json<ClaimResponse>, AppError> {
    let req = extract_validated_json(body)?;
    let key = item_key(&state.config, &req.sku, &req.serial)?;
    let secret = PlainSecret::new(req.secret);

    let claimed = state
        .machine
        .claim(&key, &secret, &req.claimant_name)
        .await?;

    Ok(Json(ClaimResponse {
        event_id: claimed.event.id.into_uuid(),
        secret: claimed.secret.expose().to_string(),
        certificate: ArtifactView::public(&claimed.certificate),
        handoff_document: claimed.handoff_document,
        custody_state: claimed.state.name().to_string(),
    }))
}

/// POST /v1/transfers: Start a transfer.
#[utoipa::path(
    post,
    path = "/v1/transfers",
    request_body = TransferRequest,
    responses(
        (status = 200, description = "Transfer pending", body = TransferResponse),
        (status = 403, description = "Invalid credential", body = ErrorBody),
        (status = 404, description = "Item not found", body = ErrorBody),
        (status = 409, description = "Transfer already pending", body = ErrorBody),
        (status = 502, description = "Notarization failed", body = ErrorBody),
    ),
    tag = "custody"
)]
async fn initiate_transfer(
    State(state): State<AppState>,
    body: Result<Json<TransferRequest>, JsonRejection>,
) -> Result<Json<TransferResponse>, AppError> {
    let req = extract_validated_json(body)?;
    let key = item_key(&state.config, &req.sku, &req.serial)?;
    let secret = PlainSecret::new(req.secret);

    let initiated = state
        .machine
        .initiate_transfer(&key, &secret, req.new_owner_name.as_deref())
        .await?;

    Ok(Json(TransferResponse {
        handoff: ArtifactView::private(&initiated.handoff, &key),
        custody_state: initiated.state.name().to_string(),
    }))
}

/// POST /v1/transfers/cancel: Cancel a pending transfer.
///
/// The item is left without a live credential.
#[utoipa::path(
    post,
    path = "/v1/transfers/cancel",
    request_body = CancelTransferRequest,
    responses(
        (status = 200, description = "Transfer cancelled", body = CancelTransferResponse),
        (status = 403, description = "Invalid credential", body = ErrorBody),
        (status = 404, description = "Item not found", body = ErrorBody),
        (status = 409, description = "No pending transfer", body = ErrorBody),
        (status = 502, description = "Notarization failed", body = ErrorBody),
    ),
    tag = "custody"
)]
async fn cancel_transfer(
    State(state): State<AppState>,
    body: Result<Json<CancelTransferRequest>, JsonRejection>,
) -> Result<Json<CancelTransferResponse>, AppError> {
    let req = extract_validated_json(body)?;
    let key = item_key(&state.config, &req.sku, &req.serial)?;
    let secret = PlainSecret::new(req.secret);

    let cancelled = state.machine.cancel_transfer(&key, &secret).await?;

    Ok(Json(CancelTransferResponse {
        notice: ArtifactView::public(&cancelled.notice),
        custody_state: cancelled.state.name().to_string(),
    }))
}
