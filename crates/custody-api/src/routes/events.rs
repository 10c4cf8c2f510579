//! # Ownership Events API
//!
//! Dispute and attestation, both authorized by the item's current secret.
//!
//! - `POST /v1/events/:id/dispute`
//! - `POST /v1/events/:id/attest`

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::routing::post;
use axum::{Json, Router};
use custody_core::EventId;
use custody_crypto::PlainSecret;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{ArtifactView, EventView};
use crate::error::{AppError, ErrorBody};
use crate::extractors::{extract_validated_json, Validate};
use crate::state::AppState;

/// Request to dispute an ownership event.
#[derive(Deserialize, ToSchema)]
pub struct DisputeRequest {
    pub secret: String,
    /// One of `lost`, `stolen`, `fraud`, `other`.
    pub reason: String,
}

impl Validate for DisputeRequest {
    fn validate(&self) -> Result<(), String> {
        if self.secret.trim().is_empty() {
            return Err("secret must not be empty".to_string());
        }
        Ok(())
    }
}

/// Request to attest the ownership chain.
#[derive(Deserialize, ToSchema)]
pub struct AttestRequest {
    pub secret: String,
    /// Printed on the attestation. Must differ from the secret.
    pub passphrase: String,
}

impl Validate for AttestRequest {
    fn validate(&self) -> Result<(), String> {
        if self.secret.trim().is_empty() {
            return Err("secret must not be empty".to_string());
        }
        if self.passphrase.trim().is_empty() {
            return Err("passphrase must not be empty".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AttestResponse {
    pub artifact: ArtifactView,
    /// SHA-256 of the chain block; stable while the event set is unchanged.
    pub chain_sha256: String,
    pub text: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/events/:id/dispute", post(dispute_event))
        .route("/v1/events/:id/attest", post(attest_event))
}

/// POST /v1/events/:id/dispute: Mark an ownership event disputed.
#[utoipa::path(
    post,
    path = "/v1/events/{id}/dispute",
    params(("id" = Uuid, Path, description = "Ownership event ID")),
    request_body = DisputeRequest,
    responses(
        (status = 200, description = "Event disputed", body = EventView),
        (status = 403, description = "Invalid credential", body = ErrorBody),
        (status = 404, description = "Event not found", body = ErrorBody),
        (status = 422, description = "Unknown reason", body = ErrorBody),
    ),
    tag = "events"
)]
async fn dispute_event(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Result<Json<DisputeRequest>, JsonRejection>,
) -> Result<Json<EventView>, AppError> {
    let req = extract_validated_json(body)?;
    let secret = PlainSecret::new(req.secret);

    let event = state
        .machine
        .dispute(EventId::from_uuid(id), &secret, &req.reason)
        .await?;
    Ok(Json(EventView::from(&event)))
}

/// POST /v1/events/:id/attest: Publish a dated chain attestation.
#[utoipa::path(
    post,
    path = "/v1/events/{id}/attest",
    params(("id" = Uuid, Path, description = "Ownership event ID")),
    request_body = AttestRequest,
    responses(
        (status = 200, description = "Attestation published", body = AttestResponse),
        (status = 403, description = "Invalid credential", body = ErrorBody),
        (status = 404, description = "Event not found", body = ErrorBody),
        (status = 422, description = "Passphrase equals the secret", body = ErrorBody),
        (status = 502, description = "Notarization failed", body = ErrorBody),
    ),
    tag = "events"
)]
async fn attest_event(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Result<Json<AttestRequest>, JsonRejection>,
) -> Result<Json<AttestResponse>, AppError> {
    let req = extract_validated_json(body)?;
    let secret = PlainSecret::new(req.secret);

    let attested = state
        .machine
        .attest(EventId::from_uuid(id), &secret, &req.passphrase)
        .await?;
    Ok(Json(AttestResponse {
        artifact: ArtifactView::public(&attested.artifact),
        chain_sha256: attested.chain_digest,
        text: attested.text,
    }))
}
