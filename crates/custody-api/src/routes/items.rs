//! # Items API
//!
//! Issuer-only item creation (single and batch) and serial generation,
//! plus the public verify view.
//!
//! ## Endpoints
//!
//! - `POST /v1/items`: create one item and its first credential
//! - `POST /v1/items/batch`: sequential create; only the last item stamps
//! - `GET  /v1/items/:sku/:serial`: public verify view
//! - `POST /v1/serials/generate`: fresh serial for the configured SKU

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use custody_core::ItemKey;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{ArtifactView, EventView};
use crate::auth::{require_issuer, CallerIdentity};
use crate::error::{AppError, ErrorBody, ErrorDetail};
use crate::extractors::{extract_validated_json, Validate};
use crate::machine::{Created, NewItem};
use crate::state::{AppConfig, AppState};

/// Upper bound on one batch request.
pub const MAX_BATCH_ITEMS: usize = 500;

// -- Request DTOs -------------------------------------------------------------

/// Request to create an item.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateItemRequest {
    /// Ignored when the deployment forces a single SKU.
    #[serde(default)]
    pub sku: String,
    pub serial: String,
    pub item_name: Option<String>,
    pub item_description: Option<String>,
    /// Photo reference: `ipfs://<cid>`, a gateway URL, or a raw CID.
    pub photo: Option<String>,
    /// Printed on the certificate and hand-off document.
    pub owner_name: Option<String>,
    /// Legacy flag covering both channels.
    pub stamp_now: Option<bool>,
    pub stamp_now_public: Option<bool>,
    pub stamp_now_private: Option<bool>,
}

impl Validate for CreateItemRequest {
    fn validate(&self) -> Result<(), String> {
        if self.serial.trim().is_empty() {
            return Err("serial must not be empty".to_string());
        }
        Ok(())
    }
}

impl CreateItemRequest {
    fn into_new_item(self, config: &AppConfig, caller: &CallerIdentity) -> Result<NewItem, AppError> {
        let sku = config.effective_sku(&self.sku);
        if sku.trim().is_empty() {
            return Err(AppError::Validation("sku must not be empty".to_string()));
        }
        let key = ItemKey::new(sku, &self.serial)?;
        let stamp_now = self.stamp_now.unwrap_or(true);
        Ok(NewItem {
            key,
            item_name: self.item_name,
            item_description: self.item_description,
            photo: self.photo,
            owner_name: self.owner_name,
            created_by: caller.email.clone(),
            stamp_public: self.stamp_now_public.unwrap_or(stamp_now),
            stamp_private: self.stamp_now_private.unwrap_or(stamp_now),
        })
    }
}

/// Request to create several items in one call.
#[derive(Debug, Deserialize, ToSchema)]
pub struct BatchCreateRequest {
    pub items: Vec<CreateItemRequest>,
}

impl Validate for BatchCreateRequest {
    fn validate(&self) -> Result<(), String> {
        if self.items.is_empty() {
            return Err("items must not be empty".to_string());
        }
        if self.items.len() > MAX_BATCH_ITEMS {
            return Err(format!("at most {MAX_BATCH_ITEMS} items per batch"));
        }
        self.items
            .iter()
            .enumerate()
            .try_for_each(|(i, item)| item.validate().map_err(|e| format!("items[{i}]: {e}")))
    }
}

// -- Response DTOs ------------------------------------------------------------

/// A freshly created item. `secret` is shown exactly once.
#[derive(Debug, Serialize, ToSchema)]
pub struct CreatedItemResponse {
    pub item_id: Uuid,
    pub sku: String,
    pub serial: String,
    pub secret: String,
    pub certificate: ArtifactView,
    /// Private hand-off document, served through the artifact proxy.
    pub handoff: ArtifactView,
    pub created_at: String,
}

impl From<&Created> for CreatedItemResponse {
    fn from(created: &Created) -> Self {
        let key = &created.item.key;
        Self {
            item_id: created.item.id.into_uuid(),
            sku: key.sku().to_string(),
            serial: key.serial().to_string(),
            secret: created.secret.expose().to_string(),
            certificate: ArtifactView::public(&created.certificate),
            handoff: ArtifactView::private(&created.handoff, key),
            created_at: created.item.created_at.to_iso8601(),
        }
    }
}

/// Outcome of one batch entry.
#[derive(Debug, Serialize, ToSchema)]
pub struct BatchItemResult {
    pub index: usize,
    pub sku: String,
    pub serial: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<CreatedItemResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BatchCreateResponse {
    pub created: usize,
    pub failed: usize,
    pub results: Vec<BatchItemResult>,
}

/// Public view of an item and its ownership chain.
#[derive(Debug, Serialize, ToSchema)]
pub struct ItemViewResponse {
    pub item_id: Uuid,
    pub sku: String,
    pub serial: String,
    pub item_name: Option<String>,
    pub item_description: Option<String>,
    pub photo_cid: Option<String>,
    pub photo_url: Option<String>,
    pub certificate: Option<ArtifactView>,
    /// `NO_CREDENTIAL_YET`, `ACTIVE`, `PENDING_TRANSFER` or `REVOKED`.
    pub custody_state: String,
    pub transfer_pending: bool,
    pub created_at: String,
    /// Oldest first.
    pub events: Vec<EventView>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct GeneratedSerialResponse {
    pub sku: String,
    pub serial: String,
}

// -- Router -------------------------------------------------------------------

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/items", post(create_item))
        .route("/v1/items/batch", post(create_batch))
        .route("/v1/items/:sku/:serial", get(verify_item))
        .route("/v1/serials/generate", post(generate_serial))
}

// -- Handlers -----------------------------------------------------------------

/// POST /v1/items: Create an item with its first credential.
#[utoipa::path(
    post,
    path = "/v1/items",
    request_body = CreateItemRequest,
    responses(
        (status = 201, description = "Item created", body = CreatedItemResponse),
        (status = 401, description = "Issuer sign-in required", body = ErrorBody),
        (status = 403, description = "Caller is not an issuer", body = ErrorBody),
        (status = 409, description = "Item already exists", body = ErrorBody),
        (status = 422, description = "Validation error", body = ErrorBody),
        (status = 502, description = "Notarization failed", body = ErrorBody),
    ),
    tag = "items"
)]
async fn create_item(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<CreateItemRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreatedItemResponse>), AppError> {
    require_issuer(state.issuer_policy.as_ref(), &caller)?;
    let req = extract_validated_json(body)?;
    let new = req.into_new_item(&state.config, &caller)?;

    let created = state.machine.create(new).await?;
    Ok((StatusCode::CREATED, Json(CreatedItemResponse::from(&created))))
}

/// POST /v1/items/batch: Create items sequentially.
///
/// Entries fail independently; earlier entries stay created.
#[utoipa::path(
    post,
    path = "/v1/items/batch",
    request_body = BatchCreateRequest,
    responses(
        (status = 200, description = "Per-item results", body = BatchCreateResponse),
        (status = 401, description = "Issuer sign-in required", body = ErrorBody),
        (status = 403, description = "Caller is not an issuer", body = ErrorBody),
        (status = 422, description = "Validation error", body = ErrorBody),
    ),
    tag = "items"
)]
async fn create_batch(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<BatchCreateRequest>, JsonRejection>,
) -> Result<Json<BatchCreateResponse>, AppError> {
    require_issuer(state.issuer_policy.as_ref(), &caller)?;
    let req = extract_validated_json(body)?;

    let mut results = Vec::with_capacity(req.items.len());
    let mut batch = Vec::with_capacity(req.items.len());
    for (index, item) in req.items.into_iter().enumerate() {
        let sku = state.config.effective_sku(&item.sku).to_string();
        let serial = item.serial.trim().to_string();
        match item.into_new_item(&state.config, &caller) {
            Ok(new) => batch.push((index, sku, serial, new)),
            Err(err) => results.push(BatchItemResult {
                index,
                sku,
                serial,
                item: None,
                error: Some(err.detail()),
            }),
        }
    }

    let (meta, items): (Vec<_>, Vec<_>) = batch
        .into_iter()
        .map(|(index, sku, serial, new)| ((index, sku, serial), new))
        .unzip();
    let outcomes = state.machine.create_batch(items).await;

    for ((index, sku, serial), outcome) in meta.into_iter().zip(outcomes) {
        let (item, error) = match outcome {
            Ok(created) => (Some(CreatedItemResponse::from(&created)), None),
            Err(err) => (None, Some(AppError::from(err).detail())),
        };
        results.push(BatchItemResult {
            index,
            sku,
            serial,
            item,
            error,
        });
    }
    results.sort_by_key(|r| r.index);

    let created = results.iter().filter(|r| r.item.is_some()).count();
    Ok(Json(BatchCreateResponse {
        created,
        failed: results.len() - created,
        results,
    }))
}

/// GET /v1/items/:sku/:serial: Public verify view.
#[utoipa::path(
    get,
    path = "/v1/items/{sku}/{serial}",
    params(
        ("sku" = String, Path, description = "Item SKU"),
        ("serial" = String, Path, description = "Item serial"),
    ),
    responses(
        (status = 200, description = "Item with ownership chain", body = ItemViewResponse),
        (status = 404, description = "Item not found", body = ErrorBody),
    ),
    tag = "items"
)]
async fn verify_item(
    State(state): State<AppState>,
    Path((sku, serial)): Path<(String, String)>,
) -> Result<Json<ItemViewResponse>, AppError> {
    let key = ItemKey::new(state.config.effective_sku(&sku), &serial)?;
    let view = state.machine.verify_view(&key).await?;
    let item = view.item;

    let photo_url = item.photo_cid.as_ref().map(|cid| match &state.notarizer {
        Some(notarizer) => notarizer.resolve_url(cid),
        None => cid.to_ipfs_uri(),
    });

    Ok(Json(ItemViewResponse {
        item_id: item.id.into_uuid(),
        sku: item.key.sku().to_string(),
        serial: item.key.serial().to_string(),
        item_name: item.item_name,
        item_description: item.item_description,
        photo_cid: item.photo_cid.as_ref().map(|c| c.to_string()),
        photo_url,
        certificate: item.certificate.as_ref().map(ArtifactView::public),
        custody_state: view.state.name().to_string(),
        transfer_pending: view.state.pending_transfer().is_some(),
        created_at: item.created_at.to_iso8601(),
        events: view.events.iter().map(EventView::from).collect(),
    }))
}

/// POST /v1/serials/generate: Fresh serial for the deployment's SKU.
#[utoipa::path(
    post,
    path = "/v1/serials/generate",
    responses(
        (status = 200, description = "Generated serial", body = GeneratedSerialResponse),
        (status = 401, description = "Issuer sign-in required", body = ErrorBody),
        (status = 403, description = "Caller is not an issuer", body = ErrorBody),
    ),
    tag = "items"
)]
async fn generate_serial(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<Json<GeneratedSerialResponse>, AppError> {
    require_issuer(state.issuer_policy.as_ref(), &caller)?;
    Ok(Json(GeneratedSerialResponse {
        sku: state.config.generation_sku().to_string(),
        serial: custody_crypto::generate_serial(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(json: serde_json::Value) -> CreateItemRequest {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn stamp_flags_fall_back_to_legacy_then_true() {
        let config = AppConfig::default();
        let caller = CallerIdentity::operator();

        let new = request(serde_json::json!({"sku": "S", "serial": "1"}))
            .into_new_item(&config, &caller)
            .unwrap();
        assert!(new.stamp_public && new.stamp_private);

        let new = request(serde_json::json!({"sku": "S", "serial": "1", "stamp_now": false}))
            .into_new_item(&config, &caller)
            .unwrap();
        assert!(!new.stamp_public && !new.stamp_private);

        let new = request(serde_json::json!({
            "sku": "S", "serial": "1", "stamp_now": false, "stamp_now_private": true
        }))
        .into_new_item(&config, &caller)
        .unwrap();
        assert!(!new.stamp_public && new.stamp_private);
    }

    #[test]
    fn single_sku_replaces_requested_sku() {
        let config = AppConfig {
            single_sku: Some("ONLY".into()),
            ..AppConfig::default()
        };
        let new = request(serde_json::json!({"serial": "7"}))
            .into_new_item(&config, &CallerIdentity::operator())
            .unwrap();
        assert_eq!(new.key.sku(), "ONLY");
    }

    #[test]
    fn missing_sku_without_single_sku_is_rejected() {
        let err = request(serde_json::json!({"serial": "7"}))
            .into_new_item(&AppConfig::default(), &CallerIdentity::operator())
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn batch_validation() {
        let empty = BatchCreateRequest { items: Vec::new() };
        assert!(empty.validate().is_err());

        let blank = BatchCreateRequest {
            items: vec![request(serde_json::json!({"sku": "S", "serial": " "}))],
        };
        assert!(blank.validate().unwrap_err().starts_with("items[0]"));
    }
}
