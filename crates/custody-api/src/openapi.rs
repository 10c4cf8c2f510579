//! # OpenAPI Specification Assembly
//!
//! Assembles all utoipa-documented routes into a single OpenAPI spec,
//! served at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::state::AppState;

/// Adds the bearer token security scheme.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .description(Some(
                            "`AUTH_TOKEN` for the operator, or `<email>:AUTH_TOKEN` for a user.",
                        ))
                        .build(),
                ),
            );
        }
    }
}

/// Assembled OpenAPI spec for the entire API surface. The version follows
/// the crate version.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Custody API",
        description = "Credential-gated chain of custody for physical items.\n\nEach item carries one live secret. Presenting it claims the item, starts or cancels a transfer, disputes an ownership event, or attests the chain. Every transition publishes a notarized document before anything is persisted.\n\nIssuer routes (item creation, photo upload, audit, serial generation) require `Authorization: Bearer <token>`. Secret-gated routes accept anonymous callers. Health checks (`/health/*`) are unauthenticated.",
        license(name = "AGPL-3.0-or-later")
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development server"),
    ),
    security(
        ("bearer_auth" = [])
    ),
    paths(
        crate::routes::items::create_item,
        crate::routes::items::create_batch,
        crate::routes::items::verify_item,
        crate::routes::items::generate_serial,
        crate::routes::custody::claim,
        crate::routes::custody::initiate_transfer,
        crate::routes::custody::cancel_transfer,
        crate::routes::events::dispute_event,
        crate::routes::events::attest_event,
        crate::routes::documents::extract_document_meta,
        crate::routes::documents::proxy_artifact,
        crate::routes::documents::stamps,
        crate::routes::documents::upload_image,
        crate::routes::documents::event_stream,
        crate::routes::admin::audit,
        crate::routes::admin::checkout,
        crate::routes::admin::client_config,
    ),
    components(schemas(
        crate::error::ErrorBody,
        crate::error::ErrorDetail,
        crate::gate::GateDecision,
        crate::routes::ArtifactView,
        crate::routes::EventView,
        crate::routes::items::CreateItemRequest,
        crate::routes::items::CreatedItemResponse,
        crate::routes::items::BatchCreateRequest,
        crate::routes::items::BatchCreateResponse,
        crate::routes::items::BatchItemResult,
        crate::routes::items::ItemViewResponse,
        crate::routes::items::GeneratedSerialResponse,
        crate::routes::custody::ClaimRequest,
        crate::routes::custody::ClaimResponse,
        crate::routes::custody::TransferRequest,
        crate::routes::custody::TransferResponse,
        crate::routes::custody::CancelTransferRequest,
        crate::routes::custody::CancelTransferResponse,
        crate::routes::events::DisputeRequest,
        crate::routes::events::AttestRequest,
        crate::routes::events::AttestResponse,
        crate::routes::documents::ExtractMetaRequest,
        crate::routes::documents::ExtractMetaResponse,
        crate::routes::documents::StampsResponse,
        crate::routes::documents::ImageUploadForm,
        crate::routes::admin::AuditExport,
        crate::routes::admin::AuditTotals,
        crate::routes::admin::AuditItem,
        crate::routes::admin::AuditCredential,
        crate::routes::admin::AuditEvent,
        crate::routes::admin::CheckoutRequest,
        crate::routes::admin::ClientConfigResponse,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "items", description = "Item creation, verify view, serial generation"),
        (name = "custody", description = "Secret-gated claim, transfer and cancellation"),
        (name = "events", description = "Dispute and attestation of ownership events"),
        (name = "documents", description = "Metadata extraction, artifact proxy, notarization credits, photo upload, event stream"),
        (name = "admin", description = "Audit export, payment gate, client configuration"),
    )
)]
pub struct ApiDoc;

/// Serves the OpenAPI JSON spec at `/openapi.json`.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_generates() {
        let spec = ApiDoc::openapi();
        assert_eq!(spec.info.title, "Custody API");
        assert_eq!(spec.info.version, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn spec_lists_every_route() {
        let spec = ApiDoc::openapi();
        for path in [
            "/v1/items",
            "/v1/items/batch",
            "/v1/items/{sku}/{serial}",
            "/v1/serials/generate",
            "/v1/claims",
            "/v1/transfers",
            "/v1/transfers/cancel",
            "/v1/events/{id}/dispute",
            "/v1/events/{id}/attest",
            "/v1/documents/extract-meta",
            "/v1/artifacts/{cid}",
            "/v1/stamps",
            "/v1/images",
            "/v1/events/stream",
            "/v1/audit",
            "/v1/checkout",
            "/v1/config",
        ] {
            assert!(spec.paths.paths.contains_key(path), "missing {path}");
        }
    }

    #[test]
    fn spec_has_bearer_scheme() {
        let spec = ApiDoc::openapi();
        let components = spec.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
