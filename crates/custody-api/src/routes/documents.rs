//! # Documents API
//!
//! - `POST /v1/documents/extract-meta`: recover `(sku, serial)` from a
//!   printed or uploaded document and report whether the item exists
//! - `GET  /v1/artifacts/:cid?filename=`: proxy an artifact from the
//!   notarization network
//! - `GET  /v1/stamps?network=`: remaining notarization credits
//! - `POST /v1/images`: issuer upload of a PNG or JPEG item photo
//! - `GET  /v1/events/stream`: server-sent events relayed from the
//!   notarization network

use axum::body::Body;
use axum::extract::multipart::MultipartError;
use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Multipart, Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use custody_core::{ContentId, ItemKey, Visibility};
use custody_docs::{content_type_for_filename, extract_meta, safe_component};
use custody_notary_client::{Artifact, CreditScope};
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::ArtifactView;
use crate::auth::{require_issuer, CallerIdentity};
use crate::error::{AppError, ErrorBody};
use crate::extractors::{extract_validated_json, Validate};
use crate::state::AppState;

/// Largest document accepted for metadata extraction.
pub const MAX_DOCUMENT_LEN: usize = 1024 * 1024;

/// Largest item photo accepted by `POST /v1/images`.
pub const MAX_IMAGE_LEN: usize = 2 * 1024 * 1024;

/// Body limit for the image route: the photo plus multipart framing.
const IMAGE_BODY_LIMIT: usize = MAX_IMAGE_LEN + 64 * 1024;

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";
const JPEG_SIGNATURE: &[u8] = &[0xFF, 0xD8, 0xFF];

#[derive(Debug, Deserialize, ToSchema)]
pub struct ExtractMetaRequest {
    /// Document text, typically an SVG.
    pub document: String,
}

impl Validate for ExtractMetaRequest {
    fn validate(&self) -> Result<(), String> {
        if self.document.is_empty() {
            return Err("document must not be empty".to_string());
        }
        if self.document.len() > MAX_DOCUMENT_LEN {
            return Err(format!("document exceeds {MAX_DOCUMENT_LEN} bytes"));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ExtractMetaResponse {
    pub sku: String,
    pub serial: String,
    /// Whether the item is known to this deployment.
    pub item_exists: bool,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ArtifactQuery {
    /// Download name; its extension decides the content type.
    pub filename: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct StampsQuery {
    /// `public`, `private`, or anything else for all channels.
    pub network: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StampsResponse {
    pub network: String,
    /// `null` when the notarization network does not report a balance.
    pub credits: Option<i64>,
}

/// Multipart form accepted by `POST /v1/images`.
#[derive(Debug, ToSchema)]
pub struct ImageUploadForm {
    /// PNG or JPEG, at most 2 MiB.
    #[schema(value_type = String, format = Binary)]
    pub image: Vec<u8>,
    /// `public` (default) or `private`.
    pub visibility: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/documents/extract-meta", post(extract_document_meta))
        .route("/v1/artifacts/:cid", get(proxy_artifact))
        .route("/v1/stamps", get(stamps))
        .route(
            "/v1/images",
            post(upload_image).layer(DefaultBodyLimit::max(IMAGE_BODY_LIMIT)),
        )
        .route("/v1/events/stream", get(event_stream))
}

/// POST /v1/documents/extract-meta: Re-associate a document with its item.
#[utoipa::path(
    post,
    path = "/v1/documents/extract-meta",
    request_body = ExtractMetaRequest,
    responses(
        (status = 200, description = "Metadata recovered", body = ExtractMetaResponse),
        (status = 422, description = "No metadata in document", body = ErrorBody),
    ),
    tag = "documents"
)]
async fn extract_document_meta(
    State(state): State<AppState>,
    body: Result<Json<ExtractMetaRequest>, JsonRejection>,
) -> Result<Json<ExtractMetaResponse>, AppError> {
    let req = extract_validated_json(body)?;
    let meta = extract_meta(&req.document)
        .ok_or_else(|| AppError::Validation("document carries no item metadata".to_string()))?;

    let item_exists = match ItemKey::new(&meta.sku, &meta.serial) {
        Ok(key) => state.store.find_item(&key).await?.is_some(),
        Err(_) => false,
    };

    Ok(Json(ExtractMetaResponse {
        sku: meta.sku,
        serial: meta.serial,
        item_exists,
    }))
}

/// GET /v1/artifacts/:cid: Proxy an artifact.
#[utoipa::path(
    get,
    path = "/v1/artifacts/{cid}",
    params(
        ("cid" = String, Path, description = "Content identifier"),
        ArtifactQuery,
    ),
    responses(
        (status = 200, description = "Artifact bytes"),
        (status = 404, description = "Unknown or non-proxyable CID", body = ErrorBody),
        (status = 502, description = "Notarization network error", body = ErrorBody),
        (status = 503, description = "Notarization not configured", body = ErrorBody),
    ),
    tag = "documents"
)]
async fn proxy_artifact(
    State(state): State<AppState>,
    Path(cid): Path<String>,
    Query(query): Query<ArtifactQuery>,
) -> Result<Response, AppError> {
    let cid = ContentId::new(cid.trim())
        .ok()
        .filter(ContentId::is_proxyable)
        .ok_or_else(|| AppError::not_found("artifact"))?;
    let notarizer = state
        .notarizer
        .as_ref()
        .ok_or_else(|| AppError::service_unavailable("notarization is not configured"))?;

    let fetched = notarizer.fetch(&cid).await.map_err(|err| {
        if err.is_not_found() {
            AppError::not_found(format!("artifact {cid}"))
        } else {
            AppError::Upstream {
                message: err.to_string(),
                upstream_status: err.upstream_status(),
            }
        }
    })?;

    let filename = query
        .filename
        .as_deref()
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(safe_component);
    let content_type = filename
        .as_deref()
        .and_then(content_type_for_filename)
        .map(str::to_string)
        .or(fetched.content_type)
        .unwrap_or_else(|| "application/octet-stream".to_string());
    let disposition = match &filename {
        Some(name) => format!("inline; filename=\"{name}\""),
        None => "inline".to_string(),
    };

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        fetched.bytes,
    )
        .into_response())
}

/// GET /v1/stamps: Remaining notarization credits.
#[utoipa::path(
    get,
    path = "/v1/stamps",
    params(StampsQuery),
    responses(
        (status = 200, description = "Credit balance", body = StampsResponse),
        (status = 502, description = "Notarization network error", body = ErrorBody),
        (status = 503, description = "Notarization not configured", body = ErrorBody),
    ),
    tag = "documents"
)]
async fn stamps(
    State(state): State<AppState>,
    Query(query): Query<StampsQuery>,
) -> Result<Json<StampsResponse>, AppError> {
    let notarizer = state
        .notarizer
        .as_ref()
        .ok_or_else(|| AppError::service_unavailable("notarization is not configured"))?;
    let scope = CreditScope::parse(query.network.as_deref());

    let credits = notarizer
        .credits_remaining(scope)
        .await
        .map_err(|err| AppError::Upstream {
            message: err.to_string(),
            upstream_status: err.upstream_status(),
        })?;

    Ok(Json(StampsResponse {
        network: scope.as_str().to_string(),
        credits,
    }))
}

/// A photo read out of the multipart form.
struct ImageUpload {
    filename: String,
    content_type: String,
    bytes: Vec<u8>,
    visibility: Visibility,
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::Validation("image must be 2 MiB or smaller".to_string())
    } else {
        AppError::BadRequest(format!("invalid multipart body: {}", err.body_text()))
    }
}

async fn read_image_form(mut multipart: Multipart) -> Result<ImageUpload, AppError> {
    let mut image = None;
    let mut visibility = Visibility::Public;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        match field.name() {
            Some("image") => {
                let filename = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(multipart_error)?;
                image = Some((filename, content_type, bytes.to_vec()));
            }
            Some("visibility") => {
                let raw = field.text().await.map_err(multipart_error)?;
                visibility = match raw.trim() {
                    "" => Visibility::Public,
                    other => other.parse()?,
                };
            }
            _ => {}
        }
    }

    let Some((filename, content_type, bytes)) = image else {
        return Err(AppError::Validation("no image uploaded".to_string()));
    };
    if bytes.is_empty() {
        return Err(AppError::Validation("image is empty".to_string()));
    }
    if bytes.len() > MAX_IMAGE_LEN {
        return Err(AppError::Validation("image must be 2 MiB or smaller".to_string()));
    }

    let (content_type, extension, signature) = match content_type.as_deref() {
        Some("image/png") => ("image/png", "png", PNG_SIGNATURE),
        Some("image/jpeg") => ("image/jpeg", "jpg", JPEG_SIGNATURE),
        _ => {
            return Err(AppError::Validation(
                "only PNG or JPEG images are allowed".to_string(),
            ))
        }
    };
    if !bytes.starts_with(signature) {
        return Err(AppError::Validation(format!(
            "image content is not {extension}"
        )));
    }

    let filename = filename
        .as_deref()
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(safe_component)
        .unwrap_or_else(|| format!("photo.{extension}"));

    Ok(ImageUpload {
        filename,
        content_type: content_type.to_string(),
        bytes,
        visibility,
    })
}

/// POST /v1/images: Upload an item photo.
///
/// The returned `ipfs_uri` (or `cid`) is what item creation takes as its
/// photo reference.
#[utoipa::path(
    post,
    path = "/v1/images",
    request_body(content = ImageUploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Image uploaded", body = ArtifactView),
        (status = 400, description = "Malformed multipart body", body = ErrorBody),
        (status = 401, description = "Issuer sign-in required", body = ErrorBody),
        (status = 403, description = "Caller is not an issuer", body = ErrorBody),
        (status = 422, description = "Wrong image type or too large", body = ErrorBody),
        (status = 502, description = "Notarization network error", body = ErrorBody),
        (status = 503, description = "Notarization not configured", body = ErrorBody),
    ),
    tag = "documents"
)]
async fn upload_image(
    State(state): State<AppState>,
    caller: CallerIdentity,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ArtifactView>, AppError> {
    require_issuer(state.issuer_policy.as_ref(), &caller)?;
    let multipart = multipart.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let image = read_image_form(multipart).await?;
    let notarizer = state
        .notarizer
        .as_ref()
        .ok_or_else(|| AppError::service_unavailable("notarization is not configured"))?;

    let (filename, visibility, size) = (image.filename.clone(), image.visibility, image.bytes.len());
    let receipt = notarizer
        .upload(
            Artifact::new(image.filename, image.content_type, image.bytes, image.visibility),
            false,
        )
        .await
        .map_err(|err| AppError::Upstream {
            message: err.to_string(),
            upstream_status: err.upstream_status(),
        })?;

    tracing::info!(
        cid = %receipt.cid,
        filename = %filename,
        visibility = %visibility,
        size,
        "image uploaded"
    );
    let url = match visibility {
        Visibility::Public => receipt.url.clone(),
        Visibility::Private => format!("/v1/artifacts/{}?filename={filename}", receipt.cid),
    };
    Ok(Json(ArtifactView {
        cid: receipt.cid.to_string(),
        url,
        ipfs_uri: receipt.ipfs_uri(),
    }))
}

/// One server-sent `error` event followed by end of stream.
fn sse_error_frame(message: &str) -> String {
    let data = serde_json::json!({ "message": message });
    format!("event: error\ndata: {data}\n\n")
}

/// GET /v1/events/stream: Relay the notarization network's event stream.
///
/// Upstream frames are passed through unchanged. When the upstream stream
/// cannot be opened the response is a single `error` event.
#[utoipa::path(
    get,
    path = "/v1/events/stream",
    responses(
        (status = 200, description = "Server-sent events", body = String, content_type = "text/event-stream"),
        (status = 503, description = "Notarization not configured", body = ErrorBody),
    ),
    tag = "documents"
)]
async fn event_stream(State(state): State<AppState>) -> Result<Response, AppError> {
    let notarizer = state
        .notarizer
        .as_ref()
        .ok_or_else(|| AppError::service_unavailable("notarization is not configured"))?;

    let body = match notarizer.event_stream().await {
        Ok(stream) => Body::from_stream(stream.inspect_err(|err| {
            tracing::warn!(error = %err, "notary event stream interrupted");
        })),
        Err(err) => {
            tracing::error!(error = %err, "could not open notary event stream");
            let message = match err.upstream_status() {
                Some(status) => format!("upstream error {status}"),
                None => "event stream unavailable".to_string(),
            };
            Body::from(sse_error_frame(&message))
        }
    };

    Ok((
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        body,
    )
        .into_response())
}
