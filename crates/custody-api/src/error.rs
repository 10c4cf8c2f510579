//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Maps custody transition outcomes to HTTP status codes with a JSON body
//! carrying a machine-readable code, a message, and optional details.
//! Internal and upstream error details are logged, never returned.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::machine::CustodyError;
use crate::store::StoreError;

/// Structured JSON error response body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "NOT_FOUND", "CONFLICT").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Additional context, e.g. the upstream status of a failed upload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Application-level error type that implements [`IntoResponse`] for Axum.
#[derive(Error, Debug)]
pub enum AppError {
    /// Unknown item, event or artifact (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Business-rule validation failed (422).
    #[error("validation error: {0}")]
    Validation(String),

    /// Request body could not be parsed (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Missing or invalid bearer token (401).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Caller is not allowed, or the presented secret failed (403).
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Conflicting custody transition (409).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Internal server error (500). Message is logged but not returned to client.
    #[error("internal error: {0}")]
    Internal(String),

    /// Notarization network returned an error or is unreachable (502).
    #[error("upstream error: {message}")]
    Upstream {
        message: String,
        upstream_status: Option<u16>,
    },

    /// Dependency not configured (503).
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl AppError {
    /// Return the HTTP status code and machine-readable error code for this error.
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            Self::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            Self::Upstream { .. } => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR"),
            Self::ServiceUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE"),
        }
    }

    pub fn service_unavailable(msg: &str) -> Self {
        Self::ServiceUnavailable(msg.to_string())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
}

impl AppError {
    /// The JSON detail a client sees. Internal and upstream messages are
    /// replaced with generic text.
    pub(crate) fn detail(&self) -> ErrorDetail {
        let (_, code) = self.status_and_code();

        // Never expose internal/upstream error messages to clients.
        let message = match self {
            Self::Internal(_) => "An internal error occurred".to_string(),
            Self::Upstream { .. } => "The notarization service reported an error".to_string(),
            other => other.to_string(),
        };

        let details = match self {
            Self::Upstream {
                upstream_status: Some(s),
                ..
            } => Some(serde_json::json!({ "upstream_status": s })),
            _ => None,
        };

        ErrorDetail {
            code: code.to_string(),
            message,
            details,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, _) = self.status_and_code();

        match &self {
            Self::Internal(_) => tracing::error!(error = %self, "internal server error"),
            Self::Upstream { .. } => tracing::error!(error = %self, "notarization error"),
            Self::ServiceUnavailable(_) => tracing::warn!(error = %self, "service unavailable"),
            _ => {}
        }

        let body = ErrorBody {
            error: self.detail(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<CustodyError> for AppError {
    fn from(err: CustodyError) -> Self {
        match err {
            CustodyError::NotFound(what) => Self::NotFound(what),
            CustodyError::InvalidCredential => Self::Forbidden("invalid credential".into()),
            CustodyError::ConflictingTransition(msg) => Self::Conflict(msg),
            CustodyError::NotarizationFailure {
                upstream_status,
                message,
            } => Self::Upstream {
                message,
                upstream_status,
            },
            CustodyError::NotaryNotConfigured => {
                Self::service_unavailable("notarization is not configured")
            }
            CustodyError::ValidationFailure(msg) => Self::Validation(msg),
            CustodyError::Store(e) => Self::Internal(e.to_string()),
            CustodyError::Internal(msg) => Self::Internal(msg),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        CustodyError::from(err).into()
    }
}

impl From<custody_core::ValidationError> for AppError {
    fn from(err: custody_core::ValidationError) -> Self {
        Self::Validation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(resp: Response) -> serde_json::Value {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn custody_errors_map_to_status_codes() {
        let cases = [
            (CustodyError::NotFound("item".into()), StatusCode::NOT_FOUND),
            (CustodyError::InvalidCredential, StatusCode::FORBIDDEN),
            (
                CustodyError::ConflictingTransition("pending".into()),
                StatusCode::CONFLICT,
            ),
            (
                CustodyError::ValidationFailure("bad reason".into()),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                CustodyError::NotarizationFailure {
                    upstream_status: Some(502),
                    message: "boom".into(),
                },
                StatusCode::BAD_GATEWAY,
            ),
            (
                CustodyError::NotaryNotConfigured,
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                CustodyError::Internal("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            let (status, _) = AppError::from(err).status_and_code();
            assert_eq!(status, expected);
        }
    }

    #[test]
    fn bad_request_is_400() {
        let (status, code) = AppError::BadRequest("malformed JSON".into()).status_and_code();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(code, "BAD_REQUEST");
    }

    #[tokio::test]
    async fn internal_error_hides_message() {
        let resp = AppError::Internal("secret db detail".into()).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(resp).await;
        assert_eq!(body["error"]["code"], "INTERNAL_ERROR");
        assert!(!body["error"]["message"]
            .as_str()
            .unwrap()
            .contains("secret db detail"));
        assert!(body["error"].get("details").is_none());
    }

    #[tokio::test]
    async fn upstream_error_carries_status_detail() {
        let resp = AppError::from(CustodyError::NotarizationFailure {
            upstream_status: Some(402),
            message: "payment required".into(),
        })
        .into_response();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
        let body = body_json(resp).await;
        assert_eq!(body["error"]["code"], "UPSTREAM_ERROR");
        assert_eq!(body["error"]["details"]["upstream_status"], 402);
    }

    #[test]
    fn store_conflict_becomes_409() {
        let err: AppError = StoreError::Conflict("already revoked".into()).into();
        assert_eq!(err.status_and_code().0, StatusCode::CONFLICT);
    }
}
