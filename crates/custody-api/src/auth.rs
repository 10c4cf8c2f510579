//! # Authentication & Issuer Authorization
//!
//! Bearer token middleware and the issuer gate consulted by item creation,
//! audit export and serial generation.
//!
//! ## Token Format
//!
//! ```text
//! Bearer {secret}           operator: authenticated issuer
//! Bearer {email}:{secret}   user: authenticated, issuer iff email is in ADMIN_EMAILS
//! (no header)               anonymous
//! ```
//!
//! Secret-gated custody transitions do not depend on the caller identity;
//! they are authorized by the item secret in the request body. Anonymous
//! callers therefore pass the middleware, while a presented but wrong token
//! is rejected with 401.
//!
//! With no `AUTH_TOKEN` configured, every request runs as the operator.

use axum::extract::Request;
use axum::http::request::Parts;
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use custody_core::MAX_EMAIL_LEN;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::error::{AppError, ErrorBody, ErrorDetail};

// ── CallerIdentity ──────────────────────────────────────────────────────────

/// Who is calling, as established by [`auth_middleware`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub authenticated: bool,
    pub email: Option<String>,
    pub is_admin: bool,
}

impl CallerIdentity {
    pub fn anonymous() -> Self {
        Self {
            authenticated: false,
            email: None,
            is_admin: false,
        }
    }

    pub fn operator() -> Self {
        Self {
            authenticated: true,
            email: None,
            is_admin: true,
        }
    }
}

#[axum::async_trait]
impl<S: Send + Sync> axum::extract::FromRequestParts<S> for CallerIdentity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CallerIdentity>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized("no caller identity in request context".into()))
    }
}

// ── Issuer Policy ───────────────────────────────────────────────────────────

/// Decides whether a caller may create items.
pub trait IssuerPolicy: Send + Sync {
    fn is_authorized_issuer(&self, caller: &CallerIdentity) -> bool;
}

/// Issuers are authenticated admins.
#[derive(Debug, Clone, Copy, Default)]
pub struct AdminIssuerPolicy;

impl IssuerPolicy for AdminIssuerPolicy {
    fn is_authorized_issuer(&self, caller: &CallerIdentity) -> bool {
        caller.authenticated && caller.is_admin
    }
}

/// 401 for anonymous callers, 403 for authenticated non-issuers.
pub fn require_issuer(policy: &dyn IssuerPolicy, caller: &CallerIdentity) -> Result<(), AppError> {
    if policy.is_authorized_issuer(caller) {
        return Ok(());
    }
    if !caller.authenticated {
        return Err(AppError::Unauthorized("issuer sign-in required".into()));
    }
    Err(AppError::Forbidden(format!(
        "{} is not an authorized issuer",
        caller.email.as_deref().unwrap_or("caller")
    )))
}

// ── Auth Configuration ──────────────────────────────────────────────────────

/// Injected into request extensions; read by [`auth_middleware`].
#[derive(Clone, Default)]
pub struct AuthConfig {
    pub token: Option<Zeroizing<String>>,
    /// Lowercased, trimmed.
    pub admin_emails: Vec<String>,
}

impl AuthConfig {
    pub fn new(token: Option<String>, admin_emails: &[String]) -> Self {
        Self {
            token: token.filter(|t| !t.is_empty()).map(Zeroizing::new),
            admin_emails: admin_emails
                .iter()
                .map(|e| e.trim().to_lowercase())
                .filter(|e| !e.is_empty())
                .collect(),
        }
    }

    fn is_admin(&self, email: &str) -> bool {
        let email = email.trim().to_lowercase();
        self.admin_emails.iter().any(|a| *a == email)
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("admin_emails", &self.admin_emails.len())
            .finish()
    }
}

// ── Token Validation ────────────────────────────────────────────────────────

fn constant_time_token_eq(provided: &str, expected: &str) -> bool {
    let provided = provided.as_bytes();
    let expected = expected.as_bytes();
    if provided.len() != expected.len() {
        // Dummy comparison to keep timing constant regardless of length match.
        let _ = expected.ct_eq(expected);
        return false;
    }
    provided.ct_eq(expected).into()
}

/// Resolve a bearer token to an identity.
pub fn parse_bearer_token(provided: &str, config: &AuthConfig) -> Result<CallerIdentity, String> {
    let Some(expected) = config.token.as_deref() else {
        return Ok(CallerIdentity::operator());
    };

    if constant_time_token_eq(provided, expected) {
        return Ok(CallerIdentity::operator());
    }

    let Some((email, secret)) = provided.split_once(':') else {
        return Err("invalid bearer token".into());
    };
    if !constant_time_token_eq(secret, expected) {
        return Err("invalid bearer token".into());
    }

    let email = email.trim();
    if email.is_empty() || email.chars().count() > MAX_EMAIL_LEN || !email.contains('@') {
        return Err("invalid email in bearer token".into());
    }

    Ok(CallerIdentity {
        authenticated: true,
        email: Some(email.to_lowercase()),
        is_admin: config.is_admin(email),
    })
}

// ── Middleware ───────────────────────────────────────────────────────────────

/// Attach a [`CallerIdentity`] to every request. A missing header yields
/// the anonymous identity; a malformed or wrong token is rejected.
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let config = request
        .extensions()
        .get::<AuthConfig>()
        .cloned()
        .unwrap_or_default();

    if config.token.is_none() {
        request.extensions_mut().insert(CallerIdentity::operator());
        return next.run(request).await;
    }

    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let identity = match auth_header {
        None => CallerIdentity::anonymous(),
        Some(value) => match value.strip_prefix("Bearer ") {
            Some(provided) => match parse_bearer_token(provided.trim(), &config) {
                Ok(identity) => identity,
                Err(msg) => {
                    tracing::warn!(reason = %msg, "authentication failed: invalid bearer token");
                    return unauthorized_response(&msg);
                }
            },
            None => {
                tracing::warn!("authentication failed: non-Bearer authorization scheme");
                return unauthorized_response("authorization header must use Bearer scheme");
            }
        },
    };

    request.extensions_mut().insert(identity);
    next.run(request).await
}

fn unauthorized_response(message: &str) -> Response {
    let body = ErrorBody {
        error: ErrorDetail {
            code: "UNAUTHORIZED".to_string(),
            message: message.to_string(),
            details: None,
        },
    };
    (StatusCode::UNAUTHORIZED, Json(body)).into_response()
}
