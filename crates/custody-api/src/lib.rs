//! # custody-api: Axum API Services for the Custody Stack
//!
//! Chain of custody for physical items. Each item carries exactly one live
//! secret; presenting it drives the custody state machine. Every transition
//! publishes a notarized document before the store commits.
//!
//! ## API Surface
//!
//! | Prefix                      | Module                  | Gate    |
//! |-----------------------------|-------------------------|---------|
//! | `/v1/items*`                | [`routes::items`]       | issuer / public view |
//! | `/v1/serials/generate`      | [`routes::items`]       | issuer  |
//! | `/v1/claims`, `/v1/transfers*` | [`routes::custody`]  | secret  |
//! | `/v1/events/*`              | [`routes::events`]      | secret  |
//! | `/v1/documents/*`, `/v1/artifacts/*`, `/v1/stamps` | [`routes::documents`] | public |
//! | `/v1/audit`, `/v1/checkout`, `/v1/config` | [`routes::admin`] | issuer / public |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → AuthMiddleware → Handler
//! ```
//!
//! ## OpenAPI
//!
//! Generated via utoipa derive macros, served at `/openapi.json`.

pub mod auth;
pub mod db;
pub mod error;
pub mod extractors;
pub mod gate;
pub mod locks;
pub mod machine;
pub mod openapi;
pub mod routes;
pub mod state;
pub mod store;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::middleware::from_fn;
use axum::response::IntoResponse;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::auth::AuthConfig;
use crate::state::AppState;

/// Assemble the full application router with all routes and middleware.
///
/// Health checks (`/health/*`) are mounted outside the auth middleware.
pub fn app(state: AppState) -> Router {
    let auth_config = AuthConfig::new(
        state.config.auth_token.clone(),
        &state.config.admin_emails,
    );

    // Body size limit: 2 MiB. Covers batch creation and document upload
    // for metadata extraction.
    let api = Router::new()
        .merge(routes::items::router())
        .merge(routes::custody::router())
        .merge(routes::events::router())
        .merge(routes::documents::router())
        .merge(routes::admin::router())
        .merge(openapi::router())
        .layer(DefaultBodyLimit::max(2 * 1024 * 1024))
        .layer(from_fn(auth::auth_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(axum::Extension(auth_config))
        .with_state(state.clone());

    let unauthenticated = Router::new()
        .route("/health/liveness", axum::routing::get(liveness))
        .route("/health/readiness", axum::routing::get(readiness))
        .with_state(state);

    Router::new().merge(unauthenticated).merge(api)
}

/// GET /health/liveness: Process is up.
async fn liveness() -> &'static str {
    "ok"
}

/// GET /health/readiness: Store reachable. The notarizer is not checked.
async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    if let Err(e) = state.store.ping().await {
        tracing::warn!(error = %e, "readiness check failed: store unreachable");
        return (StatusCode::SERVICE_UNAVAILABLE, "store unavailable").into_response();
    }
    (StatusCode::OK, "ready").into_response()
}
