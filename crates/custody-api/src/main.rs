//! # custody-api: Binary Entry Point
//!
//! Starts the Axum HTTP server. Binds to `PORT` (default 8080).

use std::sync::Arc;

use anyhow::Context;
use custody_api::db::{self, PgStore};
use custody_api::state::{AppConfig, AppState};
use custody_api::store::{CustodyStore, MemoryStore};
use custody_crypto::{Argon2SecretService, ArgonCost};
use custody_notary_client::{ChainletterClient, ChainletterConfig, MockNotarizer, Notarizer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env();
    tracing::debug!(?config, "configuration loaded");

    // Optional database: absent means in-memory only.
    let store: Arc<dyn CustodyStore> = match db::init_pool()
        .await
        .context("database initialization failed")?
    {
        Some(pool) => Arc::new(PgStore::new(pool)),
        None => Arc::new(MemoryStore::new()),
    };

    let notarizer = notarizer_from_env()?;

    let secrets = Argon2SecretService::new(ArgonCost::from_env())
        .context("invalid Argon2 parameters")?;

    let port = config.port;
    let state = AppState::with_store(config, store, Arc::new(secrets), notarizer);
    let app = custody_api::app(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("custody API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// `CUSTODY_NOTARY=memory` selects the in-memory notarizer. Otherwise the
/// live client is built from `CHAINLETTER_*`; missing credentials leave the
/// server running without one.
fn notarizer_from_env() -> anyhow::Result<Option<Arc<dyn Notarizer>>> {
    let selected = std::env::var("CUSTODY_NOTARY").unwrap_or_default();
    if selected.trim().eq_ignore_ascii_case("memory") {
        tracing::warn!("using the in-memory notarizer; artifacts are not published");
        return Ok(Some(Arc::new(MockNotarizer::new())));
    }

    match ChainletterConfig::from_env() {
        Ok(notary_config) => {
            let client =
                ChainletterClient::new(notary_config).context("notarization client setup failed")?;
            tracing::info!("notarization client configured");
            Ok(Some(Arc::new(client)))
        }
        Err(e) => {
            tracing::warn!(
                "notarization not configured: {e}. Item creation and transitions will return 503."
            );
            Ok(None)
        }
    }
}
