//! # Database Persistence Layer
//!
//! PostgreSQL persistence for items, credentials and ownership events via
//! SQLx.
//!
//! The database is **optional**. When `DATABASE_URL` is set the API runs on
//! [`PgStore`]; when absent it falls back to the in-memory store (suitable
//! for development and testing).
//!
//! ## Schema
//!
//! - `items`: unique on `(sku, serial)`, nullable pending-credential pointer.
//! - `credentials`: partial unique index on `item_id WHERE NOT revoked`
//!   enforces the single-active-credential invariant in the database.
//! - `ownership_events`: one row per claim, unique on the consumed
//!   credential.

pub mod store;

use sqlx::postgres::{PgPool, PgPoolOptions};

pub use store::PgStore;

/// Initialize the database connection pool and run migrations.
///
/// Returns `None` if `DATABASE_URL` is not set (in-memory-only mode).
/// Returns `Err` if the URL is set but the connection or migration fails.
pub async fn init_pool() -> Result<Option<PgPool>, sqlx::Error> {
    let url = match std::env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            tracing::warn!(
                "DATABASE_URL not set, running with the in-memory store. \
                 Custody records will not survive restarts."
            );
            return Ok(None);
        }
    };

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(&url)
        .await?;

    tracing::info!("Connected to PostgreSQL");

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    Ok(Some(pool))
}
