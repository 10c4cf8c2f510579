//! # Application State
//!
//! Shared state for the Axum application, passed to all route handlers via
//! the `State` extractor.
//!
//! - **Custody machine**: the orchestrator behind every secret-gated route.
//! - **Store**: read paths (verify view, audit) and readiness checks.
//! - **Notarizer**: artifact proxy and credit balance. `None` when neither
//!   live credentials nor the in-memory notarizer are configured; upload
//!   routes then answer 503.
//! - **Issuer policy** and **payment gate**: narrow seams to collaborators
//!   outside the custody core.

use std::sync::Arc;

use custody_crypto::SecretService;
use custody_notary_client::Notarizer;

use crate::auth::{AdminIssuerPolicy, IssuerPolicy};
use crate::gate::{FreeModeGate, PaymentGate};
use crate::machine::CustodyMachine;
use crate::store::{CustodyStore, MemoryStore};

/// SKU offered by serial generation when `SINGLE_SKU` is unset.
pub const DEFAULT_SKU: &str = "CL1000";

// -- Configuration ------------------------------------------------------------

/// Application configuration, read once at startup.
///
/// Custom `Debug` redacts the `auth_token` to prevent credential leakage in logs.
#[derive(Clone)]
pub struct AppConfig {
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// Static bearer token. If `None`, authentication is disabled.
    pub auth_token: Option<String>,
    /// Issuer allowlist, compared trimmed and lowercased.
    pub admin_emails: Vec<String>,
    /// When set, every request's SKU is forced to this value.
    pub single_sku: Option<String>,
    pub default_sku: String,
    /// Payment gate waves everything through.
    pub free_mode: bool,
    /// URL printed on rendered documents.
    pub public_verify_url: Option<String>,
}

impl AppConfig {
    /// Read `PORT`, `AUTH_TOKEN`, `ADMIN_EMAILS`, `SINGLE_SKU`,
    /// `DEFAULT_SKU`, `FREEMODE` and `PUBLIC_VERIFY_URL`.
    pub fn from_env() -> Self {
        fn non_empty(name: &str) -> Option<String> {
            std::env::var(name)
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        }

        let port = match std::env::var("PORT") {
            Ok(raw) => raw.parse().unwrap_or_else(|_| {
                tracing::warn!(value = %raw, "PORT is not a valid port number, using 8080");
                8080
            }),
            Err(_) => 8080,
        };

        Self {
            port,
            auth_token: non_empty("AUTH_TOKEN"),
            admin_emails: parse_admin_emails(&std::env::var("ADMIN_EMAILS").unwrap_or_default()),
            single_sku: non_empty("SINGLE_SKU"),
            default_sku: non_empty("DEFAULT_SKU").unwrap_or_else(|| DEFAULT_SKU.to_string()),
            free_mode: non_empty("FREEMODE")
                .map(|v| parse_flag(&v))
                .unwrap_or(false),
            public_verify_url: non_empty("PUBLIC_VERIFY_URL"),
        }
    }

    /// The SKU a request should use: `SINGLE_SKU` wins over the caller's.
    pub fn effective_sku<'a>(&'a self, requested: &'a str) -> &'a str {
        self.single_sku.as_deref().unwrap_or(requested)
    }

    /// SKU offered by serial generation.
    pub fn generation_sku(&self) -> &str {
        self.single_sku.as_deref().unwrap_or(&self.default_sku)
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("port", &self.port)
            .field(
                "auth_token",
                &self.auth_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("admin_emails", &self.admin_emails)
            .field("single_sku", &self.single_sku)
            .field("default_sku", &self.default_sku)
            .field("free_mode", &self.free_mode)
            .field("public_verify_url", &self.public_verify_url)
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            auth_token: None,
            admin_emails: Vec::new(),
            single_sku: None,
            default_sku: DEFAULT_SKU.to_string(),
            free_mode: false,
            public_verify_url: None,
        }
    }
}

/// Comma-separated list, trimmed and lowercased, blanks dropped.
pub fn parse_admin_emails(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty())
        .collect()
}

fn parse_flag(raw: &str) -> bool {
    matches!(raw.to_ascii_lowercase().as_str(), "true" | "1" | "yes")
}

// -- Application State --------------------------------------------------------

/// Shared application state accessible to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub machine: CustodyMachine,
    pub store: Arc<dyn CustodyStore>,
    pub notarizer: Option<Arc<dyn Notarizer>>,
    pub issuer_policy: Arc<dyn IssuerPolicy>,
    pub payment_gate: Arc<dyn PaymentGate>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("machine", &self.machine)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// State over an arbitrary store.
    pub fn with_store(
        config: AppConfig,
        store: Arc<dyn CustodyStore>,
        secrets: Arc<dyn SecretService>,
        notarizer: Option<Arc<dyn Notarizer>>,
    ) -> Self {
        let machine = CustodyMachine::new(
            Arc::clone(&store),
            secrets,
            notarizer.clone(),
            config.public_verify_url.clone(),
        );
        let payment_gate = Arc::new(FreeModeGate {
            free_mode: config.free_mode,
        });
        Self {
            config,
            machine,
            store,
            notarizer,
            issuer_policy: Arc::new(AdminIssuerPolicy),
            payment_gate,
        }
    }

    /// State over a fresh [`MemoryStore`].
    pub fn in_memory(
        config: AppConfig,
        secrets: Arc<dyn SecretService>,
        notarizer: Option<Arc<dyn Notarizer>>,
    ) -> Self {
        Self::with_store(config, Arc::new(MemoryStore::new()), secrets, notarizer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_emails_are_normalized() {
        assert_eq!(
            parse_admin_emails(" Alice@Example.com, ,bob@example.com "),
            vec!["alice@example.com".to_string(), "bob@example.com".to_string()]
        );
        assert!(parse_admin_emails("").is_empty());
    }

    #[test]
    fn flags() {
        assert!(parse_flag("true"));
        assert!(parse_flag("1"));
        assert!(parse_flag("TRUE"));
        assert!(!parse_flag("false"));
        assert!(!parse_flag("0"));
    }

    #[test]
    fn single_sku_overrides() {
        let mut config = AppConfig::default();
        assert_eq!(config.effective_sku("SKU9"), "SKU9");
        assert_eq!(config.generation_sku(), DEFAULT_SKU);

        config.single_sku = Some("ONLY".into());
        assert_eq!(config.effective_sku("SKU9"), "ONLY");
        assert_eq!(config.generation_sku(), "ONLY");
    }

    #[test]
    fn debug_redacts_token() {
        let config = AppConfig {
            auth_token: Some("super-secret".into()),
            ..AppConfig::default()
        };
        let debug = format!("{config:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("super-secret"));
    }
}
