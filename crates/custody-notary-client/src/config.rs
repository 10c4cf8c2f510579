//! Notarization webhook configuration.
//!
//! Defaults point at the development pin proxy. Override via environment
//! variables or explicit construction for staging/testing.

use custody_core::Visibility;
use url::Url;
use zeroize::Zeroizing;

/// Default webhook base URL.
pub const DEFAULT_BASE_URL: &str = "https://dev-pinproxy.chaincart.io";
/// Default gateway template. `:cid` is replaced by the content id.
pub const DEFAULT_GATEWAY: &str = "https://gateway.pinata.cloud/ipfs/:cid";
pub const DEFAULT_PUBLIC_GROUP: &str = "RWA Files (public)";
pub const DEFAULT_PRIVATE_GROUP: &str = "RWA Files (private)";

/// Configuration for the notarization webhook.
///
/// Custom `Debug` implementation redacts the secret key and cookie.
#[derive(Clone)]
pub struct ChainletterConfig {
    /// Webhook base URL. Default: <https://dev-pinproxy.chaincart.io>
    pub base_url: Url,
    /// Webhook API key; part of every request path.
    pub api_key: String,
    /// Sent as the `secret-key` header.
    pub secret_key: Zeroizing<String>,
    /// Optional cookie forwarded upstream.
    pub cookie: Option<Zeroizing<String>>,
    /// Upload group for public artifacts.
    pub public_group: String,
    /// Upload group for private artifacts.
    pub private_group: String,
    /// Gateway URL template used to resolve content ids.
    pub gateway_template: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl std::fmt::Debug for ChainletterConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainletterConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key)
            .field("secret_key", &"[REDACTED]")
            .field("cookie", &self.cookie.as_ref().map(|_| "[REDACTED]"))
            .field("public_group", &self.public_group)
            .field("private_group", &self.private_group)
            .field("gateway_template", &self.gateway_template)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl ChainletterConfig {
    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `CHAINLETTER_BASE` (default: `https://dev-pinproxy.chaincart.io`)
    /// - `CHAINLETTER_API_KEY` (required)
    /// - `CHAINLETTER_SECRET_KEY` (required)
    /// - `CHAINLETTER_COOKIE` (optional)
    /// - `CHAINLETTER_PUBLIC_GROUP` (default: `RWA Files (public)`)
    /// - `CHAINLETTER_PRIVATE_GROUP` (default: `RWA Files (private)`)
    /// - `IPFS_GATEWAY` (default: `https://gateway.pinata.cloud/ipfs/:cid`)
    /// - `CHAINLETTER_TIMEOUT_SECS` (default: 30)
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = non_empty_env("CHAINLETTER_API_KEY").ok_or(ConfigError::MissingCredentials)?;
        let secret_key =
            non_empty_env("CHAINLETTER_SECRET_KEY").ok_or(ConfigError::MissingCredentials)?;

        Ok(Self {
            base_url: env_url("CHAINLETTER_BASE", DEFAULT_BASE_URL)?,
            api_key,
            secret_key: Zeroizing::new(secret_key),
            cookie: non_empty_env("CHAINLETTER_COOKIE").map(Zeroizing::new),
            public_group: non_empty_env("CHAINLETTER_PUBLIC_GROUP")
                .unwrap_or_else(|| DEFAULT_PUBLIC_GROUP.to_string()),
            private_group: non_empty_env("CHAINLETTER_PRIVATE_GROUP")
                .unwrap_or_else(|| DEFAULT_PRIVATE_GROUP.to_string()),
            gateway_template: gateway_template_from_env(),
            timeout_secs: std::env::var("CHAINLETTER_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),
        })
    }

    /// Create a configuration pointing to a local mock server (for testing).
    pub fn local_mock(base: &str, api_key: &str, secret_key: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: Url::parse(base)
                .map_err(|e| ConfigError::InvalidUrl("base".to_string(), e.to_string()))?,
            api_key: api_key.to_string(),
            secret_key: Zeroizing::new(secret_key.to_string()),
            cookie: None,
            public_group: DEFAULT_PUBLIC_GROUP.to_string(),
            private_group: DEFAULT_PRIVATE_GROUP.to_string(),
            gateway_template: DEFAULT_GATEWAY.to_string(),
            timeout_secs: 5,
        })
    }

    /// Upload group for a channel.
    pub fn group_for(&self, visibility: Visibility) -> &str {
        match visibility {
            Visibility::Public => &self.public_group,
            Visibility::Private => &self.private_group,
        }
    }

    /// `{base}/webhook/{api_key}`
    pub fn webhook_url(&self) -> Result<Url, ConfigError> {
        self.endpoint(&["webhook", &self.api_key])
    }

    /// `{base}/webhook/{api_key}/credits`
    pub fn credits_url(&self) -> Result<Url, ConfigError> {
        self.endpoint(&["webhook", &self.api_key, "credits"])
    }

    /// `{base}/webhook/{api_key}/events/stream`
    pub fn events_url(&self) -> Result<Url, ConfigError> {
        self.endpoint(&["webhook", &self.api_key, "events", "stream"])
    }

    /// `{base}/ipfs/{api_key}/{cid}`
    pub fn fetch_url(&self, cid: &str) -> Result<Url, ConfigError> {
        self.endpoint(&["ipfs", &self.api_key, cid])
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ConfigError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                ConfigError::InvalidUrl(self.base_url.to_string(), "cannot be a base".to_string())
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

/// Gateway template from `IPFS_GATEWAY`, falling back to the default.
pub fn gateway_template_from_env() -> String {
    non_empty_env("IPFS_GATEWAY").unwrap_or_else(|| DEFAULT_GATEWAY.to_string())
}

fn non_empty_env(var: &str) -> Option<String> {
    std::env::var(var)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_url(var: &str, default: &str) -> Result<Url, ConfigError> {
    let raw = non_empty_env(var).unwrap_or_else(|| default.to_string());
    Url::parse(&raw).map_err(|e| ConfigError::InvalidUrl(var.to_string(), e.to_string()))
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("CHAINLETTER_API_KEY and CHAINLETTER_SECRET_KEY environment variables are required")]
    MissingCredentials,
    #[error("invalid URL for {0}: {1}")]
    InvalidUrl(String, String),
    #[error("invalid header value for {0}")]
    InvalidHeader(String),
}
