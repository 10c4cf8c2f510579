//! Notarization client error types.

/// Errors from notarization calls.
#[derive(Debug, thiserror::Error)]
pub enum NotaryError {
    /// HTTP transport error (after retries).
    #[error("HTTP error calling {endpoint}: {source}")]
    Http {
        endpoint: String,
        source: reqwest::Error,
    },
    /// The webhook returned a non-2xx status.
    #[error("notary {endpoint} returned {status}: {body}")]
    Upstream {
        endpoint: String,
        status: u16,
        body: String,
    },
    /// A 2xx response without a usable content id.
    #[error("notary {endpoint} returned no content id: {detail}")]
    MissingCid { endpoint: String, detail: String },
    /// Response deserialization failed.
    #[error("failed to deserialize response from {endpoint}: {source}")]
    Deserialization {
        endpoint: String,
        source: reqwest::Error,
    },
    /// Artifact not held by the in-memory notarizer.
    #[error("artifact {0} not found")]
    NotFound(String),
    /// Injected failure from the in-memory notarizer.
    #[error("simulated notary failure")]
    Simulated { status: Option<u16> },
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] super::config::ConfigError),
}

impl NotaryError {
    /// HTTP status reported by the upstream, if there was one.
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            Self::Upstream { status, .. } => Some(*status),
            Self::Http { source, .. } | Self::Deserialization { source, .. } => {
                source.status().map(|s| s.as_u16())
            }
            Self::NotFound(_) => Some(404),
            Self::Simulated { status } => *status,
            Self::MissingCid { .. } | Self::Config(_) => None,
        }
    }

    /// Whether the artifact is simply absent upstream.
    pub fn is_not_found(&self) -> bool {
        self.upstream_status() == Some(404)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_status_is_carried() {
        let err = NotaryError::Upstream {
            endpoint: "POST /webhook".into(),
            status: 402,
            body: "no credits".into(),
        };
        assert_eq!(err.upstream_status(), Some(402));
        assert!(!err.is_not_found());
        assert!(err.to_string().contains("402"));
    }

    #[test]
    fn missing_cid_has_no_status() {
        let err = NotaryError::MissingCid {
            endpoint: "POST /webhook".into(),
            detail: "{}".into(),
        };
        assert_eq!(err.upstream_status(), None);
    }

    #[test]
    fn not_found_reports_404() {
        assert!(NotaryError::NotFound("QmX".into()).is_not_found());
    }
}
