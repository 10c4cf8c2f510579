//! Visibility channel of an uploaded artifact.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Whether an artifact is published on the public or the private channel
/// of the notarization network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// World-readable artifact (certificates, notices, attestations).
    Public,
    /// Artifact retrievable only with service credentials (hand-off documents).
    Private,
}

impl Visibility {
    /// Wire representation, also used as the upstream `network` header.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
        }
    }
}

impl std::fmt::Display for Visibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Visibility {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(Self::Public),
            "private" => Ok(Self::Private),
            other => Err(ValidationError::InvalidVisibility(other.to_string())),
        }
    }
}
