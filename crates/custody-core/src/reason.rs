//! # Dispute Reasons
//!
//! The closed set of reasons an ownership event may be disputed for.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Why an ownership event is being disputed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisputeReason {
    /// The item was lost before the claim.
    Lost,
    /// The item was stolen and claimed by someone else.
    Stolen,
    /// The claim was obtained fraudulently.
    Fraud,
    /// Any other reason.
    Other,
}

impl DisputeReason {
    /// All reasons, in display order.
    pub const ALL: [DisputeReason; 4] = [Self::Lost, Self::Stolen, Self::Fraud, Self::Other];

    /// Wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lost => "lost",
            Self::Stolen => "stolen",
            Self::Fraud => "fraud",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for DisputeReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DisputeReason {
    type Err = ValidationError;

    /// Exact, case-sensitive match on the wire names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lost" => Ok(Self::Lost),
            "stolen" => Ok(Self::Stolen),
            "fraud" => Ok(Self::Fraud),
            "other" => Ok(Self::Other),
            other => Err(ValidationError::InvalidDisputeReason(other.to_string())),
        }
    }
}
