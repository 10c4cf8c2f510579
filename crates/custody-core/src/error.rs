//! # Validation Errors
//!
//! Errors raised when untrusted input fails to satisfy a domain
//! constraint. Every variant names the offending field so the HTTP layer
//! can return a useful 422 without inspecting strings.

use thiserror::Error;

/// Input validation failure for a domain primitive.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field was missing or blank.
    #[error("{field} must not be empty")]
    Empty {
        /// Field name as seen by the caller.
        field: &'static str,
    },

    /// A free-text field exceeded its maximum length in characters.
    #[error("{field} exceeds {max} characters (got {actual})")]
    TooLong {
        /// Field name as seen by the caller.
        field: &'static str,
        /// Maximum accepted length.
        max: usize,
        /// Length of the rejected value.
        actual: usize,
    },

    /// A free-text field contained control characters.
    #[error("{field} contains control characters")]
    ControlCharacters {
        /// Field name as seen by the caller.
        field: &'static str,
    },

    /// Dispute reason outside the fixed enumeration.
    #[error("invalid dispute reason {0:?}: expected one of lost, stolen, fraud, other")]
    InvalidDisputeReason(String),

    /// Visibility channel other than `public` or `private`.
    #[error("invalid visibility {0:?}: expected public or private")]
    InvalidVisibility(String),

    /// String that is not a recognizable content identifier.
    #[error("invalid content identifier: {0:?}")]
    InvalidContentId(String),

    /// Timestamp that could not be parsed or was not UTC.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn too_long_display_names_field_and_limits() {
        let err = ValidationError::TooLong {
            field: "item_description",
            max: 2000,
            actual: 2001,
        };
        let msg = err.to_string();
        assert!(msg.contains("item_description"));
        assert!(msg.contains("2000"));
        assert!(msg.contains("2001"));
    }

    #[test]
    fn dispute_reason_display_lists_allowed_values() {
        let msg = ValidationError::InvalidDisputeReason("bogus".into()).to_string();
        assert!(msg.contains("bogus"));
        assert!(msg.contains("fraud"));
    }
}
