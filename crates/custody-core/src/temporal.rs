//! # Temporal Types: UTC-Only Timestamps
//!
//! `Timestamp` is a UTC instant truncated to whole seconds. Rendered
//! artifacts and the attestation chain embed timestamps as text, so the
//! textual form must be stable: always `YYYY-MM-DDTHH:MM:SSZ`.

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A UTC-only timestamp, truncated to seconds precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Current UTC time, truncated.
    pub fn now() -> Self {
        Self(truncate_to_seconds(Utc::now()))
    }

    /// From a `chrono::DateTime<Utc>`, truncating sub-seconds.
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(truncate_to_seconds(dt))
    }

    /// Parse an RFC 3339 string with a `Z` suffix. Offsets are rejected.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        if !s.ends_with('Z') {
            return Err(ValidationError::InvalidTimestamp(format!(
                "timestamp must use Z suffix (UTC only), got: {s:?}"
            )));
        }
        let dt = DateTime::parse_from_rfc3339(s).map_err(|e| {
            ValidationError::InvalidTimestamp(format!("invalid RFC 3339 timestamp {s:?}: {e}"))
        })?;
        Ok(Self(truncate_to_seconds(dt.with_timezone(&Utc))))
    }

    /// From Unix epoch seconds.
    pub fn from_epoch_secs(secs: i64) -> Result<Self, ValidationError> {
        DateTime::from_timestamp(secs, 0)
            .map(Self)
            .ok_or_else(|| ValidationError::InvalidTimestamp(format!("invalid Unix timestamp: {secs}")))
    }

    /// Access the inner `DateTime<Utc>`.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Unix epoch seconds.
    pub fn epoch_secs(&self) -> i64 {
        self.0.timestamp()
    }

    /// `YYYY-MM-DDTHH:MM:SSZ`.
    pub fn to_iso8601(&self) -> String {
        self.0.format("%Y-%m-%dT%H:%M:%SZ").to_string()
    }

    /// Short calendar date as printed on documents, e.g. `3/7/2026`.
    pub fn to_short_date(&self) -> String {
        self.0.format("%-m/%-d/%Y").to_string()
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_iso8601())
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self::from_utc(dt)
    }
}

fn truncate_to_seconds(dt: DateTime<Utc>) -> DateTime<Utc> {
    dt.with_nanosecond(0).unwrap_or(dt)
}
