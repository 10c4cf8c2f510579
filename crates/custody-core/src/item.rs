//! # Item Key
//!
//! A physical item is identified by the immutable `(sku, serial)` pair.
//! The pair is unique across the store and is the address every custody
//! transition is routed by.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::text::{self, MAX_TEXT_LEN};

/// Validated `(sku, serial)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ItemKey {
    sku: String,
    serial: String,
}

impl ItemKey {
    /// Build a key from caller input. Both parts are trimmed and must be
    /// non-empty, single-line, and within the free-text limit.
    pub fn new(sku: &str, serial: &str) -> Result<Self, ValidationError> {
        Ok(Self {
            sku: text::required("sku", sku, MAX_TEXT_LEN)?,
            serial: text::required("serial", serial, MAX_TEXT_LEN)?,
        })
    }

    /// The stock-keeping unit.
    pub fn sku(&self) -> &str {
        &self.sku
    }

    /// The item serial within the SKU.
    pub fn serial(&self) -> &str {
        &self.serial
    }
}

impl std::fmt::Display for ItemKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.sku, self.serial)
    }
}

impl<'de> Deserialize<'de> for ItemKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            sku: String,
            serial: String,
        }
        let raw = Raw::deserialize(deserializer)?;
        Self::new(&raw.sku, &raw.serial).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_parts() {
        let key = ItemKey::new(" SKU1 ", " S1").unwrap();
        assert_eq!(key.sku(), "SKU1");
        assert_eq!(key.serial(), "S1");
        assert_eq!(key.to_string(), "SKU1/S1");
    }

    #[test]
    fn rejects_empty_serial() {
        assert_eq!(
            ItemKey::new("SKU1", ""),
            Err(ValidationError::Empty { field: "serial" })
        );
    }

    #[test]
    fn deserialize_validates() {
        let ok: ItemKey = serde_json::from_str(r#"{"sku":"A","serial":"B"}"#).unwrap();
        assert_eq!(ok.to_string(), "A/B");
        assert!(serde_json::from_str::<ItemKey>(r#"{"sku":"","serial":"B"}"#).is_err());
    }
}
