//! # Content Identifiers
//!
//! A [`ContentId`] names an artifact on the content-addressed notarization
//! network. Callers hand us references in several shapes (`ipfs://` URIs,
//! gateway URLs, raw CIDs); [`ContentId::extract`] normalizes all of them.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Longest CID accepted. CIDv1 base32 strings are well below this.
const MAX_CID_LEN: usize = 128;

/// Shortest string accepted as a bare CID when no scheme or path marks it.
const MIN_RAW_CID_LEN: usize = 46;

/// A content identifier on the notarization network.
///
/// Always non-empty ASCII alphanumeric.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ContentId(String);

impl ContentId {
    /// Validate a bare CID string.
    pub fn new(raw: impl Into<String>) -> Result<Self, ValidationError> {
        let raw = raw.into();
        if raw.is_empty()
            || raw.len() > MAX_CID_LEN
            || !raw.bytes().all(|b| b.is_ascii_alphanumeric())
        {
            return Err(ValidationError::InvalidContentId(raw));
        }
        Ok(Self(raw))
    }

    /// Pull a CID out of any of the accepted reference forms:
    ///
    /// - `ipfs://<cid>[/path]`
    /// - `https://host/ipfs/<cid>[/path][?query]`
    /// - a bare alphanumeric CID of at least 46 characters
    ///
    /// Returns `None` when nothing recognizable is present.
    pub fn extract(input: &str) -> Option<Self> {
        let input = input.trim();
        if input.is_empty() {
            return None;
        }

        let lower = input.to_ascii_lowercase();
        if lower.starts_with("ipfs://") {
            return Self::new(segment(&input["ipfs://".len()..])).ok();
        }
        if let Some(pos) = lower.find("/ipfs/") {
            return Self::new(segment(&input[pos + "/ipfs/".len()..])).ok();
        }
        if input.len() >= MIN_RAW_CID_LEN && input.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Self::new(input).ok();
        }
        None
    }

    /// Whether the CID has the CIDv0 shape (`Qm` + 44 base58-ish characters)
    /// that the artifact proxy is willing to forward upstream.
    pub fn is_proxyable(&self) -> bool {
        let bytes = self.0.as_bytes();
        bytes.len() == 46
            && bytes.starts_with(b"Qm")
            && bytes[2..]
                .iter()
                .all(|b| matches!(b, b'1'..=b'9') || b.is_ascii_alphabetic())
    }

    /// Substitute this CID into a gateway template containing `:cid`.
    pub fn resolve(&self, gateway_template: &str) -> String {
        gateway_template.replace(":cid", &self.0)
    }

    /// `ipfs://` form of this CID.
    pub fn to_ipfs_uri(&self) -> String {
        format!("ipfs://{}", self.0)
    }

    /// The raw CID string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ContentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ContentId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Self::new(raw).map_err(serde::de::Error::custom)
    }
}

/// The leading path segment, stopping at `/`, `?` or `#`.
fn segment(rest: &str) -> &str {
    let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    &rest[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const V0: &str = "QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG";

    #[test]
    fn extracts_from_ipfs_uri() {
        let cid = ContentId::extract(&format!("ipfs://{V0}/image.png")).unwrap();
        assert_eq!(cid.as_str(), V0);
    }

    #[test]
    fn extracts_from_gateway_url() {
        let url = format!("https://gateway.pinata.cloud/ipfs/{V0}?filename=a.svg");
        assert_eq!(ContentId::extract(&url).unwrap().as_str(), V0);
    }

    #[test]
    fn extracts_raw_cid() {
        assert_eq!(ContentId::extract(V0).unwrap().as_str(), V0);
    }

    #[test]
    fn rejects_short_raw_strings() {
        assert!(ContentId::extract("Qm123").is_none());
        assert!(ContentId::extract("https://example.com/photo.png").is_none());
        assert!(ContentId::extract("").is_none());
    }

    #[test]
    fn proxyable_requires_v0_shape() {
        assert!(ContentId::new(V0).unwrap().is_proxyable());
        let v1 = "bafybeigdyrzt5sfp7udm7hu76uh7y26nf3efuylqabf3oclgtqy55fbzdi";
        assert!(!ContentId::new(v1).unwrap().is_proxyable());
        let zero = format!("Qm{}", "0".repeat(44));
        assert!(!ContentId::new(zero).unwrap().is_proxyable());
    }

    #[test]
    fn resolves_gateway_template() {
        let cid = ContentId::new(V0).unwrap();
        assert_eq!(
            cid.resolve("https://gateway.pinata.cloud/ipfs/:cid"),
            format!("https://gateway.pinata.cloud/ipfs/{V0}")
        );
        assert_eq!(cid.to_ipfs_uri(), format!("ipfs://{V0}"));
    }

    #[test]
    fn deserialize_rejects_garbage() {
        assert!(serde_json::from_str::<ContentId>("\"../etc/passwd\"").is_err());
    }

    proptest! {
        #[test]
        fn every_form_yields_the_same_cid(raw in "[A-Za-z0-9]{46,60}") {
            let direct = ContentId::extract(&raw).unwrap();
            let uri = ContentId::extract(&format!("ipfs://{raw}")).unwrap();
            let url = ContentId::extract(&format!("https://gw.example/ipfs/{raw}/x")).unwrap();
            prop_assert_eq!(&direct, &uri);
            prop_assert_eq!(&direct, &url);
        }
    }
}
