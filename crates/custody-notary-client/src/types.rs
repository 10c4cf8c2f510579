//! Request and response types shared by every notarizer.

use custody_core::{ContentId, Visibility};

/// A rendered document ready for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
    pub visibility: Visibility,
}

impl Artifact {
    pub fn new(
        filename: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
        visibility: Visibility,
    ) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
            visibility,
        }
    }
}

/// Result of a successful upload.
///
/// Stamping may complete after this is returned; a fresh `url` can be
/// briefly unavailable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    pub cid: ContentId,
    /// Gateway URL for the artifact.
    pub url: String,
}

impl UploadReceipt {
    /// `ipfs://<cid>`
    pub fn ipfs_uri(&self) -> String {
        self.cid.to_ipfs_uri()
    }
}

/// Bytes retrieved from the storage network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedArtifact {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// Which channel a credit balance is requested for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreditScope {
    Channel(Visibility),
    All,
}

impl CreditScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Channel(v) => v.as_str(),
            Self::All => "all",
        }
    }

    /// Parse a `network` query value; anything unrecognised means all.
    pub fn parse(network: Option<&str>) -> Self {
        match network.map(str::trim) {
            Some("public") => Self::Channel(Visibility::Public),
            Some("private") => Self::Channel(Visibility::Private),
            _ => Self::All,
        }
    }
}
