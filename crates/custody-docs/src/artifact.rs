//! Artifact kinds and their upload filenames, content types and channels.

use custody_core::{Timestamp, Visibility};

/// Every document the custody machine uploads or hands back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    /// Issuance certificate published at item creation.
    Certificate,
    /// Certificate published at each claim.
    Registration,
    /// Private hand-off document carrying the live secret.
    Handoff,
    /// Public notice of a cancelled transfer.
    CancellationNotice,
    /// Public chain attestation.
    Attestation,
}

impl ArtifactKind {
    /// Upload filename. Kinds that are published repeatedly for one item
    /// carry the epoch seconds of `at`; the others ignore it.
    pub fn filename(&self, sku: &str, serial: &str, at: Timestamp) -> String {
        let (sku, serial) = (safe_component(sku), safe_component(serial));
        let epoch = at.epoch_secs();
        match self {
            Self::Certificate => format!("certificate-{sku}-{serial}.svg"),
            Self::Registration => format!("registration-{sku}-{serial}-{epoch}.svg"),
            Self::Handoff => format!("sale-{sku}-{serial}.svg"),
            Self::CancellationNotice => format!("cancel-{sku}-{serial}-{epoch}.svg"),
            Self::Attestation => format!("attestation-{sku}-{serial}-{epoch}.txt"),
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Attestation => "text/plain",
            _ => "image/svg+xml",
        }
    }

    /// Channel the artifact is uploaded on.
    pub fn visibility(&self) -> Visibility {
        match self {
            Self::Handoff => Visibility::Private,
            _ => Visibility::Public,
        }
    }
}

/// Infer a content type from a filename extension.
pub fn content_type_for_filename(filename: &str) -> Option<&'static str> {
    let ext = filename.rsplit_once('.')?.1.to_ascii_lowercase();
    match ext.as_str() {
        "svg" => Some("image/svg+xml"),
        "txt" => Some("text/plain"),
        "json" => Some("application/json"),
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "pdf" => Some("application/pdf"),
        _ => None,
    }
}

/// Replace anything outside `[A-Za-z0-9._-]` with `_`.
pub fn safe_component(value: &str) -> String {
    value
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
