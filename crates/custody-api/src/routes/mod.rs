//! # API Route Modules
//!
//! - `items`: issuer item creation (single and batch), the public verify
//!   view, serial generation.
//! - `custody`: secret-gated claim, transfer and cancellation.
//! - `events`: secret-gated dispute and attestation of ownership events.
//! - `documents`: metadata extraction, artifact proxy, stamp credits,
//!   photo upload, notary event stream.
//! - `admin`: audit export, payment gate checkout, public client config.
//!
//! Shared response views live here so every module renders items, events
//! and artifacts the same way.

pub mod admin;
pub mod custody;
pub mod documents;
pub mod events;
pub mod items;

use custody_core::ItemKey;
use custody_docs::ArtifactKind;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::store::{ArtifactRef, OwnershipEventRecord};

/// An uploaded artifact as handed to callers.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ArtifactView {
    pub cid: String,
    /// Where to fetch it. Private artifacts point at the artifact proxy.
    pub url: String,
    pub ipfs_uri: String,
}

impl ArtifactView {
    /// Public artifacts keep their gateway URL.
    pub fn public(artifact: &ArtifactRef) -> Self {
        Self {
            cid: artifact.cid.to_string(),
            url: artifact.url.clone(),
            ipfs_uri: artifact.cid.to_ipfs_uri(),
        }
    }

    /// Private hand-off documents are served through `/v1/artifacts`.
    pub fn private(artifact: &ArtifactRef, key: &ItemKey) -> Self {
        let filename = ArtifactKind::Handoff.filename(
            key.sku(),
            key.serial(),
            custody_core::Timestamp::now(),
        );
        Self {
            cid: artifact.cid.to_string(),
            url: format!("/v1/artifacts/{}?filename={filename}", artifact.cid),
            ipfs_uri: artifact.cid.to_ipfs_uri(),
        }
    }
}

/// One ownership event.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EventView {
    pub event_id: Uuid,
    pub claimant_name: String,
    pub certificate: Option<ArtifactView>,
    pub disputed: bool,
    pub dispute_reason: Option<String>,
    /// RFC 3339, UTC.
    pub created_at: String,
}

impl From<&OwnershipEventRecord> for EventView {
    fn from(event: &OwnershipEventRecord) -> Self {
        Self {
            event_id: event.id.into_uuid(),
            claimant_name: event.claimant_name.clone(),
            certificate: event.certificate.as_ref().map(ArtifactView::public),
            disputed: event.disputed,
            dispute_reason: event.dispute_reason.map(|r| r.as_str().to_string()),
            created_at: event.created_at.to_iso8601(),
        }
    }
}
