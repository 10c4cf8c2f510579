//! # Item/Credential Store
//!
//! The durable relational model behind the custody state machine: items,
//! their credential chain, and ownership events.
//!
//! Every transition is a single atomic commit primitive on [`CustodyStore`].
//! Each primitive re-checks the precondition it depends on (the consumed
//! credential is still unrevoked, the pending pointer still names it, ...)
//! and returns [`StoreError::Conflict`] when it no longer holds. That check
//! is the compare-and-swap that makes a double-spend lose.
//!
//! Two implementations:
//!
//! - [`MemoryStore`]: one `parking_lot::RwLock` over the three relations.
//! - [`crate::db::PgStore`]: PostgreSQL via `sqlx`, one transaction per commit.

pub mod memory;

use async_trait::async_trait;
use custody_core::{ContentId, CredentialId, DisputeReason, EventId, ItemId, ItemKey, Timestamp};
use custody_crypto::SecretDigest;
use custody_state::{CredentialView, CustodyState, TransitionError};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

pub use memory::MemoryStore;

// -- Records ------------------------------------------------------------------

/// Reference to an uploaded artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ArtifactRef {
    #[schema(value_type = String)]
    pub cid: ContentId,
    pub url: String,
}

/// An item row. Metadata is fixed at creation; only `certificate` and
/// `pending_credential` change afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemRecord {
    pub id: ItemId,
    pub key: ItemKey,
    pub item_name: Option<String>,
    pub item_description: Option<String>,
    pub photo_cid: Option<ContentId>,
    /// Most recent public certificate.
    pub certificate: Option<ArtifactRef>,
    /// Weak pointer at the credential whose secret sits in a published
    /// hand-off document.
    pub pending_credential: Option<CredentialId>,
    pub created_by: Option<String>,
    pub created_at: Timestamp,
}

/// One generation of an item's custody secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialRecord {
    pub id: CredentialId,
    pub item_id: ItemId,
    pub digest: SecretDigest,
    /// Private hand-off document embedding this credential's secret.
    pub handoff: Option<ArtifactRef>,
    pub revoked: bool,
    pub revoked_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

impl CredentialRecord {
    /// A fresh live credential.
    pub fn issued(item_id: ItemId, digest: SecretDigest, at: Timestamp) -> Self {
        Self {
            id: CredentialId::new(),
            item_id,
            digest,
            handoff: None,
            revoked: false,
            revoked_at: None,
            created_at: at,
        }
    }

    pub fn view(&self) -> CredentialView {
        CredentialView {
            id: self.id,
            revoked: self.revoked,
        }
    }
}

/// One successful claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnershipEventRecord {
    pub id: EventId,
    pub item_id: ItemId,
    /// The credential consumed to produce this event. Never the live one.
    pub credential_id: CredentialId,
    pub claimant_name: String,
    pub certificate: Option<ArtifactRef>,
    pub disputed: bool,
    pub dispute_reason: Option<DisputeReason>,
    pub created_at: Timestamp,
}

/// Derive the custody state of an item from its stored rows.
pub fn derive_state(
    item: &ItemRecord,
    credentials: &[CredentialRecord],
) -> Result<CustodyState, TransitionError> {
    CustodyState::from_records(
        credentials.iter().map(CredentialRecord::view),
        item.pending_credential,
    )
}

// -- Commits ------------------------------------------------------------------

/// Atomic write set of a claim.
#[derive(Debug, Clone)]
pub struct ClaimCommit {
    pub item_id: ItemId,
    /// Must still be unrevoked at commit time.
    pub consumed: CredentialId,
    pub next: CredentialRecord,
    pub event: OwnershipEventRecord,
    pub certificate: ArtifactRef,
}

/// Full dump of the store for the audit export.
#[derive(Debug, Clone, Default)]
pub struct StoreSnapshot {
    pub items: Vec<ItemRecord>,
    pub credentials: Vec<CredentialRecord>,
    pub events: Vec<OwnershipEventRecord>,
}

// -- Errors -------------------------------------------------------------------

/// Errors from store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Referenced row does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// Commit precondition no longer holds.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Database failure.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Stored data could not be decoded into domain types.
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

// -- Trait --------------------------------------------------------------------

/// Persistence for items, credentials and ownership events.
///
/// Read methods return rows in creation order. Commit methods are atomic:
/// all of their writes land or none do.
#[async_trait]
pub trait CustodyStore: Send + Sync {
    async fn find_item(&self, key: &ItemKey) -> Result<Option<ItemRecord>, StoreError>;

    async fn get_item(&self, id: ItemId) -> Result<Option<ItemRecord>, StoreError>;

    async fn credentials(&self, item: ItemId) -> Result<Vec<CredentialRecord>, StoreError>;

    async fn events(&self, item: ItemId) -> Result<Vec<OwnershipEventRecord>, StoreError>;

    async fn get_event(&self, id: EventId) -> Result<Option<OwnershipEventRecord>, StoreError>;

    /// Insert an item with its first credential. Conflict when the
    /// `(sku, serial)` pair already exists.
    async fn create_item(
        &self,
        item: ItemRecord,
        first: CredentialRecord,
    ) -> Result<(), StoreError>;

    /// Revoke the consumed credential, clear a pending pointer that named
    /// it, insert the next credential and the event, and point the item at
    /// the new certificate.
    async fn commit_claim(&self, commit: ClaimCommit) -> Result<(), StoreError>;

    /// Attach the hand-off document to a live credential and point the
    /// item's pending slot at it. Conflict when the credential is revoked
    /// or another live transfer is pending.
    async fn commit_transfer(
        &self,
        item: ItemId,
        credential: CredentialId,
        handoff: ArtifactRef,
    ) -> Result<(), StoreError>;

    /// Revoke the pending credential and clear the pointer. Conflict when
    /// the pointer no longer names a live `credential`.
    async fn commit_cancel(
        &self,
        item: ItemId,
        credential: CredentialId,
        at: Timestamp,
    ) -> Result<(), StoreError>;

    /// Mark one of `item`'s events disputed, authorized by `credential`.
    /// Conflict when `credential` is no longer live. The flag is never
    /// cleared and the first recorded reason is kept.
    async fn mark_disputed(
        &self,
        item: ItemId,
        credential: CredentialId,
        event: EventId,
        reason: DisputeReason,
    ) -> Result<(), StoreError>;

    async fn snapshot(&self) -> Result<StoreSnapshot, StoreError>;

    /// Cheap reachability check for readiness checks.
    async fn ping(&self) -> Result<(), StoreError>;
}
