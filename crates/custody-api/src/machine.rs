//! # Custody State Machine
//!
//! Orchestrates every custody transition in the same order:
//!
//! 1. validate inputs,
//! 2. take the item's lock,
//! 3. load the item and verify the presented secret against its active
//!    credential,
//! 4. render and upload artifacts,
//! 5. commit the store mutation.
//!
//! The store is only touched after every upload has succeeded, so a
//! notarization failure leaves no partial state. Commits re-check their
//! preconditions (see [`CustodyStore`]); a commit that loses a race comes
//! back as [`CustodyError::ConflictingTransition`].
//!
//! ## Cancel lockout
//!
//! `cancel_transfer` revokes the credential whose secret authorized it. The
//! item ends in [`CustodyState::Revoked`] with no live credential and every
//! later secret-gated transition fails with `InvalidCredential`. This is
//! logged at `warn` and shown as `REVOKED` in the verify view.

use std::collections::HashSet;
use std::sync::Arc;

use custody_core::{
    text, ContentId, DisputeReason, EventId, ItemId, ItemKey, Timestamp, ValidationError,
    MAX_EMAIL_LEN, MAX_TEXT_LEN,
};
use custody_crypto::{CryptoError, IssuedSecret, PlainSecret, SecretDigest, SecretService};
use custody_docs::{
    render_attestation, render_cancellation_notice, render_certificate, render_handoff,
    ArtifactKind, AttestationInput, CancellationInput, CertificateInput, ChainEntry, DocumentError,
    HandoffInput,
};
use custody_notary_client::{Artifact, Notarizer, NotaryError};
use custody_state::{
    CustodyState, TransitionError, TransitionErrorKind, TransitionKind, TransitionRecord,
};
use thiserror::Error;

use crate::locks::ItemLocks;
use crate::store::{
    derive_state, ArtifactRef, ClaimCommit, CredentialRecord, CustodyStore, ItemRecord,
    OwnershipEventRecord, StoreError, StoreSnapshot,
};

// -- Errors -------------------------------------------------------------------

/// Outcome taxonomy of a custody transition.
#[derive(Error, Debug)]
pub enum CustodyError {
    /// Unknown item or event.
    #[error("{0} not found")]
    NotFound(String),

    /// Secret fails verification or the item has no live credential.
    #[error("invalid credential")]
    InvalidCredential,

    /// The state does not admit the transition, or a concurrent
    /// transition won the race.
    #[error("conflicting transition: {0}")]
    ConflictingTransition(String),

    /// Upload or stamping failed. Nothing was persisted.
    #[error("notarization failed: {message}")]
    NotarizationFailure {
        upstream_status: Option<u16>,
        message: String,
    },

    /// No notarizer is configured.
    #[error("notarization is not configured")]
    NotaryNotConfigured,

    /// Malformed input.
    #[error("{0}")]
    ValidationFailure(String),

    /// Persistence fault.
    #[error("store error: {0}")]
    Store(StoreError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for CustodyError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => Self::NotFound(what),
            StoreError::Conflict(msg) => Self::ConflictingTransition(msg),
            other => Self::Store(other),
        }
    }
}

impl From<TransitionError> for CustodyError {
    fn from(err: TransitionError) -> Self {
        match err.kind() {
            TransitionErrorKind::Unauthorized => Self::InvalidCredential,
            TransitionErrorKind::Conflict => Self::ConflictingTransition(err.to_string()),
            TransitionErrorKind::Corrupt => Self::Internal(err.to_string()),
        }
    }
}

impl From<ValidationError> for CustodyError {
    fn from(err: ValidationError) -> Self {
        Self::ValidationFailure(err.to_string())
    }
}

impl From<NotaryError> for CustodyError {
    fn from(err: NotaryError) -> Self {
        Self::NotarizationFailure {
            upstream_status: err.upstream_status(),
            message: err.to_string(),
        }
    }
}

impl From<CryptoError> for CustodyError {
    fn from(err: CryptoError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<DocumentError> for CustodyError {
    fn from(err: DocumentError) -> Self {
        Self::Internal(err.to_string())
    }
}

// -- Inputs and outputs -------------------------------------------------------

/// Issuer input for creating one item.
#[derive(Debug, Clone)]
pub struct NewItem {
    pub key: ItemKey,
    pub item_name: Option<String>,
    pub item_description: Option<String>,
    /// Photo reference in any form [`ContentId::extract`] accepts.
    pub photo: Option<String>,
    /// Initial owner printed on the certificate.
    pub owner_name: Option<String>,
    pub created_by: Option<String>,
    pub stamp_public: bool,
    pub stamp_private: bool,
}

/// A [`NewItem`] whose fields passed validation.
struct PreparedItem {
    key: ItemKey,
    item_name: Option<String>,
    item_description: Option<String>,
    photo_cid: Option<ContentId>,
    owner_name: Option<String>,
    created_by: Option<String>,
    stamp_public: bool,
    stamp_private: bool,
}

impl PreparedItem {
    fn validate(new: NewItem) -> Result<Self, CustodyError> {
        let item_name = text::optional("item_name", new.item_name.as_deref(), MAX_TEXT_LEN)?;
        let item_description = text::optional(
            "item_description",
            new.item_description.as_deref(),
            MAX_TEXT_LEN,
        )?;
        let owner_name = text::optional("owner_name", new.owner_name.as_deref(), MAX_TEXT_LEN)?;
        let created_by = text::optional("created_by", new.created_by.as_deref(), MAX_EMAIL_LEN)?;
        let photo_cid = match new.photo.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(
                ContentId::extract(raw)
                    .ok_or_else(|| ValidationError::InvalidContentId(raw.to_string()))?,
            ),
        };
        Ok(Self {
            key: new.key,
            item_name,
            item_description,
            photo_cid,
            owner_name,
            created_by,
            stamp_public: new.stamp_public,
            stamp_private: new.stamp_private,
        })
    }
}

/// Uploaded document bodies of a created item, with their stored refs.
struct CreatedDocuments {
    at: Timestamp,
    certificate: (String, ArtifactRef),
    handoff: (String, ArtifactRef),
}

/// Result of a successful create.
#[derive(Debug)]
pub struct Created {
    pub item: ItemRecord,
    /// C0's plaintext. Shown once.
    pub secret: PlainSecret,
    pub certificate: ArtifactRef,
    pub handoff: ArtifactRef,
    pub transition: TransitionRecord,
}

/// Result of a successful claim.
#[derive(Debug)]
pub struct Claimed {
    pub event: OwnershipEventRecord,
    /// The rotated secret. Shown once.
    pub secret: PlainSecret,
    pub certificate: ArtifactRef,
    /// Locally rendered hand-off for the item's first claim. Not uploaded.
    pub handoff_document: Option<String>,
    pub state: CustodyState,
    pub transition: TransitionRecord,
}

#[derive(Debug)]
pub struct TransferInitiated {
    pub handoff: ArtifactRef,
    pub state: CustodyState,
    pub transition: TransitionRecord,
}

#[derive(Debug)]
pub struct TransferCancelled {
    pub notice: ArtifactRef,
    pub state: CustodyState,
    pub transition: TransitionRecord,
}

#[derive(Debug)]
pub struct Attested {
    pub artifact: ArtifactRef,
    pub chain_digest: String,
    pub text: String,
}

/// Everything the public verify page shows about one item.
#[derive(Debug, Clone)]
pub struct ItemView {
    pub item: ItemRecord,
    pub state: CustodyState,
    pub events: Vec<OwnershipEventRecord>,
}

/// An item together with its stored credentials and derived state, after
/// the presented secret verified against the active credential.
struct Authorized {
    item: ItemRecord,
    state: CustodyState,
    active: CredentialRecord,
}

// -- Machine ------------------------------------------------------------------

/// The custody orchestrator. Cheap to clone.
#[derive(Clone)]
pub struct CustodyMachine {
    store: Arc<dyn CustodyStore>,
    secrets: Arc<dyn SecretService>,
    notarizer: Option<Arc<dyn Notarizer>>,
    locks: ItemLocks,
    verify_url: Option<String>,
}

impl std::fmt::Debug for CustodyMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustodyMachine")
            .field(
                "notarizer",
                &self.notarizer.as_ref().map(|n| n.adapter_name().to_string()),
            )
            .field("verify_url", &self.verify_url)
            .finish_non_exhaustive()
    }
}

impl CustodyMachine {
    pub fn new(
        store: Arc<dyn CustodyStore>,
        secrets: Arc<dyn SecretService>,
        notarizer: Option<Arc<dyn Notarizer>>,
        verify_url: Option<String>,
    ) -> Self {
        Self {
            store,
            secrets,
            notarizer,
            locks: ItemLocks::new(),
            verify_url: verify_url.filter(|u| !u.trim().is_empty()),
        }
    }

    pub fn store(&self) -> &Arc<dyn CustodyStore> {
        &self.store
    }

    pub fn notarizer(&self) -> Option<&Arc<dyn Notarizer>> {
        self.notarizer.as_ref()
    }

    // -- Create ---------------------------------------------------------------

    /// Create an item with its first credential. Both documents are
    /// uploaded before anything is persisted.
    pub async fn create(&self, new: NewItem) -> Result<Created, CustodyError> {
        let prepared = PreparedItem::validate(new)?;
        let (created, _) = self.create_prepared(prepared).await?;
        Ok(created)
    }

    /// Create items one after another. Failures are per item; earlier
    /// items stay created.
    ///
    /// Every item is validated, and checked against the store and the rest
    /// of the batch, before anything is uploaded. Only the last item
    /// expected to succeed notarizes immediately on each channel. If that
    /// item still fails, the documents of the last item that was created
    /// are uploaded again with stamping requested.
    pub async fn create_batch(&self, items: Vec<NewItem>) -> Vec<Result<Created, CustodyError>> {
        let mut seen = HashSet::new();
        let mut planned = Vec::with_capacity(items.len());
        for item in items {
            let plan = PreparedItem::validate(item).and_then(|prepared| {
                if seen.insert(prepared.key.clone()) {
                    Ok(prepared)
                } else {
                    Err(CustodyError::ConflictingTransition(format!(
                        "item {} appears more than once in the batch",
                        prepared.key
                    )))
                }
            });
            let plan = match plan {
                Ok(prepared) => match self.store.find_item(&prepared.key).await {
                    Ok(None) => Ok(prepared),
                    Ok(Some(_)) => Err(CustodyError::ConflictingTransition(format!(
                        "item {} already exists",
                        prepared.key
                    ))),
                    Err(e) => Err(e.into()),
                },
                Err(e) => Err(e),
            };
            planned.push(plan);
        }

        let stamp_at = planned.iter().rposition(Result::is_ok);
        let mut last_created: Option<(ItemKey, CreatedDocuments, bool)> = None;
        let mut results = Vec::with_capacity(planned.len());
        for (index, plan) in planned.into_iter().enumerate() {
            let stamp = stamp_at == Some(index);
            let result = match plan {
                Ok(mut prepared) => {
                    prepared.stamp_public = stamp;
                    prepared.stamp_private = stamp;
                    self.create_prepared(prepared).await.map(|(created, documents)| {
                        last_created = Some((created.item.key.clone(), documents, stamp));
                        created
                    })
                }
                Err(e) => Err(e),
            };
            if let Err(err) = &result {
                tracing::warn!(index, error = %err, "batch item failed");
            }
            results.push(result);
        }

        if let Some((key, documents, false)) = last_created {
            self.restamp(&key, documents).await;
        }
        results
    }

    async fn create_prepared(
        &self,
        new: PreparedItem,
    ) -> Result<(Created, CreatedDocuments), CustodyError> {
        let key = new.key;

        let _guard = self.locks.acquire(&key).await;
        if self.store.find_item(&key).await?.is_some() {
            return Err(CustodyError::ConflictingTransition(format!(
                "item {key} already exists"
            )));
        }

        let issued = self.issue_secret().await?;
        let now = Timestamp::now();

        let certificate_svg = render_certificate(&CertificateInput {
            sku: key.sku(),
            serial: key.serial(),
            item_name: new.item_name.as_deref(),
            item_description: new.item_description.as_deref(),
            owner_name: new.owner_name.as_deref(),
            issued_on: now,
            verify_url: self.verify_url.as_deref(),
        });
        let handoff_svg = render_handoff(&HandoffInput {
            sku: key.sku(),
            serial: key.serial(),
            owner_name: new.owner_name.as_deref(),
            secret: issued.plaintext.expose(),
            issued_on: now,
            verify_url: self.verify_url.as_deref(),
        });

        let certificate = self
            .upload(ArtifactKind::Certificate, &key, now, certificate_svg.clone(), new.stamp_public)
            .await?;
        let handoff = self
            .upload(ArtifactKind::Handoff, &key, now, handoff_svg.clone(), new.stamp_private)
            .await?;

        let item = ItemRecord {
            id: ItemId::new(),
            key: key.clone(),
            item_name: new.item_name,
            item_description: new.item_description,
            photo_cid: new.photo_cid,
            certificate: Some(certificate.clone()),
            pending_credential: None,
            created_by: new.created_by,
            created_at: now,
        };
        let mut first = CredentialRecord::issued(item.id, issued.digest, now);
        first.handoff = Some(handoff.clone());
        let state = CustodyState::NoCredentialYet.issue(first.id)?;
        let transition =
            TransitionRecord::new(TransitionKind::Issue, CustodyState::NoCredentialYet, state, now);

        self.store.create_item(item.clone(), first).await?;

        tracing::info!(
            sku = key.sku(),
            serial = key.serial(),
            item_id = %item.id,
            certificate = %certificate.cid,
            "item created"
        );
        let created = Created {
            item,
            secret: issued.plaintext,
            certificate: certificate.clone(),
            handoff: handoff.clone(),
            transition,
        };
        let documents = CreatedDocuments {
            at: now,
            certificate: (certificate_svg, certificate),
            handoff: (handoff_svg, handoff),
        };
        Ok((created, documents))
    }

    /// Upload a created item's documents again with stamping requested.
    /// The bytes are unchanged, so the content ids are too.
    async fn restamp(&self, key: &ItemKey, documents: CreatedDocuments) {
        for (kind, (body, stored)) in [
            (ArtifactKind::Certificate, documents.certificate),
            (ArtifactKind::Handoff, documents.handoff),
        ] {
            match self.upload(kind, key, documents.at, body, true).await {
                Ok(stamped) if stamped.cid != stored.cid => tracing::warn!(
                    sku = key.sku(),
                    serial = key.serial(),
                    stored = %stored.cid,
                    stamped = %stamped.cid,
                    "re-stamped artifact has a different content id"
                ),
                Ok(_) => tracing::info!(
                    sku = key.sku(),
                    serial = key.serial(),
                    visibility = %kind.visibility(),
                    "batch stamped on last created item"
                ),
                Err(err) => tracing::error!(
                    sku = key.sku(),
                    serial = key.serial(),
                    error = %err,
                    "batch left unstamped"
                ),
            }
        }
    }

    // -- Claim ----------------------------------------------------------------

    /// Consume the active credential, record the claim, and hand back a
    /// fresh secret.
    pub async fn claim(
        &self,
        key: &ItemKey,
        secret: &PlainSecret,
        claimant_name: &str,
    ) -> Result<Claimed, CustodyError> {
        let claimant = text::required("claimant_name", claimant_name, MAX_TEXT_LEN)?;

        let _guard = self.locks.acquire(key).await;
        let auth = self.authorize(key, secret).await?;
        let first_event = self.store.events(auth.item.id).await?.is_empty();

        let issued = self.issue_secret().await?;
        let now = Timestamp::now();
        let next = CredentialRecord::issued(auth.item.id, issued.digest.clone(), now);
        let state = auth.state.claim(auth.active.id, next.id)?;

        let certificate_svg = render_certificate(&CertificateInput {
            sku: key.sku(),
            serial: key.serial(),
            item_name: auth.item.item_name.as_deref(),
            item_description: auth.item.item_description.as_deref(),
            owner_name: Some(&claimant),
            issued_on: now,
            verify_url: self.verify_url.as_deref(),
        });
        let certificate = self
            .upload(ArtifactKind::Registration, key, now, certificate_svg, true)
            .await?;

        let event = OwnershipEventRecord {
            id: EventId::new(),
            item_id: auth.item.id,
            credential_id: auth.active.id,
            claimant_name: claimant.clone(),
            certificate: Some(certificate.clone()),
            disputed: false,
            dispute_reason: None,
            created_at: now,
        };
        self.store
            .commit_claim(ClaimCommit {
                item_id: auth.item.id,
                consumed: auth.active.id,
                next,
                event: event.clone(),
                certificate: certificate.clone(),
            })
            .await?;

        let handoff_document = first_event.then(|| {
            render_handoff(&HandoffInput {
                sku: key.sku(),
                serial: key.serial(),
                owner_name: Some(&claimant),
                secret: issued.plaintext.expose(),
                issued_on: now,
                verify_url: self.verify_url.as_deref(),
            })
        });

        tracing::info!(
            sku = key.sku(),
            serial = key.serial(),
            event_id = %event.id,
            first_event,
            from = %auth.state,
            "ownership claimed"
        );
        Ok(Claimed {
            event,
            secret: issued.plaintext,
            certificate,
            handoff_document,
            state,
            transition: TransitionRecord::new(TransitionKind::Claim, auth.state, state, now),
        })
    }

    // -- Transfers ------------------------------------------------------------

    /// Publish a hand-off document carrying the current secret and mark the
    /// transfer pending. The secret is not rotated.
    pub async fn initiate_transfer(
        &self,
        key: &ItemKey,
        secret: &PlainSecret,
        new_owner_name: Option<&str>,
    ) -> Result<TransferInitiated, CustodyError> {
        let new_owner = text::optional("new_owner_name", new_owner_name, MAX_TEXT_LEN)?;

        let _guard = self.locks.acquire(key).await;
        let auth = self.authorize(key, secret).await?;
        let state = auth.state.initiate_transfer(auth.active.id)?;

        let now = Timestamp::now();
        let handoff_svg = render_handoff(&HandoffInput {
            sku: key.sku(),
            serial: key.serial(),
            owner_name: new_owner.as_deref(),
            secret: secret.expose(),
            issued_on: now,
            verify_url: self.verify_url.as_deref(),
        });
        let handoff = self
            .upload(ArtifactKind::Handoff, key, now, handoff_svg, true)
            .await?;

        self.store
            .commit_transfer(auth.item.id, auth.active.id, handoff.clone())
            .await?;

        tracing::info!(
            sku = key.sku(),
            serial = key.serial(),
            item_id = %auth.item.id,
            from = %auth.state,
            "transfer initiated"
        );
        Ok(TransferInitiated {
            handoff,
            state,
            transition: TransitionRecord::new(TransitionKind::InitiateTransfer, auth.state, state, now),
        })
    }

    /// Revoke the pending credential and publish a cancellation notice.
    pub async fn cancel_transfer(
        &self,
        key: &ItemKey,
        secret: &PlainSecret,
    ) -> Result<TransferCancelled, CustodyError> {
        let _guard = self.locks.acquire(key).await;
        let auth = self.authorize(key, secret).await?;
        let state = auth.state.cancel_transfer(auth.active.id)?;

        let now = Timestamp::now();
        let notice_svg = render_cancellation_notice(&CancellationInput {
            sku: key.sku(),
            serial: key.serial(),
            cancelled_at: now,
        });
        let notice = self
            .upload(ArtifactKind::CancellationNotice, key, now, notice_svg, true)
            .await?;

        self.store
            .commit_cancel(auth.item.id, auth.active.id, now)
            .await?;

        tracing::warn!(
            sku = key.sku(),
            serial = key.serial(),
            item_id = %auth.item.id,
            "transfer cancelled; item has no active credential until re-issued"
        );
        Ok(TransferCancelled {
            notice,
            state,
            transition: TransitionRecord::new(TransitionKind::CancelTransfer, auth.state, state, now),
        })
    }

    // -- Events ---------------------------------------------------------------

    /// Mark an ownership event disputed. Authorized by the item's current
    /// active credential, not the one that produced the event.
    pub async fn dispute(
        &self,
        event_id: EventId,
        secret: &PlainSecret,
        reason: &str,
    ) -> Result<OwnershipEventRecord, CustodyError> {
        let reason: DisputeReason = reason.trim().parse()?;
        let key = self.event_item_key(event_id).await?;

        let _guard = self.locks.acquire(&key).await;
        let auth = self.authorize(&key, secret).await?;
        self.store
            .mark_disputed(auth.item.id, auth.active.id, event_id, reason)
            .await?;

        tracing::info!(event_id = %event_id, reason = %reason, "ownership event disputed");
        self.store
            .get_event(event_id)
            .await?
            .ok_or_else(|| CustodyError::NotFound(format!("event {event_id}")))
    }

    /// Publish a dated attestation of the item's full ownership chain with
    /// `event_id` marked.
    pub async fn attest(
        &self,
        event_id: EventId,
        secret: &PlainSecret,
        passphrase: &str,
    ) -> Result<Attested, CustodyError> {
        let passphrase = text::required("passphrase", passphrase, MAX_TEXT_LEN)?;
        let key = self.event_item_key(event_id).await?;

        let _guard = self.locks.acquire(&key).await;
        let auth = self.authorize(&key, secret).await?;
        if passphrase == secret.expose().trim() {
            return Err(CustodyError::ValidationFailure(
                "passphrase must differ from the secret".into(),
            ));
        }

        let chain: Vec<ChainEntry> = self
            .store
            .events(auth.item.id)
            .await?
            .into_iter()
            .map(|e| ChainEntry {
                event_id: e.id,
                claimant: e.claimant_name,
                claimed_at: e.created_at,
                certificate_cid: e.certificate.map(|a| a.cid.as_str().to_string()),
                disputed: e.disputed,
                dispute_reason: e.dispute_reason,
            })
            .collect();

        let now = Timestamp::now();
        let attestation = render_attestation(&AttestationInput {
            item: &key,
            chain: &chain,
            target: event_id,
            passphrase: &passphrase,
            issued_at: now,
        })?;
        let artifact = self
            .upload(ArtifactKind::Attestation, &key, now, attestation.text.clone(), true)
            .await?;

        tracing::info!(
            sku = key.sku(),
            serial = key.serial(),
            event_id = %event_id,
            chain_sha256 = %attestation.chain_digest,
            "chain attested"
        );
        Ok(Attested {
            artifact,
            chain_digest: attestation.chain_digest,
            text: attestation.text,
        })
    }

    // -- Reads ----------------------------------------------------------------

    /// Public view of an item.
    pub async fn verify_view(&self, key: &ItemKey) -> Result<ItemView, CustodyError> {
        let item = self
            .store
            .find_item(key)
            .await?
            .ok_or_else(|| CustodyError::NotFound(format!("item {key}")))?;
        let credentials = self.store.credentials(item.id).await?;
        let state = derive_state(&item, &credentials)?;
        let events = self.store.events(item.id).await?;
        Ok(ItemView {
            item,
            state,
            events,
        })
    }

    /// Full store dump.
    pub async fn audit(&self) -> Result<StoreSnapshot, CustodyError> {
        Ok(self.store.snapshot().await?)
    }

    // -- Helpers --------------------------------------------------------------

    async fn event_item_key(&self, event_id: EventId) -> Result<ItemKey, CustodyError> {
        let event = self
            .store
            .get_event(event_id)
            .await?
            .ok_or_else(|| CustodyError::NotFound(format!("event {event_id}")))?;
        let item = self
            .store
            .get_item(event.item_id)
            .await?
            .ok_or_else(|| CustodyError::NotFound(format!("item {}", event.item_id)))?;
        Ok(item.key)
    }

    /// Load the item and check `secret` against its active credential.
    /// Must run under the item's lock.
    async fn authorize(
        &self,
        key: &ItemKey,
        secret: &PlainSecret,
    ) -> Result<Authorized, CustodyError> {
        let item = self
            .store
            .find_item(key)
            .await?
            .ok_or_else(|| CustodyError::NotFound(format!("item {key}")))?;
        let credentials = self.store.credentials(item.id).await?;
        let state = derive_state(&item, &credentials)?;

        let Some(active_id) = state.active_credential() else {
            tracing::warn!(sku = key.sku(), serial = key.serial(), state = %state, "no active credential");
            return Err(CustodyError::InvalidCredential);
        };
        let active = credentials
            .into_iter()
            .find(|c| c.id == active_id)
            .ok_or_else(|| CustodyError::Internal(format!("active credential {active_id} missing")))?;

        if !self.verify_secret(secret, &active.digest).await? {
            tracing::warn!(sku = key.sku(), serial = key.serial(), "secret verification failed");
            return Err(CustodyError::InvalidCredential);
        }
        state.authorize(active.id)?;

        Ok(Authorized {
            item,
            state,
            active,
        })
    }

    async fn issue_secret(&self) -> Result<IssuedSecret, CustodyError> {
        let secrets = Arc::clone(&self.secrets);
        tokio::task::spawn_blocking(move || secrets.issue())
            .await
            .map_err(|e| CustodyError::Internal(format!("secret issue task failed: {e}")))?
            .map_err(CustodyError::from)
    }

    async fn verify_secret(
        &self,
        secret: &PlainSecret,
        digest: &SecretDigest,
    ) -> Result<bool, CustodyError> {
        let secrets = Arc::clone(&self.secrets);
        let secret = secret.clone();
        let digest = digest.clone();
        tokio::task::spawn_blocking(move || secrets.verify(secret.expose(), &digest))
            .await
            .map_err(|e| CustodyError::Internal(format!("secret verify task failed: {e}")))
    }

    async fn upload(
        &self,
        kind: ArtifactKind,
        key: &ItemKey,
        at: Timestamp,
        body: String,
        notarize_now: bool,
    ) -> Result<ArtifactRef, CustodyError> {
        let notarizer = self
            .notarizer
            .as_ref()
            .ok_or(CustodyError::NotaryNotConfigured)?;
        let artifact = Artifact::new(
            kind.filename(key.sku(), key.serial(), at),
            kind.content_type(),
            body.into_bytes(),
            kind.visibility(),
        );
        let receipt = notarizer.upload(artifact, notarize_now).await.map_err(|e| {
            tracing::error!(
                sku = key.sku(),
                serial = key.serial(),
                visibility = %kind.visibility(),
                error = %e,
                "artifact upload failed"
            );
            CustodyError::from(e)
        })?;
        Ok(ArtifactRef {
            cid: receipt.cid,
            url: receipt.url,
        })
    }
}
