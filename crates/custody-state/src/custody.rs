//! # Custody State
//!
//! The single-active-credential invariant as an explicit tagged state.
//! At most one credential per item is live; it is named by the
//! `Active` / `PendingTransfer` variants and nowhere else.

use custody_core::{CredentialId, Timestamp};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ─── State ───────────────────────────────────────────────────────────

/// Custody state of one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CustodyState {
    /// Item record not yet backed by any credential.
    NoCredentialYet,
    /// One live credential, no transfer in flight.
    Active {
        /// The live credential.
        credential: CredentialId,
    },
    /// The live credential's secret has been published in a hand-off
    /// document awaiting a claim.
    PendingTransfer {
        /// The live credential, also referenced by the pending pointer.
        credential: CredentialId,
    },
    /// Every credential is revoked (terminal).
    Revoked {
        /// The credential revoked last.
        last_credential: CredentialId,
    },
}

impl CustodyState {
    /// Stable upper-case name, as shown in the verify view.
    pub fn name(&self) -> &'static str {
        match self {
            Self::NoCredentialYet => "NO_CREDENTIAL_YET",
            Self::Active { .. } => "ACTIVE",
            Self::PendingTransfer { .. } => "PENDING_TRANSFER",
            Self::Revoked { .. } => "REVOKED",
        }
    }

    /// The live credential, if any.
    pub fn active_credential(&self) -> Option<CredentialId> {
        match self {
            Self::Active { credential } | Self::PendingTransfer { credential } => Some(*credential),
            Self::NoCredentialYet | Self::Revoked { .. } => None,
        }
    }

    /// The credential referenced by the pending-transfer pointer, if any.
    pub fn pending_transfer(&self) -> Option<CredentialId> {
        match self {
            Self::PendingTransfer { credential } => Some(*credential),
            _ => None,
        }
    }

    /// Whether no further transition is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Revoked { .. })
    }

    /// Check that `presented` is the live credential.
    pub fn authorize(&self, presented: CredentialId) -> Result<CredentialId, TransitionError> {
        match self.active_credential() {
            None => Err(TransitionError::NoActiveCredential { state: *self }),
            Some(active) if active != presented => {
                Err(TransitionError::StaleCredential { presented, active })
            }
            Some(active) => Ok(active),
        }
    }

    // ─── Transitions ─────────────────────────────────────────────────

    /// First credential for a freshly created item.
    pub fn issue(self, first: CredentialId) -> Result<Self, TransitionError> {
        match self {
            Self::NoCredentialYet => Ok(Self::Active { credential: first }),
            other => Err(TransitionError::Invalid {
                kind: TransitionKind::Issue,
                from: other,
            }),
        }
    }

    /// Consume the live credential and make `next` live. Clears any
    /// pending transfer.
    pub fn claim(self, presented: CredentialId, next: CredentialId) -> Result<Self, TransitionError> {
        self.authorize(presented)?;
        if next == presented {
            return Err(TransitionError::Invalid {
                kind: TransitionKind::Claim,
                from: self,
            });
        }
        Ok(Self::Active { credential: next })
    }

    /// Point the pending-transfer slot at the live credential. One
    /// in-flight transfer per item.
    pub fn initiate_transfer(self, presented: CredentialId) -> Result<Self, TransitionError> {
        let credential = self.authorize(presented)?;
        match self {
            Self::Active { .. } => Ok(Self::PendingTransfer { credential }),
            Self::PendingTransfer { .. } => Err(TransitionError::TransferAlreadyPending { credential }),
            Self::NoCredentialYet | Self::Revoked { .. } => Err(TransitionError::Invalid {
                kind: TransitionKind::InitiateTransfer,
                from: self,
            }),
        }
    }

    /// Revoke the credential referenced by the pending pointer and clear
    /// the pointer. Leaves the item with no live credential.
    pub fn cancel_transfer(self, presented: CredentialId) -> Result<Self, TransitionError> {
        self.authorize(presented)?;
        match self {
            Self::PendingTransfer { credential } => Ok(Self::Revoked {
                last_credential: credential,
            }),
            Self::Active { .. } => Err(TransitionError::NoPendingTransfer),
            Self::NoCredentialYet | Self::Revoked { .. } => Err(TransitionError::Invalid {
                kind: TransitionKind::CancelTransfer,
                from: self,
            }),
        }
    }

    // ─── Derivation ──────────────────────────────────────────────────

    /// Derive the state from an item's credential rows (in creation order)
    /// and its pending-transfer pointer.
    ///
    /// A pointer at a revoked credential is stale and ignored. A pointer at
    /// a credential that does not belong to the item, or more than one
    /// unrevoked credential, is reported as [`TransitionError::Inconsistent`].
    pub fn from_records<I>(credentials: I, pending: Option<CredentialId>) -> Result<Self, TransitionError>
    where
        I: IntoIterator<Item = CredentialView>,
    {
        let mut last = None;
        let mut active = None;
        let mut pending_seen = pending.is_none();
        let mut pending_live = false;

        for view in credentials {
            if Some(view.id) == pending {
                pending_seen = true;
                pending_live = !view.revoked;
            }
            if !view.revoked {
                if let Some(existing) = active {
                    return Err(TransitionError::Inconsistent(format!(
                        "more than one unrevoked credential: {existing} and {}",
                        view.id
                    )));
                }
                active = Some(view.id);
            }
            last = Some(view.id);
        }

        if !pending_seen {
            return Err(TransitionError::Inconsistent(
                "pending-transfer pointer references a foreign credential".into(),
            ));
        }

        Ok(match (active, last) {
            (Some(credential), _) if pending_live => Self::PendingTransfer { credential },
            (Some(credential), _) => Self::Active { credential },
            (None, Some(last_credential)) => Self::Revoked { last_credential },
            (None, None) => Self::NoCredentialYet,
        })
    }
}

impl std::fmt::Display for CustodyState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// The minimum of a stored credential row needed to derive state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CredentialView {
    pub id: CredentialId,
    pub revoked: bool,
}

/// Which transition was attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    Issue,
    Claim,
    InitiateTransfer,
    CancelTransfer,
}

impl std::fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Issue => "issue",
            Self::Claim => "claim",
            Self::InitiateTransfer => "initiate_transfer",
            Self::CancelTransfer => "cancel_transfer",
        })
    }
}

// ─── Transition Record ───────────────────────────────────────────────

/// One applied custody transition, for the audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub kind: TransitionKind,
    /// State name before the transition.
    pub from_state: String,
    /// State name after the transition.
    pub to_state: String,
    /// When the transition was applied (UTC).
    pub timestamp: Timestamp,
}

impl TransitionRecord {
    pub fn new(kind: TransitionKind, from: CustodyState, to: CustodyState, timestamp: Timestamp) -> Self {
        Self {
            kind,
            from_state: from.name().to_string(),
            to_state: to.name().to_string(),
            timestamp,
        }
    }
}

// ─── Errors ──────────────────────────────────────────────────────────

/// Coarse classification used by callers to map onto their own taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionErrorKind {
    /// The presented credential does not authorize anything.
    Unauthorized,
    /// The state does not admit the requested transition.
    Conflict,
    /// The stored records violate the single-active-credential invariant.
    Corrupt,
}

/// Errors from custody transitions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    /// No live credential exists.
    #[error("item has no active credential (state {state})")]
    NoActiveCredential {
        /// State at the time of the attempt.
        state: CustodyState,
    },

    /// The presented credential is not the live one.
    #[error("{presented} is not the active credential")]
    StaleCredential {
        /// What was presented.
        presented: CredentialId,
        /// What is live.
        active: CredentialId,
    },

    /// A transfer is already in flight for this item.
    #[error("a transfer is already pending under {credential}")]
    TransferAlreadyPending {
        /// The credential whose secret was published.
        credential: CredentialId,
    },

    /// Cancellation requested with an empty pending pointer.
    #[error("no transfer is pending")]
    NoPendingTransfer,

    /// Transition not admitted from this state.
    #[error("invalid custody transition {kind} from {from}")]
    Invalid {
        /// Attempted transition.
        kind: TransitionKind,
        /// State it was attempted from.
        from: CustodyState,
    },

    /// Stored records are inconsistent.
    #[error("inconsistent custody records: {0}")]
    Inconsistent(String),
}

impl TransitionError {
    /// Coarse classification of this error.
    pub fn kind(&self) -> TransitionErrorKind {
        match self {
            Self::NoActiveCredential { .. } | Self::StaleCredential { .. } => {
                TransitionErrorKind::Unauthorized
            }
            Self::TransferAlreadyPending { .. } | Self::NoPendingTransfer | Self::Invalid { .. } => {
                TransitionErrorKind::Conflict
            }
            Self::Inconsistent(_) => TransitionErrorKind::Corrupt,
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────
