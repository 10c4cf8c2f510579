//! # custody-state: Per-Item Custody State Machine
//!
//! Each tracked item is in exactly one [`CustodyState`]:
//!
//! ```text
//!                 issue                initiate_transfer
//! NoCredentialYet ─────▶ Active(c) ───────────────────▶ PendingTransfer(c)
//!                          ▲  │ claim(c → n)                │     │
//!                          │  └──────▶ Active(n)            │     │ cancel_transfer
//!                          └────────────────────────────────┘     ▼
//!                              claim(c → n)                   Revoked(c)
//! ```
//!
//! The state is derived from stored credential rows plus the item's
//! pending-transfer pointer ([`CustodyState::from_records`]) and every
//! transition is a pure function returning the next state. The caller
//! (the orchestrator in `custody-api`) persists the result and keeps a
//! [`TransitionRecord`] of it.
//!
//! `Revoked` is terminal: cancelling a transfer revokes the credential that
//! authorized the cancellation and no live credential remains.

pub mod custody;

pub use custody::{
    CredentialView, CustodyState, TransitionError, TransitionErrorKind, TransitionKind,
    TransitionRecord,
};
