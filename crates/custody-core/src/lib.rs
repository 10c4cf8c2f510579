//! # custody-core: Foundational Types for the Custody Stack
//!
//! Every other crate in the workspace depends on `custody-core`; it depends
//! on nothing internal. It defines the domain primitives the custody state
//! machine is expressed in.
//!
//! ## Key Design Principles
//!
//! 1. **Newtype identifiers.** `ItemId`, `CredentialId`, `EventId` wrap UUIDs
//!    so a credential id can never be passed where an event id is expected.
//!
//! 2. **Validated item key.** An item is identified by the immutable
//!    `(sku, serial)` pair; [`ItemKey`] can only be built through a
//!    validating constructor.
//!
//! 3. **Closed enumerations.** Dispute reasons and visibility channels are
//!    enums with exhaustive `match`; strings are parsed at the boundary.
//!
//! 4. **UTC-only timestamps** truncated to seconds.
//!
//! ## Crate Policy
//!
//! - No I/O, no async.
//! - No `.unwrap()` outside tests.

pub mod cid;
pub mod error;
pub mod identity;
pub mod item;
pub mod reason;
pub mod temporal;
pub mod text;
pub mod visibility;

pub use cid::ContentId;
pub use error::ValidationError;
pub use identity::{CredentialId, EventId, ItemId};
pub use item::ItemKey;
pub use reason::DisputeReason;
pub use temporal::Timestamp;
pub use text::{MAX_EMAIL_LEN, MAX_TEXT_LEN};
pub use visibility::Visibility;
