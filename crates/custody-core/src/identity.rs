//! # Domain Identity Newtypes
//!
//! Newtype wrappers for the three record identifiers of the custody data
//! model. Type-level distinction prevents passing a credential id where an
//! ownership-event id is expected.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Create a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wrap an existing UUID (e.g. loaded from the database).
            pub fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            /// Access the underlying UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            /// Consume the identifier, returning the UUID.
            pub fn into_uuid(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!($prefix, ":{}"), self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }
    };
}

uuid_id!(
    /// Identifier of a tracked physical item.
    ItemId,
    "item"
);

uuid_id!(
    /// Identifier of one generation of an item's custody secret.
    CredentialId,
    "credential"
);

uuid_id!(
    /// Identifier of an ownership event (a successful claim).
    EventId,
    "event"
);
