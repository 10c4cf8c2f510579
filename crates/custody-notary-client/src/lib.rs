//! # custody-notary-client: Notarization Client
//!
//! Uploads rendered artifacts to a content-addressed, append-only storage
//! network and optionally requests immediate stamping. Returns the content
//! id and a gateway URL.
//!
//! ## Architecture
//!
//! The custody state machine only ever sees the [`Notarizer`] trait.
//! [`ChainletterClient`] talks to the pin-proxy webhook over HTTP;
//! [`MockNotarizer`] keeps everything in memory.
//!
//! A returned content id is not guaranteed to be stamped yet. Consumers
//! that fetch a fresh artifact may see it briefly unavailable and should
//! treat that as transient.
//!
//! Transport failures are retried three times with exponential backoff.
//! Non-2xx responses are returned at once and carry the upstream status.

pub mod client;
pub mod config;
pub mod error;
pub mod notarizer;
pub(crate) mod retry;
pub mod types;

pub use client::ChainletterClient;
pub use config::{ChainletterConfig, ConfigError};
pub use error::NotaryError;
pub use notarizer::{EventStream, MockNotarizer, Notarizer, UploadRecord};
pub use types::{Artifact, CreditScope, FetchedArtifact, UploadReceipt};
