//! # custody-crypto: Cryptographic Primitives for the Custody Stack
//!
//! - **Secret Service.** [`SecretService`] issues unguessable one-time
//!   secrets and verifies presented plaintexts against a stored one-way
//!   hash + salt. The transition logic only ever sees this trait, so the
//!   hashing primitive can be swapped without touching it.
//!   [`Argon2SecretService`] is the production implementation.
//! - **Chain digests.** SHA-256 over attestation chain text.
//! - **Serial generation.** Uniform `CL`-prefixed serials from the OS RNG.
//!
//! ## Crate Policy
//!
//! - Plaintext secrets live only in [`PlainSecret`], which zeroizes on drop
//!   and never prints its contents.
//! - `verify` never errors; every malformed input is a plain `false`.

pub mod digest;
pub mod error;
pub mod secret;
pub mod serial;

pub use digest::sha256_hex;
pub use error::CryptoError;
pub use secret::{
    Argon2SecretService, ArgonCost, IssuedSecret, PlainSecret, SecretDigest, SecretService,
};
pub use serial::generate_serial;
