//! # Secret Service
//!
//! Every item carries exactly one live credential whose plaintext secret
//! authorizes the next custody transition. The plaintext is handed out once
//! and never persisted; the store only keeps a salted one-way hash.
//!
//! ## Hash format
//!
//! [`Argon2SecretService`] stores the PHC string produced by Argon2id
//! (`$argon2id$v=19$m=..,t=..,p=..$<salt>$<hash>`) together with the salt
//! as a separate column. Cost parameters travel inside the PHC string, so
//! secrets hashed under older parameters keep verifying after a change.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use uuid::Uuid;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::CryptoError;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A plaintext secret. Zeroized on drop; `Debug` never shows the value.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct PlainSecret(String);

impl PlainSecret {
    /// Wrap a plaintext secret.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the plaintext. Call sites should be few and obvious.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for PlainSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PlainSecret([REDACTED])")
    }
}

/// One-way hash + salt of a secret, as persisted on a credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretDigest {
    /// PHC-format hash string.
    pub hash: String,
    /// Salt used to produce `hash`.
    pub salt: String,
}

/// Output of [`SecretService::issue`]: the plaintext (shown once) and the
/// digest to store.
#[derive(Debug)]
pub struct IssuedSecret {
    pub plaintext: PlainSecret,
    pub digest: SecretDigest,
}

/// Issue and verify one-time custody secrets.
///
/// Implementations must be `Send + Sync`; the orchestrator shares one
/// instance behind an `Arc` and calls it from blocking worker threads.
pub trait SecretService: Send + Sync {
    /// Generate a fresh unguessable secret and its storable digest.
    fn issue(&self) -> Result<IssuedSecret, CryptoError>;

    /// Check `plaintext` against a stored digest. Malformed digests,
    /// mismatched salts, and wrong secrets all yield `false`.
    fn verify(&self, plaintext: &str, digest: &SecretDigest) -> bool;
}

// ---------------------------------------------------------------------------
// Argon2id implementation
// ---------------------------------------------------------------------------

/// Argon2 cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArgonCost {
    /// Memory cost in KiB.
    pub memory_kib: u32,
    /// Number of passes.
    pub iterations: u32,
    /// Degree of parallelism.
    pub parallelism: u32,
}

impl ArgonCost {
    /// OWASP-recommended Argon2id baseline (19 MiB, 2 passes, 1 lane).
    pub const RECOMMENDED: Self = Self {
        memory_kib: Params::DEFAULT_M_COST,
        iterations: Params::DEFAULT_T_COST,
        parallelism: Params::DEFAULT_P_COST,
    };

    /// Cheapest accepted cost. For tests only.
    pub const MINIMAL: Self = Self {
        memory_kib: 256,
        iterations: 1,
        parallelism: 1,
    };

    /// Read `CUSTODY_ARGON2_MEMORY_KIB`, `CUSTODY_ARGON2_ITERATIONS` and
    /// `CUSTODY_ARGON2_PARALLELISM`, falling back to [`Self::RECOMMENDED`]
    /// per field.
    pub fn from_env() -> Self {
        fn var(name: &str, default: u32) -> u32 {
            std::env::var(name)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        }
        Self {
            memory_kib: var("CUSTODY_ARGON2_MEMORY_KIB", Self::RECOMMENDED.memory_kib),
            iterations: var("CUSTODY_ARGON2_ITERATIONS", Self::RECOMMENDED.iterations),
            parallelism: var("CUSTODY_ARGON2_PARALLELISM", Self::RECOMMENDED.parallelism),
        }
    }
}

impl Default for ArgonCost {
    fn default() -> Self {
        Self::RECOMMENDED
    }
}

/// [`SecretService`] backed by Argon2id with a random per-secret salt.
///
/// Secrets are random UUID v4 strings (122 bits of entropy from the OS RNG).
#[derive(Debug, Clone)]
pub struct Argon2SecretService {
    params: Params,
}

impl Argon2SecretService {
    /// Build a service with the given cost.
    pub fn new(cost: ArgonCost) -> Result<Self, CryptoError> {
        let params = Params::new(cost.memory_kib, cost.iterations, cost.parallelism, None)
            .map_err(|e| CryptoError::InvalidParams(e.to_string()))?;
        Ok(Self { params })
    }

    fn hasher(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash an arbitrary plaintext under a fresh salt.
    pub fn hash(&self, plaintext: &str) -> Result<SecretDigest, CryptoError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .hasher()
            .hash_password(plaintext.as_bytes(), &salt)
            .map_err(|e| CryptoError::Hash(e.to_string()))?
            .to_string();
        Ok(SecretDigest {
            hash,
            salt: salt.as_str().to_string(),
        })
    }
}

impl SecretService for Argon2SecretService {
    fn issue(&self) -> Result<IssuedSecret, CryptoError> {
        let plaintext = PlainSecret::new(Uuid::new_v4().to_string());
        let digest = self.hash(plaintext.expose())?;
        Ok(IssuedSecret { plaintext, digest })
    }

    fn verify(&self, plaintext: &str, digest: &SecretDigest) -> bool {
        let Ok(parsed) = PasswordHash::new(&digest.hash) else {
            return false;
        };
        // The stored salt column must agree with the salt inside the PHC string.
        let salt_matches = parsed
            .salt
            .map(|s| bool::from(s.as_str().as_bytes().ct_eq(digest.salt.as_bytes())))
            .unwrap_or(false);
        if !salt_matches {
            return false;
        }
        self.hasher()
            .verify_password(plaintext.as_bytes(), &parsed)
            .is_ok()
    }
}
