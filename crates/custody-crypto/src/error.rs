//! # Cryptographic Error Types

use thiserror::Error;

/// Errors from cryptographic operations in `custody-crypto`.
#[derive(Error, Debug)]
pub enum CryptoError {
    /// Argon2 cost parameters were rejected.
    #[error("invalid Argon2 parameters: {0}")]
    InvalidParams(String),

    /// Hashing a freshly issued secret failed.
    #[error("secret hashing failed: {0}")]
    Hash(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_params_display() {
        let err = CryptoError::InvalidParams("memory cost too small".to_string());
        assert_eq!(
            format!("{err}"),
            "invalid Argon2 parameters: memory cost too small"
        );
    }

    #[test]
    fn hash_display() {
        let err = CryptoError::Hash("salt too short".to_string());
        assert!(format!("{err}").contains("salt too short"));
    }
}
