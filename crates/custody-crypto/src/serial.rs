//! Serial-number generation for issuers who do not bring their own.

use rand_core::{OsRng, RngCore};

/// Prefix of every generated serial.
pub const SERIAL_PREFIX: &str = "CL";

/// Number of random characters after the prefix.
pub const SERIAL_RANDOM_LEN: usize = 10;

const ALPHABET: &[u8; 36] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Largest multiple of 36 that fits in a byte; bytes at or above it are
/// rejected so every character is equally likely.
const REJECT_AT: u8 = 252;

/// Generate `CL` followed by 10 characters drawn uniformly from `[A-Z0-9]`.
pub fn generate_serial() -> String {
    generate_serial_with(&mut OsRng)
}

/// [`generate_serial`] over a caller-provided RNG.
pub fn generate_serial_with<R: RngCore>(rng: &mut R) -> String {
    let mut out = String::with_capacity(SERIAL_PREFIX.len() + SERIAL_RANDOM_LEN);
    out.push_str(SERIAL_PREFIX);
    let mut buf = [0u8; 16];
    while out.len() < SERIAL_PREFIX.len() + SERIAL_RANDOM_LEN {
        rng.fill_bytes(&mut buf);
        for &b in &buf {
            if b < REJECT_AT {
                out.push(ALPHABET[usize::from(b % 36)] as char);
                if out.len() == SERIAL_PREFIX.len() + SERIAL_RANDOM_LEN {
                    break;
                }
            }
        }
    }
    out
}
