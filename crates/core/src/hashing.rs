//! Rotation-token generation and one-way fingerprinting.
//!
//! Rotation tokens are opaque random strings. Only their SHA-256 hex digest
//! is ever stored server-side, so a ledger leak does not expose live
//! credentials. The digest is used purely for equality lookup and is never
//! reversed.

use rand::Rng;
use sha2::{Digest, Sha256};

/// Length of a freshly generated rotation token (alphanumeric characters).
pub const ROTATION_TOKEN_LENGTH: usize = 64;

/// Length of a token hash (hex-encoded SHA-256).
pub const TOKEN_HASH_LENGTH: usize = 64;

/// Number of leading hash characters that may appear in log output.
const LOG_PREFIX_LENGTH: usize = 8;

/// Compute a SHA-256 hex digest of the given bytes.
pub fn sha256_hex(data: &[u8]) -> String {
    let hash = Sha256::digest(data);
    format!("{hash:x}")
}

/// Fingerprint a raw rotation token for ledger lookup.
pub fn hash_rotation_token(raw_token: &str) -> String {
    sha256_hex(raw_token.as_bytes())
}

/// Generate a cryptographically random rotation token.
///
/// The plaintext is handed to the client exactly once; persist only
/// [`hash_rotation_token`] of it.
pub fn generate_rotation_token() -> String {
    rand::rng()
        .sample_iter(&rand::distr::Alphanumeric)
        .take(ROTATION_TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

/// Short, non-reversible prefix of a token hash, safe to attach to log lines.
pub fn log_prefix(token_hash: &str) -> &str {
    token_hash
        .get(..LOG_PREFIX_LENGTH)
        .unwrap_or(token_hash)
}
