//! DingTalk callback signature.
//!
//! The platform signs every callback with SHA-1 over the lexicographically
//! sorted concatenation of `token`, `timestamp`, `nonce` and the ciphertext.
//! Outbound acknowledgements are signed with the same transform.

use sha1::{Digest, Sha1};
use tracing::warn;

/// Compute the lowercase hex signature over the four envelope strings.
///
/// Argument order does not matter; the inputs are sorted before hashing.
pub fn sign(token: &str, timestamp: &str, nonce: &str, cipher_text: &str) -> String {
    let mut parts = [token, timestamp, nonce, cipher_text];
    parts.sort_unstable();

    let mut hasher = Sha1::new();
    for part in parts {
        hasher.update(part.as_bytes());
    }

    hex::encode(hasher.finalize())
}

/// Verify a callback signature.
///
/// The comparison is exact: no case folding or whitespace trimming is
/// applied to `signature`.
pub fn verify(token: &str, timestamp: &str, nonce: &str, cipher_text: &str, signature: &str) -> bool {
    let expected = sign(token, timestamp, nonce, cipher_text);
    let valid = constant_time_compare(&expected, signature);

    if !valid {
        warn!(
            expected_length = expected.len(),
            actual_length = signature.len(),
            has_timestamp = !timestamp.is_empty(),
            has_nonce = !nonce.is_empty(),
            "callback_signature_mismatch"
        );
    }

    valid
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}
