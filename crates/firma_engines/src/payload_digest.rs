#![forbid(unsafe_code)]

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use sha2::{Digest, Sha256};

/// SHA-256 of the raw payload, encoded as standard padded base64 (44 chars).
///
/// Stamped on a pattern once, at enrollment, for integrity auditing. The
/// match decision never reads it.
pub fn digest_b64(payload: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload);
    BASE64.encode(hasher.finalize())
}
