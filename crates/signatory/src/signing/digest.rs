use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use sha2::{Digest, Sha256, Sha512};

use crate::error::SignatureError;

/// `Digest` header value for `body`, e.g. `SHA-256=<base64>`.
pub fn body_digest(body: &[u8]) -> String {
    format!("SHA-256={}", BASE64.encode(Sha256::digest(body)))
}

/// Checks a received `Digest` header against `body`.
///
/// The header may list several `algorithm=value` entries. Every entry using a
/// supported algorithm (SHA-256, SHA-512) must match and at least one must be
/// present.
pub fn verify_digest(header: &str, body: &[u8]) -> Result<(), SignatureError> {
    let mut matched = false;
    for entry in header.split(',') {
        let Some((algorithm, value)) = entry.trim().split_once('=') else {
            continue;
        };
        let expected = match algorithm.trim().to_ascii_uppercase().as_str() {
            "SHA-256" => BASE64.encode(Sha256::digest(body)),
            "SHA-512" => BASE64.encode(Sha512::digest(body)),
            _ => continue,
        };
        if value.trim() != expected {
            return Err(SignatureError::Digest);
        }
        matched = true;
    }

    if matched {
        Ok(())
    } else {
        Err(SignatureError::Digest)
    }
}
