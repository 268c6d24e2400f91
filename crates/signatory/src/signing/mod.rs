pub mod digest;
pub mod header;
pub mod rsa;
mod signer;
pub mod string;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

pub use self::rsa::{RsaSigner, RsaVerifier};
pub use digest::{body_digest, verify_digest};
pub use header::SignatureHeader;
pub use signer::{Signer, Verifier};
pub use string::{build_signing_string, header_value, REQUEST_TARGET};

use crate::error::{SignatoryError, SignatureError};
use crate::signatory::{Algorithm, Signatory};

/// Signs `clear` with the signatory's private key, base64 encoded for the wire.
pub fn sign_string(clear: &str, signatory: &Signatory) -> Result<String, SignatoryError> {
    let signer = RsaSigner::from_signatory(signatory)?;
    Ok(BASE64.encode(signer.sign(clear.as_bytes())?))
}

/// Verifies a base64 `signature` over `clear` against a PEM public key.
pub fn verify_string(
    clear: &str,
    signature: &str,
    public_key: &str,
    algorithm: Algorithm,
) -> Result<(), SignatureError> {
    let signature = BASE64
        .decode(signature.trim())
        .map_err(|e| SignatureError::MalformedHeader(format!("signature is not base64: {e}")))?;
    RsaVerifier::from_pem(public_key)?.verify(clear.as_bytes(), &signature, algorithm)
}
