use crate::error::{SignatoryError, SignatureError};
use crate::signatory::Algorithm;

/// Trait for signing canonical signing strings.
///
/// Implementations are sync since signing is CPU-bound.
pub trait Signer: Send + Sync {
    /// Sign the clear bytes. Returns raw signature bytes.
    fn sign(&self, data: &[u8]) -> Result<Vec<u8>, SignatoryError>;

    /// Public half of the key, PEM encoded.
    fn public_key_pem(&self) -> Result<String, SignatoryError>;

    fn algorithm(&self) -> Algorithm;
}

/// Counterpart of [`Signer`] holding only a public key.
pub trait Verifier: Send + Sync {
    /// Checks `signature` over `data`; any mismatch is [`SignatureError::Verification`].
    fn verify(
        &self,
        data: &[u8],
        signature: &[u8],
        algorithm: Algorithm,
    ) -> Result<(), SignatureError>;
}
