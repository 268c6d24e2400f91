use rand_chacha::rand_core::SeedableRng;
use rand_chacha::ChaCha20Rng;
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::{Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256, Sha512};

use super::signer::{Signer, Verifier};
use crate::error::{SignatoryError, SignatureError};
use crate::signatory::{Algorithm, Signatory};

pub const RSA_KEY_BITS: usize = 2048;

/// RSA PKCS#1 v1.5 signer, SHA-256 or SHA-512 digest.
pub struct RsaSigner {
    private_key: RsaPrivateKey,
    algorithm: Algorithm,
}

impl RsaSigner {
    /// Accepts PKCS#8 (`BEGIN PRIVATE KEY`) and PKCS#1 (`BEGIN RSA PRIVATE KEY`) PEM.
    pub fn from_pem(pem: &str, algorithm: Algorithm) -> Result<Self, SignatoryError> {
        let pem = pem.trim();
        if pem.is_empty() {
            return Err(SignatoryError::EmptyPrivateKey);
        }
        let private_key = RsaPrivateKey::from_pkcs8_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
            .map_err(|e| SignatoryError::InvalidPrivateKey(format!("RSA private key: {e}")))?;
        Ok(Self { private_key, algorithm })
    }

    /// Signer for a local signatory. Fails closed when it has no private key.
    pub fn from_signatory(signatory: &Signatory) -> Result<Self, SignatoryError> {
        match signatory.private_key.as_deref() {
            Some(pem) if !pem.trim().is_empty() => Self::from_pem(pem, signatory.algorithm),
            _ => Err(SignatoryError::EmptyPrivateKey),
        }
    }

    pub fn generate(bits: usize, algorithm: Algorithm) -> Result<Self, SignatoryError> {
        let private_key = RsaPrivateKey::new(&mut rand::thread_rng(), bits)
            .map_err(|e| SignatoryError::InvalidPrivateKey(format!("generating RSA key: {e}")))?;
        Ok(Self { private_key, algorithm })
    }

    /// Deterministic key from a seed string: the SHA-256 hash of the seed
    /// seeds the CSPRNG used for key generation.
    pub fn from_seed(
        seed: &str,
        bits: usize,
        algorithm: Algorithm,
    ) -> Result<Self, SignatoryError> {
        let hash = Sha256::digest(seed.as_bytes());
        let mut rng = ChaCha20Rng::from_seed(hash.into());
        let private_key = RsaPrivateKey::new(&mut rng, bits).map_err(|e| {
            SignatoryError::InvalidPrivateKey(format!("generating RSA key from seed: {e}"))
        })?;
        Ok(Self { private_key, algorithm })
    }

    pub fn private_key_pem(&self) -> Result<String, SignatoryError> {
        self.private_key
            .to_pkcs8_pem(LineEnding::LF)
            .map(|pem| pem.to_string())
            .map_err(|e| {
                SignatoryError::InvalidPrivateKey(format!("encoding RSA private key: {e}"))
            })
    }
}

impl Signer for RsaSigner {
    fn sign(&self, data: &[u8]) -> Result<Vec<u8>, SignatoryError> {
        let (padding, hashed) = pkcs1v15(self.algorithm, data);
        self.private_key
            .sign(padding, &hashed)
            .map_err(|e| SignatoryError::Signing(format!("RSA: {e}")))
    }

    fn public_key_pem(&self) -> Result<String, SignatoryError> {
        self.private_key
            .to_public_key()
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| {
                SignatoryError::InvalidPrivateKey(format!("encoding RSA public key: {e}"))
            })
    }

    fn algorithm(&self) -> Algorithm {
        self.algorithm
    }
}

pub struct RsaVerifier {
    public_key: RsaPublicKey,
}

impl RsaVerifier {
    /// Accepts SPKI (`BEGIN PUBLIC KEY`) and PKCS#1 (`BEGIN RSA PUBLIC KEY`) PEM.
    pub fn from_pem(pem: &str) -> Result<Self, SignatoryError> {
        let pem = pem.trim();
        if pem.is_empty() {
            return Err(SignatoryError::EmptyPublicKey);
        }
        let public_key = RsaPublicKey::from_public_key_pem(pem)
            .or_else(|_| RsaPublicKey::from_pkcs1_pem(pem))
            .map_err(|e| SignatoryError::InvalidKey(format!("RSA public key: {e}")))?;
        Ok(Self { public_key })
    }
}

impl Verifier for RsaVerifier {
    fn verify(
        &self,
        data: &[u8],
        signature: &[u8],
        algorithm: Algorithm,
    ) -> Result<(), SignatureError> {
        let (padding, hashed) = pkcs1v15(algorithm, data);
        self.public_key
            .verify(padding, &hashed, signature)
            .map_err(|_| SignatureError::Verification)
    }
}

fn pkcs1v15(algorithm: Algorithm, data: &[u8]) -> (Pkcs1v15Sign, Vec<u8>) {
    match algorithm {
        Algorithm::RsaSha256 => (Pkcs1v15Sign::new::<Sha256>(), Sha256::digest(data).to_vec()),
        Algorithm::RsaSha512 => (Pkcs1v15Sign::new::<Sha512>(), Sha512::digest(data).to_vec()),
    }
}
