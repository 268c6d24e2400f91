use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{InvalidOriginError, SignatoryError};
use crate::signing::rsa::{RsaSigner, RSA_KEY_BITS};
use crate::signing::Signer;

/// Suffix appended to an identity id to name its signing key.
pub const MAIN_KEY_FRAGMENT: &str = "#main-key";

/// Signature algorithms understood on the wire.
///
/// Anything a sender advertises that is not `rsa-sha512` is treated as
/// `rsa-sha256`, including a missing `algorithm` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Algorithm {
    #[default]
    #[serde(rename = "rsa-sha256")]
    RsaSha256,
    #[serde(rename = "rsa-sha512")]
    RsaSha512,
}

impl Algorithm {
    pub fn from_header(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(name) if name.eq_ignore_ascii_case("rsa-sha512") => Self::RsaSha512,
            _ => Self::RsaSha256,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RsaSha256 => "rsa-sha256",
            Self::RsaSha512 => "rsa-sha512",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key material of one identity.
///
/// Remote signatories carry only a public key. Local ones also hold the
/// private key and are the only ones that can sign.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signatory {
    pub id: String,
    pub key_id: String,
    pub key_owner: String,
    pub public_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
    #[serde(default)]
    pub algorithm: Algorithm,
}

impl Signatory {
    /// Empty signatory for `id`, keyed `<id>#main-key`.
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            key_id: format!("{id}{MAIN_KEY_FRAGMENT}"),
            key_owner: id.clone(),
            id,
            public_key: String::new(),
            private_key: None,
            algorithm: Algorithm::default(),
        }
    }

    /// Creates a local signatory with a freshly generated RSA keypair.
    pub fn generate(id: impl Into<String>) -> Result<Self, SignatoryError> {
        Self::generate_with_bits(id, RSA_KEY_BITS)
    }

    pub fn generate_with_bits(id: impl Into<String>, bits: usize) -> Result<Self, SignatoryError> {
        let signer = RsaSigner::generate(bits, Algorithm::default())?;
        let mut signatory = Self::new(id);
        signatory.public_key = signer.public_key_pem()?;
        signatory.private_key = Some(signer.private_key_pem()?);
        Ok(signatory)
    }

    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn has_public_key(&self) -> bool {
        !self.public_key.trim().is_empty()
    }

    pub fn has_private_key(&self) -> bool {
        self.private_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty())
    }

    /// Host the key id points at.
    pub fn origin(&self) -> Result<String, InvalidOriginError> {
        key_origin(&self.key_id)
    }

    /// The public document remote parties fetch to verify our signatures.
    pub fn to_key_document(&self) -> KeyDocument {
        KeyDocument {
            context: Some(serde_json::json!([
                "https://www.w3.org/ns/activitystreams",
                "https://w3id.org/security/v1"
            ])),
            id: Some(self.id.clone()),
            public_key: Some(PublicKeyDocument {
                id: self.key_id.clone(),
                owner: self.key_owner.clone(),
                public_key_pem: self.public_key.clone(),
            }),
            ..KeyDocument::default()
        }
    }
}

impl fmt::Debug for Signatory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signatory")
            .field("id", &self.id)
            .field("key_id", &self.key_id)
            .field("key_owner", &self.key_owner)
            .field("algorithm", &self.algorithm)
            .field("has_private_key", &self.has_private_key())
            .finish_non_exhaustive()
    }
}

/// Extracts the host part of a key id or identity URI.
pub fn key_origin(key_id: &str) -> Result<String, InvalidOriginError> {
    Url::parse(key_id)
        .ok()
        .and_then(|url| url.host_str().map(str::to_string))
        .filter(|host| !host.is_empty())
        .ok_or_else(|| InvalidOriginError(key_id.to_string()))
}

/// Remote key document.
///
/// Usually an actor embedding its key under `publicKey`; some servers answer
/// the key URL with the bare key object instead, which is also accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyDocument {
    #[serde(rename = "@context", default, skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<PublicKeyDocument>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key_pem: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyDocument {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub public_key_pem: String,
}

impl KeyDocument {
    /// Id of the identity owning the key, and the key itself.
    pub fn owner_and_key(&self) -> Option<(String, PublicKeyDocument)> {
        if let Some(key) = &self.public_key {
            let owner = self.id.clone().unwrap_or_else(|| key.owner.clone());
            return Some((owner, key.clone()));
        }

        let pem = self.public_key_pem.clone()?;
        let owner = self.owner.clone()?;
        let key = PublicKeyDocument {
            id: self.id.clone().unwrap_or_default(),
            owner: owner.clone(),
            public_key_pem: pem,
        };
        Some((owner, key))
    }
}
