use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Coarse classification of every failure this crate reports.
///
/// Callers branch on this rather than on individual variants: a rejected
/// inbound request maps to an authentication failure at the transport
/// boundary, while `LocalSigning` means our own key material is broken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    TimeWindow,
    Integrity,
    MalformedSignatureHeader,
    OriginMismatch,
    KeyResolution,
    CryptographicVerification,
    LocalSigning,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot retrieve origin from {0}")]
pub struct InvalidOriginError(pub String);

/// Failures around key material: resolving a remote key, or using a local one.
#[derive(Debug, thiserror::Error)]
pub enum SignatoryError {
    #[error("invalid format: {0}")]
    InvalidFormat(String),
    #[error("invalid format: key origin {key_origin} does not match owner origin {owner_origin}")]
    OriginMismatch {
        key_origin: String,
        owner_origin: String,
    },
    #[error("invalid origin")]
    InvalidOrigin(#[source] InvalidOriginError),
    #[error("network issue: {0}")]
    Network(String),
    #[error("signatory not found")]
    NotFound,
    #[error("empty private key")]
    EmptyPrivateKey,
    #[error("empty public key")]
    EmptyPublicKey,
    #[error("invalid key: {0}")]
    InvalidKey(String),
    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),
    #[error("signing failed: {0}")]
    Signing(String),
    #[error("signatory store: {0}")]
    Store(String),
}

impl SignatoryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::OriginMismatch { .. } | Self::InvalidOrigin(_) => ErrorKind::OriginMismatch,
            Self::EmptyPrivateKey
            | Self::InvalidPrivateKey(_)
            | Self::Signing(_)
            | Self::Store(_) => ErrorKind::LocalSigning,
            _ => ErrorKind::KeyResolution,
        }
    }
}

impl From<InvalidOriginError> for SignatoryError {
    fn from(error: InvalidOriginError) -> Self {
        Self::InvalidOrigin(error)
    }
}

/// Failures of the inbound validator and the outbound producer.
#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    #[error("datetime exception: {0}")]
    InvalidDate(String),
    #[error("object is too old ({age}s > {ttl}s)")]
    Expired { age: i64, ttl: u64 },
    #[error("issue with content-length")]
    ContentLength { declared: String, actual: usize },
    #[error("issue with digest")]
    Digest,
    #[error("malformed signature header: {0}")]
    MalformedHeader(String),
    #[error("missing elements in 'headers': {0}")]
    MissingHeaders(String),
    #[error("empty element in headers: {0}")]
    EmptyHeader(String),
    #[error(transparent)]
    InvalidOrigin(#[from] InvalidOriginError),
    #[error(transparent)]
    Signatory(#[from] SignatoryError),
    #[error("signature issue")]
    Verification,
    #[error("signature issue")]
    VerificationExhausted {
        attempts: u8,
        #[source]
        last: Box<SignatureError>,
    },
}

impl SignatureError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidDate(_) | Self::Expired { .. } => ErrorKind::TimeWindow,
            Self::ContentLength { .. } | Self::Digest => ErrorKind::Integrity,
            Self::MalformedHeader(_) | Self::MissingHeaders(_) | Self::EmptyHeader(_) => {
                ErrorKind::MalformedSignatureHeader
            }
            Self::InvalidOrigin(_) => ErrorKind::OriginMismatch,
            Self::Signatory(error) => error.kind(),
            Self::Verification => ErrorKind::CryptographicVerification,
            Self::VerificationExhausted { last, .. } => last.kind(),
        }
    }
}

/// Maps a rejection onto an HTTP response without echoing the reason.
impl IntoResponse for SignatureError {
    fn into_response(self) -> Response {
        match self.kind() {
            ErrorKind::MalformedSignatureHeader => {
                (StatusCode::BAD_REQUEST, "Malformed signature.").into_response()
            }
            ErrorKind::LocalSigning => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Something wrong happened.",
            )
                .into_response(),
            _ => (StatusCode::UNAUTHORIZED, "Unauthorized.").into_response(),
        }
    }
}
