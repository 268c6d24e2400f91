use std::sync::Arc;

use axum::http::header::{HeaderName, HeaderValue, CONTENT_LENGTH, DATE, HOST};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

use crate::clock::{format_http_date, Clock, SystemClock};
use crate::error::{SignatoryError, SignatureError};
use crate::request::{OutgoingRequest, SignedRequest};
use crate::signatory::{key_origin, Signatory};
use crate::signing::{
    body_digest, build_signing_string, header_value, RsaSigner, SignatureHeader, Signer,
    REQUEST_TARGET,
};

/// Headers covered by every signature we produce, in signing order.
pub const OUTGOING_HEADERS: [&str; 5] =
    [REQUEST_TARGET, "content-length", "date", "digest", "host"];

static DIGEST: HeaderName = HeaderName::from_static("digest");
static SIGNATURE: HeaderName = HeaderName::from_static("signature");

/// Attaches `Date`, `Content-Length`, `Digest`, `Host` and `Signature` to
/// outbound requests.
pub struct OutgoingSigner {
    clock: Arc<dyn Clock>,
}

impl Default for OutgoingSigner {
    fn default() -> Self {
        Self::new()
    }
}

impl OutgoingSigner {
    pub fn new() -> Self {
        Self {
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn sign_outgoing(
        &self,
        request: &mut OutgoingRequest,
        signatory: &Signatory,
    ) -> Result<SignedRequest, SignatureError> {
        // Nothing is written to the request until it is fully signed.
        let signer = RsaSigner::from_signatory(signatory)?;
        let origin = key_origin(&signatory.key_id)?;
        let owner_origin = key_origin(&signatory.id)?;
        if origin != owner_origin {
            return Err(SignatoryError::OriginMismatch {
                key_origin: origin,
                owner_origin,
            }
            .into());
        }

        let host = request.host()?;
        let now = self.clock.now();
        let mut headers = request.headers.clone();
        headers.insert(DATE, header(&format_http_date(now))?);
        headers.insert(CONTENT_LENGTH, HeaderValue::from(request.body.len()));
        headers.insert(DIGEST.clone(), header(&body_digest(&request.body))?);
        headers.insert(HOST, header(&host)?);

        let clear_signature = build_signing_string(
            request.method.as_str(),
            &request.path(),
            &host,
            &OUTGOING_HEADERS,
            |name| header_value(&headers, name),
        )?;

        let signed_signature = signer.sign(clear_signature.as_bytes())?;
        let signature_header = SignatureHeader::new(
            signatory.key_id.clone(),
            signer.algorithm(),
            OUTGOING_HEADERS.iter().map(|h| h.to_string()).collect(),
            BASE64.encode(&signed_signature),
        );
        headers.insert(SIGNATURE.clone(), header(&signature_header.to_string())?);
        request.headers = headers;

        tracing::debug!(
            key_id = %signatory.key_id,
            url = %request.url,
            "Outgoing request signed"
        );

        Ok(SignedRequest {
            body: request.body.clone(),
            headers: request.headers.clone(),
            host,
            timestamp: now.timestamp(),
            origin,
            signature_header,
            clear_signature,
            signed_signature,
            signatory: signatory.clone(),
        })
    }
}

fn header(value: &str) -> Result<HeaderValue, SignatureError> {
    HeaderValue::from_str(value)
        .map_err(|e| SignatoryError::Signing(format!("header value {value:?}: {e}")).into())
}
