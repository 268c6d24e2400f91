use axum::body::Bytes;
use axum::http::{HeaderMap, Method};
use url::Url;

use crate::error::InvalidOriginError;
use crate::signatory::Signatory;
use crate::signing::SignatureHeader;

/// An inbound request as seen by the validator.
#[derive(Debug, Clone)]
pub struct IncomingRequest {
    pub method: Method,
    /// Path and query, exactly as requested.
    pub path: String,
    /// Our own canonical host, never the client-supplied `Host` header.
    pub host: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// An outbound request before it is handed to the HTTP transport.
#[derive(Debug, Clone)]
pub struct OutgoingRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl OutgoingRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Destination host as sent in the `Host` header, port included when explicit.
    pub fn host(&self) -> Result<String, InvalidOriginError> {
        let host = self
            .url
            .host_str()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| InvalidOriginError(self.url.to_string()))?;
        Ok(match self.url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        })
    }

    /// Path and query of the destination.
    pub fn path(&self) -> String {
        match self.url.query() {
            Some(query) => format!("{}?{query}", self.url.path()),
            None => self.url.path().to_string(),
        }
    }

    /// Hands the request over to reqwest with every attached header.
    pub fn into_reqwest(self, client: &reqwest::Client) -> reqwest::RequestBuilder {
        client
            .request(self.method, self.url)
            .headers(self.headers)
            .body(self.body)
    }
}

/// Outcome of signing or verifying one request.
#[derive(Debug, Clone)]
pub struct SignedRequest {
    pub body: Bytes,
    pub headers: HeaderMap,
    pub host: String,
    /// Seconds since epoch, from the `Date` header.
    pub timestamp: i64,
    /// Host of the key id.
    pub origin: String,
    pub signature_header: SignatureHeader,
    /// Canonical signing string.
    pub clear_signature: String,
    /// Raw signature bytes.
    pub signed_signature: Vec<u8>,
    pub signatory: Signatory,
}
