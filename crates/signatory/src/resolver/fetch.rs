use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::redirect::Policy;
use url::Url;

use crate::config::ResolverConfig;
use crate::error::{InvalidOriginError, SignatoryError};
use crate::signatory::KeyDocument;

pub const KEY_DOCUMENT_ACCEPT: &str = "application/activity+json, application/ld+json";

/// Key documents larger than this are refused without being parsed.
pub const MAX_KEY_DOCUMENT_BYTES: usize = 256 * 1024;

/// Retrieves the published key document a key id points at.
#[async_trait]
pub trait KeyFetcher: Send + Sync {
    async fn fetch(&self, key_id: &str) -> Result<KeyDocument, SignatoryError>;
}

/// Dereferences key ids over HTTP(S).
#[derive(Clone)]
pub struct HttpKeyFetcher {
    http_client: reqwest::Client,
}

impl HttpKeyFetcher {
    pub fn new(config: &ResolverConfig) -> Result<Self, SignatoryError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.fetch_timeout)
            .redirect(Policy::limited(config.max_redirects))
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SignatoryError::Network(format!("building HTTP client: {e}")))?;
        Ok(Self { http_client })
    }

    pub fn with_client(http_client: reqwest::Client) -> Self {
        Self { http_client }
    }
}

#[async_trait]
impl KeyFetcher for HttpKeyFetcher {
    async fn fetch(&self, key_id: &str) -> Result<KeyDocument, SignatoryError> {
        let mut url = Url::parse(key_id)
            .map_err(|_| SignatoryError::InvalidOrigin(InvalidOriginError(key_id.to_string())))?;
        url.set_fragment(None);

        tracing::debug!(key_id = %key_id, url = %url, "Fetching remote key document");

        let mut response = self
            .http_client
            .get(url.clone())
            .header(ACCEPT, KEY_DOCUMENT_ACCEPT)
            .send()
            .await
            .map_err(|e| SignatoryError::Network(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SignatoryError::Network(format!("HTTP {status} from {url}")));
        }

        if response
            .content_length()
            .is_some_and(|len| len > MAX_KEY_DOCUMENT_BYTES as u64)
        {
            return Err(too_large(&url));
        }

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| SignatoryError::Network(format!("reading response body: {e}")))?
        {
            if body.len() + chunk.len() > MAX_KEY_DOCUMENT_BYTES {
                return Err(too_large(&url));
            }
            body.extend_from_slice(&chunk);
        }

        serde_json::from_slice(&body)
            .map_err(|e| SignatoryError::InvalidFormat(format!("key document is not JSON: {e}")))
    }
}

fn too_large(url: &Url) -> SignatoryError {
    SignatoryError::InvalidFormat(format!(
        "key document from {url} exceeds {MAX_KEY_DOCUMENT_BYTES} bytes"
    ))
}
