//! Resolution of remote key ids into [`Signatory`] values.
//!
//! A cache hit is trusted as-is. On a miss, or when the caller forces a
//! refresh, the key document is fetched, checked for a consistent origin and
//! stored back into the cache. Callers verifying a signature resolve once
//! without refresh and, if verification fails, once more with it: that is
//! how a remote key rotation is picked up.

mod cache;
mod fetch;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::Mutex as AsyncMutex;

pub use cache::{KeyCache, MemoryKeyCache};
pub use fetch::{HttpKeyFetcher, KeyFetcher, KEY_DOCUMENT_ACCEPT, MAX_KEY_DOCUMENT_BYTES};

use crate::config::ResolverConfig;
use crate::error::SignatoryError;
use crate::signatory::{key_origin, KeyDocument, Signatory};

#[async_trait]
pub trait ResolveSignatory: Send + Sync {
    async fn resolve(&self, key_id: &str, force_refresh: bool)
        -> Result<Signatory, SignatoryError>;
}

pub struct SignatoryResolver {
    cache: Arc<dyn KeyCache>,
    fetcher: Arc<dyn KeyFetcher>,
    in_flight: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl SignatoryResolver {
    pub fn new(cache: Arc<dyn KeyCache>, fetcher: Arc<dyn KeyFetcher>) -> Self {
        Self {
            cache,
            fetcher,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Resolver backed by an in-memory cache and HTTP fetches.
    pub fn with_http(config: &ResolverConfig) -> Result<Self, SignatoryError> {
        Ok(Self::new(
            Arc::new(MemoryKeyCache::new(config.cache_ttl)),
            Arc::new(HttpKeyFetcher::new(config)?),
        ))
    }

    pub fn cache(&self) -> &Arc<dyn KeyCache> {
        &self.cache
    }

    fn key_lock(&self, key_id: &str) -> Arc<AsyncMutex<()>> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        in_flight.entry(key_id.to_string()).or_default().clone()
    }

    fn release_key_lock(&self, key_id: &str, lock: Arc<AsyncMutex<()>>) {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        // The map holds one reference and we hold the other.
        if Arc::strong_count(&lock) <= 2 {
            in_flight.remove(key_id);
        }
    }

    async fn download(&self, key_id: &str) -> Result<Signatory, SignatoryError> {
        let document = self.fetcher.fetch(key_id).await?;
        let signatory = signatory_from_document(key_id, &document).inspect_err(|e| {
            tracing::warn!(key_id = %key_id, error = %e, "Rejected remote key document");
        })?;
        self.cache.put(key_id, signatory.clone());
        tracing::debug!(key_id = %key_id, owner = %signatory.key_owner, "Remote signatory cached");
        Ok(signatory)
    }
}

#[async_trait]
impl ResolveSignatory for SignatoryResolver {
    async fn resolve(
        &self,
        key_id: &str,
        force_refresh: bool,
    ) -> Result<Signatory, SignatoryError> {
        if !force_refresh {
            if let Some(signatory) = self.cache.get(key_id) {
                tracing::debug!(key_id = %key_id, "Signatory cache hit");
                return Ok(signatory);
            }
        }

        let lock = self.key_lock(key_id);
        let result = {
            let _guard = lock.lock().await;
            // Another task may have fetched this key while we were waiting.
            match (!force_refresh).then(|| self.cache.get(key_id)).flatten() {
                Some(signatory) => Ok(signatory),
                None => self.download(key_id).await,
            }
        };
        self.release_key_lock(key_id, lock);
        result
    }
}

/// Turns a fetched key document into a signatory for `key_id`.
///
/// The document must describe `key_id` (as the key's own id or as the owning
/// identity), the identity must own the key, both must live on the same host
/// and the public key must not be empty.
pub fn signatory_from_document(
    key_id: &str,
    document: &KeyDocument,
) -> Result<Signatory, SignatoryError> {
    let (owner, key) = document
        .owner_and_key()
        .ok_or_else(|| SignatoryError::InvalidFormat("missing publicKey".into()))?;

    if owner != key_id && key.id != key_id {
        return Err(SignatoryError::InvalidFormat(format!(
            "document does not describe {key_id}"
        )));
    }
    if owner != key.owner {
        return Err(SignatoryError::InvalidFormat(format!(
            "key is owned by {}, not {owner}",
            key.owner
        )));
    }

    let key_host = key_origin(&key.id)?;
    let owner_host = key_origin(&key.owner)?;
    if key_host != owner_host {
        return Err(SignatoryError::OriginMismatch {
            key_origin: key_host,
            owner_origin: owner_host,
        });
    }

    if key.public_key_pem.trim().is_empty() {
        return Err(SignatoryError::InvalidFormat("empty public key".into()));
    }

    Ok(Signatory {
        id: owner.clone(),
        key_id: key.id,
        key_owner: owner,
        public_key: key.public_key_pem,
        private_key: None,
        algorithm: Default::default(),
    })
}
