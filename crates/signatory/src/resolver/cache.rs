use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

use crate::signatory::Signatory;

/// Shared store of resolved remote signatories, keyed by key id.
pub trait KeyCache: Send + Sync {
    fn get(&self, key_id: &str) -> Option<Signatory>;

    /// Inserts or replaces the entry for `key_id`.
    fn put(&self, key_id: &str, signatory: Signatory);

    fn invalidate(&self, key_id: &str);
}

#[derive(Clone)]
struct CachedSignatory {
    signatory: Signatory,
    fetched_at: Instant,
}

/// In-process cache with an optional time-to-live.
///
/// Expired entries are dropped when looked up and swept on every insert.
#[derive(Default)]
pub struct MemoryKeyCache {
    entries: RwLock<HashMap<String, CachedSignatory>>,
    ttl: Option<Duration>,
}

impl MemoryKeyCache {
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn is_fresh(&self, entry: &CachedSignatory) -> bool {
        self.ttl.is_none_or(|ttl| entry.fetched_at.elapsed() < ttl)
    }
}

impl KeyCache for MemoryKeyCache {
    fn get(&self, key_id: &str) -> Option<Signatory> {
        {
            let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            match entries.get(key_id) {
                None => return None,
                Some(entry) if self.is_fresh(entry) => return Some(entry.signatory.clone()),
                Some(_) => {}
            }
        }

        // Stale. Re-check under the write lock, a put may have landed in between.
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        match entries.get(key_id) {
            Some(entry) if self.is_fresh(entry) => Some(entry.signatory.clone()),
            Some(_) => {
                entries.remove(key_id);
                None
            }
            None => None,
        }
    }

    fn put(&self, key_id: &str, signatory: Signatory) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if self.ttl.is_some() {
            entries.retain(|_, entry| self.is_fresh(entry));
        }
        entries.insert(
            key_id.to_string(),
            CachedSignatory {
                signatory,
                fetched_at: Instant::now(),
            },
        );
    }

    fn invalidate(&self, key_id: &str) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key_id);
    }
}
