//! Persistence of local signatories, the identities this server signs as.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use crate::error::SignatoryError;
use crate::signatory::Signatory;
use crate::signing::rsa::RSA_KEY_BITS;

pub trait SignatoryStore: Send + Sync {
    fn load(&self, id: &str) -> Result<Option<Signatory>, SignatoryError>;

    /// Inserts or replaces the signatory under its `id`.
    fn save(&self, signatory: &Signatory) -> Result<(), SignatoryError>;

    /// Returns whether something was removed.
    fn remove(&self, id: &str) -> Result<bool, SignatoryError>;
}

#[derive(Default)]
pub struct MemoryStore {
    signatories: Mutex<BTreeMap<String, Signatory>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SignatoryStore for MemoryStore {
    fn load(&self, id: &str) -> Result<Option<Signatory>, SignatoryError> {
        let signatories = self.signatories.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(signatories.get(id).cloned())
    }

    fn save(&self, signatory: &Signatory) -> Result<(), SignatoryError> {
        self.signatories
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(signatory.id.clone(), signatory.clone());
        Ok(())
    }

    fn remove(&self, id: &str) -> Result<bool, SignatoryError> {
        let removed = self
            .signatories
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
        Ok(removed.is_some())
    }
}

/// All signatories in one JSON object keyed by identity id.
///
/// The file is rewritten whole on every change, through a temporary file
/// renamed over the existing one.
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, Signatory>, SignatoryError> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == IoErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(store_error(&self.path, e)),
        };
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Ok(BTreeMap::new());
        }
        serde_json::from_slice(&raw).map_err(|e| store_error(&self.path, e))
    }

    fn write_all(&self, signatories: &BTreeMap<String, Signatory>) -> Result<(), SignatoryError> {
        let raw = serde_json::to_vec_pretty(signatories).map_err(|e| store_error(&self.path, e))?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| store_error(parent, e))?;
        }
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, raw).map_err(|e| store_error(&tmp, e))?;
        fs::rename(&tmp, &self.path).map_err(|e| store_error(&self.path, e))
    }
}

impl SignatoryStore for JsonFileStore {
    fn load(&self, id: &str) -> Result<Option<Signatory>, SignatoryError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.read_all()?.remove(id))
    }

    fn save(&self, signatory: &Signatory) -> Result<(), SignatoryError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut signatories = self.read_all()?;
        signatories.insert(signatory.id.clone(), signatory.clone());
        self.write_all(&signatories)
    }

    fn remove(&self, id: &str) -> Result<bool, SignatoryError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut signatories = self.read_all()?;
        if signatories.remove(id).is_none() {
            return Ok(false);
        }
        self.write_all(&signatories)?;
        Ok(true)
    }
}

fn store_error(path: &Path, error: impl std::fmt::Display) -> SignatoryError {
    SignatoryError::Store(format!("{}: {error}", path.display()))
}

/// Loads the local signatory `id`, creating it with a fresh RSA-2048 key
/// when `generate` is set and it does not exist yet.
pub fn fill_local_signatory(
    store: &dyn SignatoryStore,
    id: &str,
    generate: bool,
) -> Result<Signatory, SignatoryError> {
    fill_local_signatory_with_bits(store, id, generate, RSA_KEY_BITS)
}

pub fn fill_local_signatory_with_bits(
    store: &dyn SignatoryStore,
    id: &str,
    generate: bool,
    bits: usize,
) -> Result<Signatory, SignatoryError> {
    if let Some(signatory) = store.load(id)? {
        return Ok(signatory);
    }
    if !generate {
        return Err(SignatoryError::NotFound);
    }

    let signatory = Signatory::generate_with_bits(id, bits)?;
    store.save(&signatory)?;
    tracing::info!(id = %id, key_id = %signatory.key_id, "Generated local signatory");
    Ok(signatory)
}
