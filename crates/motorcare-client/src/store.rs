//! Token persistence and the live token store.

use std::path::PathBuf;
use std::sync::RwLock;

use dashmap::DashMap;
use motorcare_types::{CredentialPair, StorageError};

/// Storage key for the access token.
pub const ACCESS_TOKEN_KEY: &str = "motorcare.access_token";
/// Storage key for the refresh token.
pub const REFRESH_TOKEN_KEY: &str = "motorcare.refresh_token";

/// Key-value persistence backend for credentials.
///
/// The two token keys are always written and removed together by
/// [`TokenStore`]; backends only supply the primitive operations.
pub trait TokenStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn put(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// In-memory backend for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryTokenStorage {
    entries: DashMap<String, String>,
}

impl TokenStorage for MemoryTokenStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    fn put(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// One-file-per-key backend rooted at a directory.
pub struct FileTokenStorage {
    dir: PathBuf,
}

impl FileTokenStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }
}

impl TokenStorage for FileTokenStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&self, key: &str, value: &str) -> Result<(), StorageError> {
        std::fs::write(self.path_for(key), value)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        match std::fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Owns the live credential pair, the only shared mutable state in the
/// access layer. All writes are whole-pair replacements: a reader can never
/// observe an access token without its matching refresh token.
pub struct TokenStore {
    storage: Box<dyn TokenStorage>,
    current: RwLock<Option<CredentialPair>>,
}

impl TokenStore {
    /// Hydrates from the backend. A half-written pair on disk (one key
    /// missing) is treated as logged out.
    pub fn new(storage: Box<dyn TokenStorage>) -> Self {
        let current = match (storage.get(ACCESS_TOKEN_KEY), storage.get(REFRESH_TOKEN_KEY)) {
            (Ok(Some(access)), Ok(Some(refresh))) => Some(CredentialPair::new(access, refresh)),
            _ => None,
        };
        Self {
            storage,
            current: RwLock::new(current),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryTokenStorage::default()))
    }

    /// Replace the whole pair. Both keys are persisted before the live state
    /// updates.
    pub fn set(&self, pair: CredentialPair) -> Result<(), StorageError> {
        self.storage.put(ACCESS_TOKEN_KEY, &pair.access_token)?;
        self.storage.put(REFRESH_TOKEN_KEY, &pair.refresh_token)?;
        *self.write_lock() = Some(pair);
        Ok(())
    }

    /// Drop both tokens. The live state clears even if the backend fails to
    /// remove a key; persistence failures are logged, not surfaced, so a
    /// logout can never be blocked by storage.
    pub fn clear(&self) {
        *self.write_lock() = None;
        if let Err(e) = self.storage.remove(ACCESS_TOKEN_KEY) {
            tracing::warn!("Failed to remove persisted access token: {}", e);
        }
        if let Err(e) = self.storage.remove(REFRESH_TOKEN_KEY) {
            tracing::warn!("Failed to remove persisted refresh token: {}", e);
        }
    }

    pub fn credentials(&self) -> Option<CredentialPair> {
        self.read_lock().clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.read_lock().as_ref().map(|p| p.access_token.clone())
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.read_lock().as_ref().map(|p| p.refresh_token.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.read_lock().is_some()
    }

    fn read_lock(&self) -> std::sync::RwLockReadGuard<'_, Option<CredentialPair>> {
        self.current.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_lock(&self) -> std::sync::RwLockWriteGuard<'_, Option<CredentialPair>> {
        self.current.write().unwrap_or_else(|e| e.into_inner())
    }
}
