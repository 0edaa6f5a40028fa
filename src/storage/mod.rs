// Storage module - durable key/value entries for the session triple
//
// The session survives restarts through three named entries (access token,
// refresh token, serialized user). Entries are scoped per API origin so two
// servers never see each other's tokens.
//
// Layout on disk: <storage_dir>/<origin-hash>/<key>
// Example: ~/.local/share/defectdesk/sessions/3f9a0c21d4b7e815/defect_access_token

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

/// Entry holding the short-lived access token
pub const ACCESS_TOKEN_KEY: &str = "defect_access_token";
/// Entry holding the refresh token
pub const REFRESH_TOKEN_KEY: &str = "defect_refresh_token";
/// Entry holding the JSON-serialized user profile
pub const USER_KEY: &str = "defect_user";

/// All session entries, in write order
pub const SESSION_KEYS: [&str; 3] = [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY];

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid storage key {0:?}")]
    InvalidKey(String),

    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Durable string storage keyed by name
///
/// Implementations must be safe to share between the session manager (writer)
/// and the transport (reads the access token on every request).
pub trait SessionStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

pub type SharedStorage = Arc<dyn SessionStorage>;

/// Keys become file names, so keep them boring
fn validate_key(key: &str) -> Result<(), StorageError> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidKey(key.to_string()))
    }
}

/// Short stable directory name for an API origin (SHA-256, first 16 hex chars)
///
/// Only scheme, host and port take part, so `/api/v1` and `/api/v2` on the
/// same server share a session.
pub fn origin_id(base_url: &str) -> String {
    let origin = reqwest::Url::parse(base_url)
        .map(|url| url.origin().ascii_serialization())
        .unwrap_or_else(|_| base_url.trim_end_matches('/').to_string());

    let mut hasher = Sha256::new();
    hasher.update(origin.as_bytes());
    let hash = hasher.finalize();
    format!("{:x}", hash)[..16].to_string()
}

// ─────────────────────────────────────────────────────────────────────────────
// File-backed storage
// ─────────────────────────────────────────────────────────────────────────────

/// One file per entry under a per-origin directory
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    /// Storage rooted exactly at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Storage for `base_url`'s origin under `storage_dir`
    pub fn for_origin(storage_dir: &Path, base_url: &str) -> Self {
        Self::new(storage_dir.join(origin_id(base_url)))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }
}

impl SessionStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Io { path, source }),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.root).map_err(|source| StorageError::Io {
            path: self.root.clone(),
            source,
        })?;

        // Write-then-rename so a crash never leaves a half-written token
        let tmp = self.root.join(format!(".{}.tmp", key));
        fs::write(&tmp, value).map_err(|source| StorageError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &path).map_err(|source| StorageError::Io { path, source })
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Io { path, source }),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// In-memory storage
// ─────────────────────────────────────────────────────────────────────────────

/// Volatile storage, used by tests and by `--ephemeral` runs
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SessionStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        validate_key(key)?;
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        validate_key(key)?;
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        validate_key(key)?;
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key);
        Ok(())
    }
}
