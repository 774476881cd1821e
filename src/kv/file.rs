use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use super::KeyValueStore;
use crate::auth::error::AuthError;

const ENTRY_FILE_VERSION: u32 = 1;

/// Configuration for file-backed key-value storage.
#[derive(Debug, Clone)]
pub struct FileStoreConfig {
    pub base_dir: PathBuf,
}

impl FileStoreConfig {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn default_dir() -> PathBuf {
        default_docport_dir().join("store")
    }
}

/// Key-value store keeping one JSON file per key.
///
/// Used by the CLI, where sessions must survive between invocations but there
/// is no shared server-side store. Files are written with mode `0600` on unix.
///
/// # Example
/// ```no_run
/// use docport::kv::{FileKeyValueStore, FileStoreConfig, KeyValueStore};
///
/// # async fn example() -> Result<(), docport::auth::AuthError> {
/// let store = FileKeyValueStore::new(FileStoreConfig::new("/tmp/docport".into()));
/// store.set("cli-session:current", "{}").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct FileKeyValueStore {
    base_dir: PathBuf,
}

impl FileKeyValueStore {
    pub fn new(config: FileStoreConfig) -> Self {
        Self {
            base_dir: config.base_dir,
        }
    }

    pub fn new_default() -> Self {
        Self::new(FileStoreConfig::new(FileStoreConfig::default_dir()))
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.base_dir.join(format!("{}.json", normalize_key(key)))
    }

    fn ensure_parent(path: &Path) -> Result<(), AuthError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    /// Reads a live entry, removing it if it has expired.
    fn read_entry(&self, key: &str) -> Result<Option<EntryFile>, AuthError> {
        let path = self.entry_path(key);
        let raw = match fs::read_to_string(&path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let entry: EntryFile = serde_json::from_str(&raw)?;
        if entry.is_expired(Utc::now()) {
            remove_if_present(&path)?;
            return Ok(None);
        }
        Ok(Some(entry))
    }

    fn write_entry(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
        create_new: bool,
    ) -> Result<bool, AuthError> {
        let path = self.entry_path(key);
        Self::ensure_parent(&path)?;
        let serialized = serde_json::to_string(&EntryFile::new(key, value, ttl))?;

        // Entries are staged in a private file and published whole, so a
        // concurrent reader never observes a partial write.
        let staging = path.with_extension(format!("{}.tmp", Uuid::new_v4()));
        let mut options = fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let staged = options
            .open(&staging)
            .and_then(|mut file| file.write_all(serialized.as_bytes()));
        if let Err(err) = staged {
            remove_if_present(&staging)?;
            return Err(err.into());
        }

        let published: Result<bool, AuthError> = if create_new {
            // hard_link refuses an existing target, so exactly one caller claims the key.
            match fs::hard_link(&staging, &path) {
                Ok(()) => Ok(true),
                Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
                Err(err) => Err(err.into()),
            }
        } else {
            fs::rename(&staging, &path)
                .map(|()| true)
                .map_err(AuthError::from)
        };
        if let Err(err) = remove_if_present(&staging) {
            warn!(path = %staging.display(), error = %err, "failed to remove staging file");
        }
        published
    }
}

#[async_trait]
impl KeyValueStore for FileKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>, AuthError> {
        Ok(self.read_entry(key)?.map(|entry| entry.value))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), AuthError> {
        self.write_entry(key, value, None, false).map(|_| ())
    }

    async fn set_with_expiry(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), AuthError> {
        self.write_entry(key, value, Some(ttl), false).map(|_| ())
    }

    async fn set_if_absent_with_expiry(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, AuthError> {
        // Clears an expired entry so create_new can claim the path.
        self.read_entry(key)?;
        self.write_entry(key, value, Some(ttl), true)
    }

    async fn delete(&self, key: &str) -> Result<(), AuthError> {
        remove_if_present(&self.entry_path(key))
    }

    async fn delete_if_equals(&self, key: &str, expected: &str) -> Result<bool, AuthError> {
        match self.read_entry(key)? {
            Some(entry) if entry.value == expected => {
                remove_if_present(&self.entry_path(key))?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct EntryFile {
    version: u32,
    key: String,
    value: String,
    expires_at: Option<DateTime<Utc>>,
    saved_at: DateTime<Utc>,
}

impl EntryFile {
    fn new(key: &str, value: &str, ttl: Option<Duration>) -> Self {
        let saved_at = Utc::now();
        // A TTL beyond the representable range stores the entry without expiry.
        let expires_at = ttl
            .and_then(|ttl| chrono::Duration::from_std(ttl).ok())
            .and_then(|ttl| saved_at.checked_add_signed(ttl));
        Self {
            version: ENTRY_FILE_VERSION,
            key: key.to_string(),
            value: value.to_string(),
            expires_at,
            saved_at,
        }
    }

    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|at| at <= now).unwrap_or(false)
    }
}

fn remove_if_present(path: &Path) -> Result<(), AuthError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}

pub(crate) fn default_docport_dir() -> PathBuf {
    if let Ok(home) = std::env::var("DOCPORT_HOME") {
        return PathBuf::from(home);
    }
    directories::UserDirs::new()
        .map(|dirs| dirs.home_dir().join(".docport"))
        .unwrap_or_else(|| PathBuf::from(".docport"))
}

fn normalize_key(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return "default".to_string();
    }
    trimmed
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '.' {
                ch
            } else {
                '_'
            }
        })
        .collect()
}
