//! File-backed cache shared between processes
//!
//! Each key is stored as `<sha256(key)>.json` holding the value and an
//! optional RFC 3339 expiry. Writes go through a temp file and a rename so
//! a reader never sees a half-written entry. Expired entries are removed
//! when read and swept whenever a cache directory is opened.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{effective_ttl, CacheBackend, CacheError, CacheResult};

/// Distinguishes temp files of concurrent writers within one process
static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// On-disk representation of one entry
#[derive(Debug, Clone, Serialize, Deserialize)]
struct FileCacheEntry {
    key: String,
    value: String,
    created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_at: Option<String>,
}

impl FileCacheEntry {
    fn is_expired(&self) -> bool {
        if let Some(ref expires_at) = self.expires_at {
            if let Ok(expires) = DateTime::parse_from_rfc3339(expires_at) {
                return Utc::now() > expires;
            }
        }
        false
    }
}

/// Directory of JSON entries
#[derive(Debug, Clone)]
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    /// Open (creating if needed) a cache directory
    pub fn open(dir: impl AsRef<Path>) -> CacheResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        if !dir.is_dir() {
            return Err(CacheError::Unavailable(dir));
        }

        let cache = Self { dir };
        match cache.purge_expired() {
            Ok(0) => {}
            Ok(removed) => tracing::debug!(dir = %cache.dir.display(), removed, "purged expired cache entries"),
            Err(e) => tracing::debug!(dir = %cache.dir.display(), error = %e, "cache purge failed"),
        }
        Ok(cache)
    }

    /// Remove every expired entry file; returns how many were removed
    ///
    /// Unreadable entries and foreign files are left alone.
    pub fn purge_expired(&self) -> CacheResult<usize> {
        let mut removed = 0;
        for dir_entry in fs::read_dir(&self.dir)? {
            let path = dir_entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Ok(content) = fs::read_to_string(&path) else {
                continue;
            };
            let Ok(entry) = serde_json::from_str::<FileCacheEntry>(&content) else {
                continue;
            };
            if !entry.is_expired() {
                continue;
            }
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(removed)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        let name = hex::encode(Sha256::digest(key.as_bytes()));
        self.dir.join(format!("{}.json", name))
    }

    /// Atomic write using write-then-rename
    fn atomic_write(&self, final_path: &Path, content: &[u8]) -> io::Result<()> {
        let file_name = final_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let seq = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        let temp_path = self
            .dir
            .join(format!(".{}.{}-{}.tmp", file_name, std::process::id(), seq));

        fs::write(&temp_path, content)?;
        if let Err(e) = fs::rename(&temp_path, final_path) {
            let _ = fs::remove_file(&temp_path);
            return Err(e);
        }
        Ok(())
    }
}

impl CacheBackend for FileCache {
    fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let path = self.entry_path(key);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        // A corrupt entry is treated as a miss and overwritten on next set
        let entry: FileCacheEntry = match serde_json::from_str(&content) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "ignoring unreadable cache entry");
                return Ok(None);
            }
        };

        if entry.key != key {
            return Ok(None);
        }
        if entry.is_expired() {
            if let Err(e) = fs::remove_file(&path) {
                tracing::debug!(path = %path.display(), error = %e, "could not remove expired cache entry");
            }
            return Ok(None);
        }

        Ok(Some(entry.value))
    }

    fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> CacheResult<()> {
        let now = Utc::now();
        let expires_at = effective_ttl(ttl)
            .and_then(|d| chrono::Duration::from_std(d).ok())
            .and_then(|d| now.checked_add_signed(d))
            .map(|t| t.to_rfc3339());

        let entry = FileCacheEntry {
            key: key.to_string(),
            value: value.to_string(),
            created_at: now.to_rfc3339(),
            expires_at,
        };

        let json = serde_json::to_vec(&entry)?;
        self.atomic_write(&self.entry_path(key), &json)?;
        Ok(())
    }

    fn delete(&self, key: &str) -> CacheResult<()> {
        match fs::remove_file(self.entry_path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
