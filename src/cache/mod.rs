//! Key-value cache backends
//!
//! Parsed manifests and computed digests are cached behind [`CacheBackend`]
//! so callers never care whether the store is an in-process map or files
//! shared between worker processes.
//!
//! ## Consistency
//!
//! Values written here are pure functions of their key (the key embeds the
//! source path, mtime and size), so two writers racing on one key store the
//! same value and last-write-wins is harmless. No backend locks across
//! get/set.
//!
//! ## TTL
//!
//! `ttl = None` or a zero duration means the entry lives until deleted or
//! the process/store is cleared.

mod file;
mod memory;

pub use file::FileCache;
pub use memory::MemoryCache;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::config::{CacheBackendKind, CacheSettings};

/// Cache result type
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors from cache operations
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("cache lock poisoned")]
    Poisoned,

    #[error("cache directory is not usable: {0}")]
    Unavailable(PathBuf),
}

/// String-keyed store with optional expiry
pub trait CacheBackend: Send + Sync {
    /// Fetch a live value
    fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Store a value, replacing any previous one
    fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> CacheResult<()>;

    /// Remove a value; missing keys are not an error
    fn delete(&self, key: &str) -> CacheResult<()>;
}

/// Backend that never stores anything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullCache;

impl CacheBackend for NullCache {
    fn get(&self, _key: &str) -> CacheResult<Option<String>> {
        Ok(None)
    }

    fn set(&self, _key: &str, _value: &str, _ttl: Option<Duration>) -> CacheResult<()> {
        Ok(())
    }

    fn delete(&self, _key: &str) -> CacheResult<()> {
        Ok(())
    }
}

/// Build the backend selected in config
pub fn from_settings(settings: &CacheSettings) -> CacheResult<Arc<dyn CacheBackend>> {
    let backend: Arc<dyn CacheBackend> = match settings.backend {
        CacheBackendKind::Memory => MemoryCache::shared(),
        CacheBackendKind::File => Arc::new(FileCache::open(&settings.dir)?),
        CacheBackendKind::Disabled => Arc::new(NullCache),
    };
    Ok(backend)
}

/// Zero TTLs mean "no expiry"
pub(crate) fn effective_ttl(ttl: Option<Duration>) -> Option<Duration> {
    ttl.filter(|d| !d.is_zero())
}
