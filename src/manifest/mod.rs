//! Build manifest reader
//!
//! Loads `manifest.json`, validates it, and resolves logical asset names to
//! on-disk files and public URLs.
//!
//! ## Caching
//!
//! The parsed manifest is stored in the injected [`CacheBackend`] under a
//! key derived from the manifest path, mtime and size. The first `load()` in
//! a process parses the file and writes the cache; later loads (from any
//! `Manifest` sharing the backend) skip reading the file. Rewriting the
//! manifest changes its mtime/size and therefore the key, so a rebuild is
//! picked up without explicit invalidation.

mod entry;
mod error;

pub use entry::{
    is_safe_asset_name, is_safe_asset_path, parse_manifest, sanitize_asset_key, ManifestEntries,
    ManifestEntry,
};
pub use error::{ManifestError, ManifestErrorKind};

use std::fs::{self, File, Metadata};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::UNIX_EPOCH;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::cache::CacheBackend;
use crate::config::{AssetConfig, VersionStrategy};

const CACHE_KEY_PREFIX: &str = "aps_assets:manifest";

/// Length of the content-derived version token
const CONTENT_VERSION_LEN: usize = 12;

/// An asset resolved for output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedAsset {
    /// Public URL (dist URL + relative path)
    pub url: String,

    /// Cache-busting token
    pub version: String,

    /// File on disk
    pub path: PathBuf,

    /// Path relative to the dist root
    pub relative: String,
}

/// Manifest reader shared across enqueue calls
pub struct Manifest {
    config: AssetConfig,
    cache: Arc<dyn CacheBackend>,
    entries: RwLock<Option<Arc<ManifestEntries>>>,
}

impl std::fmt::Debug for Manifest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Manifest")
            .field("manifest_file", &self.config.manifest_file())
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

impl Manifest {
    /// Create a reader; nothing is read until `load()` or the first lookup
    pub fn new(config: AssetConfig, cache: Arc<dyn CacheBackend>) -> Self {
        Self {
            config,
            cache,
            entries: RwLock::new(None),
        }
    }

    pub fn config(&self) -> &AssetConfig {
        &self.config
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.config.manifest_file()
    }

    /// Load and validate the manifest, consulting the cache first
    pub fn load(&self) -> Result<(), ManifestError> {
        let path = self.manifest_path();

        let metadata = match fs::metadata(&path) {
            Ok(m) if m.is_file() => m,
            _ => return Err(ManifestError::Missing { path }),
        };

        let cache_key = self.cache_key(&path, &metadata);
        if let Some(cached) = self.cache.get(&cache_key)? {
            match serde_json::from_str::<ManifestEntries>(&cached) {
                Ok(entries) if !entries.is_empty() => {
                    debug!(path = %path.display(), entries = entries.len(), "manifest cache hit");
                    self.store(entries);
                    return Ok(());
                }
                _ => debug!(key = %cache_key, "discarding unusable cached manifest"),
            }
        }

        let limit = self.config.limits.max_manifest_bytes;
        if metadata.len() > limit {
            return Err(ManifestError::TooLarge {
                path,
                size: metadata.len(),
                limit,
            });
        }

        let contents = fs::read(&path).map_err(|source| ManifestError::Unreadable {
            path: path.clone(),
            source,
        })?;

        let entries = parse_manifest(&contents)?;

        if let Ok(serialized) = serde_json::to_string(&entries) {
            self.cache
                .set(&cache_key, &serialized, Some(self.config.manifest_ttl()))?;
        }

        debug!(path = %path.display(), entries = entries.len(), "manifest loaded from disk");
        self.store(entries);
        Ok(())
    }

    /// True once a manifest has been adopted in this instance
    pub fn is_loaded(&self) -> bool {
        self.entries.read().map(|e| e.is_some()).unwrap_or(false)
    }

    /// Number of entries (loads lazily)
    pub fn len(&self) -> Result<usize, ManifestError> {
        Ok(self.entries()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, ManifestError> {
        Ok(self.entries()?.is_empty())
    }

    /// Logical names in the manifest, sorted
    pub fn keys(&self) -> Result<Vec<String>, ManifestError> {
        Ok(self.entries()?.keys().cloned().collect())
    }

    /// Forget the in-memory copy and the cached copy for the current file
    pub fn invalidate(&self) -> Result<(), ManifestError> {
        if let Ok(mut guard) = self.entries.write() {
            *guard = None;
        }

        let path = self.manifest_path();
        if let Ok(metadata) = fs::metadata(&path) {
            self.cache.delete(&self.cache_key(&path, &metadata))?;
        }
        Ok(())
    }

    /// The validated entry for `key`
    pub fn entry(&self, key: &str) -> Result<ManifestEntry, ManifestError> {
        let key = sanitize_asset_key(key)?;
        let entries = self.entries()?;
        entries
            .get(key)
            .cloned()
            .ok_or_else(|| ManifestError::EntryNotFound {
                key: key.to_string(),
            })
    }

    /// Absolute path of the file behind `key`, which must exist
    pub fn get_asset_path(&self, key: &str) -> Result<PathBuf, ManifestError> {
        let (_, path) = self.locate(key)?;
        Ok(path)
    }

    /// Resolve `key` to URL and version
    pub fn get_asset(&self, key: &str) -> Result<ResolvedAsset, ManifestError> {
        let (entry, path) = self.locate(key)?;
        let relative = entry.relative_path().to_string();

        let version = match self.config.version {
            VersionStrategy::Mtime => mtime_version(&path),
            VersionStrategy::Content => {
                content_version(&path).map_err(|source| ManifestError::Unreadable {
                    path: path.clone(),
                    source,
                })?
            }
        };

        Ok(ResolvedAsset {
            url: format!("{}{}", self.config.base_url(), relative),
            version,
            path,
            relative,
        })
    }

    fn locate(&self, key: &str) -> Result<(ManifestEntry, PathBuf), ManifestError> {
        let entry = self.entry(key)?;
        let path = self.config.dist_dir().join(entry.relative_path());

        if !path.is_file() {
            warn!(
                key = key.trim(),
                path = %path.display(),
                "manifest references a file that does not exist; rebuild assets"
            );
            return Err(ManifestError::FileMissing {
                key: key.trim().to_string(),
                path,
            });
        }

        Ok((entry, path))
    }

    fn entries(&self) -> Result<Arc<ManifestEntries>, ManifestError> {
        if let Some(entries) = self.current() {
            return Ok(entries);
        }

        self.load()?;
        self.current().ok_or_else(|| ManifestError::Missing {
            path: self.manifest_path(),
        })
    }

    fn current(&self) -> Option<Arc<ManifestEntries>> {
        self.entries.read().ok().and_then(|guard| guard.clone())
    }

    fn store(&self, entries: ManifestEntries) {
        if let Ok(mut guard) = self.entries.write() {
            *guard = Some(Arc::new(entries));
        }
    }

    fn cache_key(&self, path: &Path, metadata: &Metadata) -> String {
        let path_hash = hex::encode(Sha256::digest(path.to_string_lossy().as_bytes()));
        format!(
            "{}:{}:{}:{}",
            CACHE_KEY_PREFIX,
            &path_hash[..16],
            modified_nanos(metadata),
            metadata.len()
        )
    }
}

/// Modification time in nanoseconds since the epoch (0 if unavailable)
pub(crate) fn modified_nanos(metadata: &Metadata) -> u128 {
    metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_nanos())
        .unwrap_or(0)
}

/// Nanosecond mtime, so two builds within one second still bust caches
fn mtime_version(path: &Path) -> String {
    fs::metadata(path)
        .map(|m| modified_nanos(&m))
        .unwrap_or(0)
        .to_string()
}

fn content_version(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    let digest = hex::encode(hasher.finalize());
    Ok(digest[..CONTENT_VERSION_LEN].to_string())
}
