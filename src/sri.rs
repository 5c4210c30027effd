//! Subresource integrity for manifest assets
//!
//! Digests come from `asset_digest::sri`, the same code `generate-sri` runs
//! at build time, so runtime and precomputed values always agree.
//!
//! Computed values are cached as [`IntegrityRecord`]s keyed on
//! `(path, mtime, size)`: editing a file in place changes the key, so a stale
//! digest is never served even when the manifest was not rebuilt.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::time::Duration;

use asset_digest::{DigestError, SriAlgorithm, DEFAULT_ALGORITHM};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::cache::{CacheBackend, CacheError};
use crate::manifest::{modified_nanos, Manifest, ManifestError};

const CACHE_KEY_PREFIX: &str = "aps_sri";

/// Errors from integrity computation
#[derive(Debug, thiserror::Error)]
pub enum SriError {
    #[error("cannot generate SRI hash: {} is missing or unreadable", path.display())]
    MissingFile { path: PathBuf },

    #[error("failed to generate SRI hash: {0}")]
    Digest(#[from] DigestError),

    #[error("the asset manifest is no longer available")]
    ManifestGone,

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error("integrity cache error: {0}")]
    Cache(#[from] CacheError),
}

impl SriError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingFile { .. } => "aps_sri_missing_file",
            Self::Digest(_) => "aps_sri_hash_failed",
            Self::ManifestGone => "aps_sri_manifest_gone",
            Self::Manifest(e) => e.code(),
            Self::Cache(_) => "aps_sri_cache",
        }
    }
}

/// A computed digest as stored in the cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrityRecord {
    pub path: String,
    pub algorithm: SriAlgorithm,
    pub digest_base64: String,
    pub computed_at: DateTime<Utc>,
}

impl IntegrityRecord {
    /// The `sha384-...` value
    pub fn integrity(&self) -> String {
        format!("{}-{}", self.algorithm, self.digest_base64)
    }

    fn from_integrity(path: &Path, integrity: &str) -> Option<Self> {
        let (algo, digest) = integrity.split_once('-')?;
        Some(Self {
            path: path.to_string_lossy().replace('\\', "/"),
            algorithm: algo.parse().ok()?,
            digest_base64: digest.to_string(),
            computed_at: Utc::now(),
        })
    }
}

/// Result of checking one precomputed manifest value against its file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyStatus {
    Ok,
    Mismatch,
    /// The referenced file is gone
    Missing(String),
    /// The manifest entry could not be read
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedEntry {
    pub key: String,
    pub status: VerifyStatus,
}

/// Every manifest entry carrying an `integrity`, checked against disk
#[derive(Debug, Clone, Default)]
pub struct VerifyReport {
    pub entries: Vec<VerifiedEntry>,
    /// Manifest entries seen, including those without a precomputed value
    pub total: usize,
}

impl VerifyReport {
    pub fn checked(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| !matches!(e.status, VerifyStatus::Error(_)))
            .count()
    }

    pub fn problems(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.status != VerifyStatus::Ok)
            .count()
    }

    pub fn is_clean(&self) -> bool {
        self.problems() == 0
    }
}

/// Computes and caches SRI values
///
/// Holds only a weak reference to the [`Manifest`]: the generator is an
/// add-on to the reader and never keeps it alive.
pub struct SriGenerator {
    manifest: Weak<Manifest>,
    cache: Arc<dyn CacheBackend>,
    ttl: Duration,
    max_asset_bytes: u64,
    trust_manifest: bool,
}

impl SriGenerator {
    /// Generator bound to `manifest`, taking TTL and limits from its config
    pub fn new(manifest: &Arc<Manifest>, cache: Arc<dyn CacheBackend>) -> Self {
        let config = manifest.config();
        Self {
            manifest: Arc::downgrade(manifest),
            cache,
            ttl: config.integrity_ttl(),
            max_asset_bytes: config.limits.max_asset_bytes,
            trust_manifest: config.integrity.trust_manifest,
        }
    }

    /// Override the cache TTL
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Hash a file without consulting the cache
    pub fn generate_hash(&self, path: &Path) -> Result<String, SriError> {
        Ok(self.generate_record(path)?.integrity())
    }

    fn generate_record(&self, path: &Path) -> Result<IntegrityRecord, SriError> {
        if !path.is_file() {
            return Err(SriError::MissingFile {
                path: path.to_path_buf(),
            });
        }

        let integrity = asset_digest::integrity_for_file(path, Some(self.max_asset_bytes))?;
        IntegrityRecord::from_integrity(path, &integrity).ok_or_else(|| {
            SriError::Digest(DigestError::Malformed(integrity.clone()))
        })
    }

    /// Integrity value for a resolved file, served from cache when fresh
    pub fn get_integrity_attribute(&self, path: &Path) -> Result<String, SriError> {
        let metadata = match fs::metadata(path) {
            Ok(m) if m.is_file() => m,
            _ => {
                return Err(SriError::MissingFile {
                    path: path.to_path_buf(),
                })
            }
        };

        let key = cache_key(path, modified_nanos(&metadata), metadata.len());

        if let Some(cached) = self.cache.get(&key)? {
            match serde_json::from_str::<IntegrityRecord>(&cached) {
                Ok(record) if asset_digest::is_valid_integrity(&record.integrity()) => {
                    debug!(path = %path.display(), "integrity cache hit");
                    return Ok(record.integrity());
                }
                _ => debug!(key = %key, "discarding unusable cached integrity"),
            }
        }

        let record = self.generate_record(path)?;
        if let Ok(json) = serde_json::to_string(&record) {
            self.cache.set(&key, &json, Some(self.ttl))?;
        }

        Ok(record.integrity())
    }

    /// Integrity value for a manifest key
    ///
    /// A well-formed `integrity` precomputed into the manifest wins when
    /// `trust_manifest` is on; otherwise the file is hashed (or the cached
    /// digest returned).
    pub fn integrity_for_asset(&self, key: &str) -> Result<String, SriError> {
        let manifest = self.manifest.upgrade().ok_or(SriError::ManifestGone)?;
        let entry = manifest.entry(key)?;
        let path = manifest.get_asset_path(key)?;

        if self.trust_manifest {
            match entry.integrity.as_deref() {
                Some(value) if asset_digest::is_valid_integrity(value) => {
                    return Ok(value.to_string())
                }
                Some(value) => {
                    warn!(key = key, value = value, "ignoring malformed precomputed integrity")
                }
                None => {}
            }
        }

        self.get_integrity_attribute(&path)
    }

    /// Compare a stored value against the file on disk
    pub fn verify_hash(&self, path: &Path, expected: &str) -> bool {
        if !asset_digest::is_valid_integrity(expected) {
            return false;
        }

        match asset_digest::read_limited(path, Some(self.max_asset_bytes)) {
            Ok(bytes) => asset_digest::verify_bytes(&bytes, expected),
            Err(_) => false,
        }
    }

    /// Check every precomputed `integrity` in the manifest against the files
    ///
    /// Always reads the files; neither the cache nor `trust_manifest` applies.
    pub fn verify_manifest(&self) -> Result<VerifyReport, SriError> {
        let manifest = self.manifest.upgrade().ok_or(SriError::ManifestGone)?;
        let keys = manifest.keys()?;
        let mut report = VerifyReport {
            entries: Vec::new(),
            total: keys.len(),
        };

        for key in keys {
            let expected = match manifest.entry(&key) {
                Ok(entry) => match entry.integrity {
                    Some(value) => value,
                    None => continue,
                },
                Err(e) => {
                    report.entries.push(VerifiedEntry {
                        key,
                        status: VerifyStatus::Error(e.to_string()),
                    });
                    continue;
                }
            };

            let status = match manifest.get_asset_path(&key) {
                Ok(path) if self.verify_hash(&path, &expected) => VerifyStatus::Ok,
                Ok(path) => {
                    warn!(key = %key, path = %path.display(), "integrity does not match file");
                    VerifyStatus::Mismatch
                }
                Err(e) => VerifyStatus::Missing(e.to_string()),
            };
            report.entries.push(VerifiedEntry { key, status });
        }

        Ok(report)
    }
}

/// Render `integrity="..."`
pub fn html_attribute(integrity: &str) -> String {
    format!("integrity=\"{}\"", integrity)
}

/// Accept either a bare value or an `integrity="..."` attribute
///
/// Returns `None` unless the result is a well-formed SRI value.
pub fn normalize_integrity(value: &str) -> Option<String> {
    let value = value.trim();
    let bare = value
        .strip_prefix("integrity=\"")
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value);

    asset_digest::is_valid_integrity(bare).then(|| bare.to_string())
}

fn cache_key(path: &Path, mtime_nanos: u128, size: u64) -> String {
    let normalized = path.to_string_lossy().replace('\\', "/");
    let material = format!("{}|{}|{}", normalized, mtime_nanos, size);
    let digest = hex::encode(Sha256::digest(material.as_bytes()));
    format!("{}:{}:{}", CACHE_KEY_PREFIX, DEFAULT_ALGORITHM, &digest[..32])
}
