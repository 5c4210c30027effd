//! Manifest error taxonomy

use std::io;
use std::path::PathBuf;

use crate::cache::CacheError;

/// Coarse classification callers branch on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestErrorKind {
    /// The manifest itself could not be loaded (missing, unreadable, bad JSON)
    Load,
    /// A caller-supplied key or a manifest entry failed validation
    Invalid,
    /// The key is not present in the manifest
    NotFound,
    /// The manifest names a file that is not on disk
    FileMissing,
    /// The cache backend failed
    Cache,
}

/// Errors for manifest loading and asset resolution
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("asset manifest not found or not a file: {}", path.display())]
    Missing { path: PathBuf },

    #[error("unable to read asset manifest {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("asset manifest {} is {size} bytes, above the {limit} byte limit", path.display())]
    TooLarge { path: PathBuf, size: u64, limit: u64 },

    #[error("invalid JSON in asset manifest: {message}")]
    InvalidJson { message: String },

    #[error("asset manifest must be a JSON object of entries")]
    InvalidSchema,

    #[error("invalid manifest key '{key}': keys must match [A-Za-z0-9._-]+")]
    InvalidKey { key: String },

    #[error("manifest entry '{key}' must contain a non-empty \"file\" string")]
    InvalidEntry { key: String },

    #[error("manifest file path '{file}' must stay within the dist directory")]
    InvalidPath { file: String },

    #[error("asset '{key}' is not present in the manifest")]
    EntryNotFound { key: String },

    #[error("asset '{key}' references {}, which does not exist", path.display())]
    FileMissing { key: String, path: PathBuf },

    #[error("manifest cache error: {0}")]
    Cache(#[from] CacheError),
}

impl ManifestError {
    pub fn kind(&self) -> ManifestErrorKind {
        match self {
            Self::Missing { .. }
            | Self::Unreadable { .. }
            | Self::TooLarge { .. }
            | Self::InvalidJson { .. }
            | Self::InvalidSchema => ManifestErrorKind::Load,
            Self::InvalidKey { .. } | Self::InvalidEntry { .. } | Self::InvalidPath { .. } => {
                ManifestErrorKind::Invalid
            }
            Self::EntryNotFound { .. } => ManifestErrorKind::NotFound,
            Self::FileMissing { .. } => ManifestErrorKind::FileMissing,
            Self::Cache(_) => ManifestErrorKind::Cache,
        }
    }

    /// Stable machine-readable code, suitable for logs and admin notices
    pub fn code(&self) -> &'static str {
        match self {
            Self::Missing { .. } => "aps_manifest_missing",
            Self::Unreadable { .. } => "aps_manifest_unreadable",
            Self::TooLarge { .. } => "aps_manifest_too_large",
            Self::InvalidJson { .. } => "aps_manifest_invalid_json",
            Self::InvalidSchema => "aps_manifest_invalid_schema",
            Self::InvalidKey { .. } => "aps_manifest_invalid_key",
            Self::InvalidEntry { .. } => "aps_manifest_invalid_entry",
            Self::InvalidPath { .. } => "aps_manifest_invalid_path",
            Self::EntryNotFound { .. } => "aps_manifest_missing_entry",
            Self::FileMissing { .. } => "aps_manifest_file_missing",
            Self::Cache(_) => "aps_manifest_cache",
        }
    }
}
