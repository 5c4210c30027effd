//! Asset pipeline configuration (assets.toml)
//!
//! Everything has a default except `dist_url`, which depends on where the
//! plugin is served from. A minimal file looks like:
//!
//! ```toml
//! dist_path = "assets/dist"
//! dist_url = "https://example.com/wp-content/plugins/affiliate-product-showcase/assets/dist/"
//! ```

mod defaults;

pub use defaults::{
    DEFAULT_CONFIG_PATH, DEFAULT_DIST_PATH, INTEGRITY_TTL_SECONDS, MANIFEST_FILE_NAME,
    MANIFEST_TTL_SECONDS, MAX_ASSET_BYTES, MAX_MANIFEST_BYTES,
};

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Error types for config operations
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// Which cache backend holds parsed manifests and digests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackendKind {
    /// In-process map shared by every loader in the process
    #[default]
    Memory,
    /// JSON files on disk, shared between processes on one host
    File,
    /// No caching
    #[serde(rename = "none")]
    Disabled,
}

/// How the cache-busting `ver` token is derived
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionStrategy {
    /// File modification time in nanoseconds since the epoch
    ///
    /// Resolution is whatever the filesystem records; on coarse filesystems
    /// two writes in the same tick share a token, so use `Content` there.
    #[default]
    Mtime,
    /// Short digest of the file bytes
    Content,
}

/// Cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    #[serde(default)]
    pub backend: CacheBackendKind,

    /// Directory for the `file` backend
    #[serde(default = "defaults::file_cache_dir")]
    pub dir: String,

    #[serde(default = "defaults::manifest_ttl_seconds")]
    pub manifest_ttl_seconds: u64,

    #[serde(default = "defaults::integrity_ttl_seconds")]
    pub integrity_ttl_seconds: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            backend: CacheBackendKind::default(),
            dir: defaults::file_cache_dir(),
            manifest_ttl_seconds: defaults::manifest_ttl_seconds(),
            integrity_ttl_seconds: defaults::integrity_ttl_seconds(),
        }
    }
}

/// Subresource integrity settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegritySettings {
    /// Attach integrity attributes at all
    #[serde(default = "defaults::enabled")]
    pub enabled: bool,

    /// Value of the `crossorigin` attribute emitted with integrity
    #[serde(default = "defaults::crossorigin")]
    pub crossorigin: String,

    /// Serve `integrity` values precomputed by `generate-sri` from the manifest
    #[serde(default = "defaults::enabled")]
    pub trust_manifest: bool,
}

impl Default for IntegritySettings {
    fn default() -> Self {
        Self {
            enabled: true,
            crossorigin: defaults::crossorigin(),
            trust_manifest: true,
        }
    }
}

/// Size caps guarding against pathological inputs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Limits {
    #[serde(default = "defaults::max_manifest_bytes")]
    pub max_manifest_bytes: u64,

    #[serde(default = "defaults::max_asset_bytes")]
    pub max_asset_bytes: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_manifest_bytes: defaults::max_manifest_bytes(),
            max_asset_bytes: defaults::max_asset_bytes(),
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetConfig {
    /// Build output root on disk
    #[serde(default = "defaults::dist_path")]
    pub dist_path: String,

    /// Public URL of the dist root
    pub dist_url: String,

    /// Manifest location (default: `<dist_path>/manifest.json`)
    pub manifest_path: Option<String>,

    #[serde(default)]
    pub version: VersionStrategy,

    #[serde(default)]
    pub cache: CacheSettings,

    #[serde(default)]
    pub integrity: IntegritySettings,

    #[serde(default)]
    pub limits: Limits,
}

impl AssetConfig {
    /// Config rooted at `dist_path`, served from `dist_url`, all else default
    pub fn new(dist_path: impl Into<String>, dist_url: impl Into<String>) -> Self {
        Self {
            dist_path: dist_path.into(),
            dist_url: dist_url.into(),
            manifest_path: None,
            version: VersionStrategy::default(),
            cache: CacheSettings::default(),
            integrity: IntegritySettings::default(),
            limits: Limits::default(),
        }
    }

    /// Load and parse config from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_str(&contents)
    }

    /// Parse config from a TOML string
    pub fn from_str(s: &str) -> Result<Self, ConfigError> {
        let config: AssetConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dist_path.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "'dist_path' must not be empty".to_string(),
            ));
        }

        if self.dist_url.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "'dist_url' must not be empty".to_string(),
            ));
        }

        match self.integrity.crossorigin.as_str() {
            "anonymous" | "use-credentials" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid crossorigin '{}': must be 'anonymous' or 'use-credentials'",
                    other
                )))
            }
        }

        if self.limits.max_manifest_bytes == 0 || self.limits.max_asset_bytes == 0 {
            return Err(ConfigError::ValidationError(
                "Size limits must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    /// Dist root with backslashes normalized
    pub fn dist_dir(&self) -> PathBuf {
        PathBuf::from(normalize_path(&self.dist_path))
    }

    /// Absolute or configured manifest path
    pub fn manifest_file(&self) -> PathBuf {
        match &self.manifest_path {
            Some(path) => PathBuf::from(normalize_path(path)),
            None => self.dist_dir().join(MANIFEST_FILE_NAME),
        }
    }

    /// Dist URL guaranteed to end with exactly one `/`
    pub fn base_url(&self) -> String {
        format!("{}/", self.dist_url.trim_end_matches(['/', '\\']))
    }

    pub fn manifest_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.manifest_ttl_seconds)
    }

    pub fn integrity_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.integrity_ttl_seconds)
    }
}

fn normalize_path(path: &str) -> String {
    path.replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = AssetConfig::from_str(r#"dist_url = "https://example.com/dist""#).unwrap();

        assert_eq!(config.dist_path, DEFAULT_DIST_PATH);
        assert_eq!(config.manifest_file(), PathBuf::from("assets/dist/manifest.json"));
        assert_eq!(config.cache.backend, CacheBackendKind::Memory);
        assert_eq!(config.cache.manifest_ttl_seconds, MANIFEST_TTL_SECONDS);
        assert_eq!(config.cache.integrity_ttl_seconds, INTEGRITY_TTL_SECONDS);
        assert_eq!(config.integrity.crossorigin, "anonymous");
        assert!(config.integrity.enabled);
        assert!(config.integrity.trust_manifest);
        assert_eq!(config.version, VersionStrategy::Mtime);
    }

    #[test]
    fn test_full_config() {
        let toml = r#"
dist_path = "build\\dist"
dist_url = "https://cdn.example.com/dist///"
manifest_path = "build/.vite/manifest.json"
version = "content"

[cache]
backend = "file"
dir = "/tmp/assets-cache"
manifest_ttl_seconds = 30

[integrity]
crossorigin = "use-credentials"
trust_manifest = false

[limits]
max_asset_bytes = 1024
"#;
        let config = AssetConfig::from_str(toml).unwrap();

        assert_eq!(config.dist_dir(), PathBuf::from("build/dist"));
        assert_eq!(config.manifest_file(), PathBuf::from("build/.vite/manifest.json"));
        assert_eq!(config.base_url(), "https://cdn.example.com/dist/");
        assert_eq!(config.version, VersionStrategy::Content);
        assert_eq!(config.cache.backend, CacheBackendKind::File);
        assert_eq!(config.manifest_ttl(), Duration::from_secs(30));
        assert_eq!(config.cache.integrity_ttl_seconds, INTEGRITY_TTL_SECONDS);
        assert!(!config.integrity.trust_manifest);
        assert_eq!(config.limits.max_asset_bytes, 1024);
        assert_eq!(config.limits.max_manifest_bytes, MAX_MANIFEST_BYTES);
    }

    #[test]
    fn test_missing_dist_url_is_parse_error() {
        let result = AssetConfig::from_str(r#"dist_path = "dist""#);
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_empty_dist_url_rejected() {
        let result = AssetConfig::from_str(r#"dist_url = "  ""#);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_invalid_crossorigin_rejected() {
        let toml = r#"
dist_url = "https://example.com/dist/"

[integrity]
crossorigin = "sometimes"
"#;
        let result = AssetConfig::from_str(toml);
        assert!(matches!(result, Err(ConfigError::ValidationError(msg)) if msg.contains("crossorigin")));
    }

    #[test]
    fn test_zero_limit_rejected() {
        let toml = r#"
dist_url = "https://example.com/dist/"

[limits]
max_manifest_bytes = 0
"#;
        assert!(AssetConfig::from_str(toml).is_err());
    }
}
