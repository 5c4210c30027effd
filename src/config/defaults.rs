//! Built-in defaults
//!
//! Values used when `assets.toml` leaves a field out.

/// Default config file location
pub const DEFAULT_CONFIG_PATH: &str = "assets.toml";

/// Default dist directory (build output root)
pub const DEFAULT_DIST_PATH: &str = "assets/dist";

/// Manifest file name inside the dist directory
pub const MANIFEST_FILE_NAME: &str = "manifest.json";

/// Parsed manifest lifetime in the cache (10 minutes)
pub const MANIFEST_TTL_SECONDS: u64 = 600;

/// Integrity digest lifetime in the cache (1 day)
pub const INTEGRITY_TTL_SECONDS: u64 = 86_400;

/// Largest manifest file accepted (1 MiB)
pub const MAX_MANIFEST_BYTES: u64 = 1024 * 1024;

/// Largest asset hashed at request time (32 MiB)
pub const MAX_ASSET_BYTES: u64 = 32 * 1024 * 1024;

/// Default `crossorigin` value attached with integrity
pub const CROSSORIGIN: &str = "anonymous";

/// Default directory for the file cache backend
pub const FILE_CACHE_DIR: &str = ".cache/showcase-assets";

pub(super) fn dist_path() -> String {
    DEFAULT_DIST_PATH.to_string()
}

pub(super) fn manifest_ttl_seconds() -> u64 {
    MANIFEST_TTL_SECONDS
}

pub(super) fn integrity_ttl_seconds() -> u64 {
    INTEGRITY_TTL_SECONDS
}

pub(super) fn max_manifest_bytes() -> u64 {
    MAX_MANIFEST_BYTES
}

pub(super) fn max_asset_bytes() -> u64 {
    MAX_ASSET_BYTES
}

pub(super) fn crossorigin() -> String {
    CROSSORIGIN.to_string()
}

pub(super) fn file_cache_dir() -> String {
    FILE_CACHE_DIR.to_string()
}

pub(super) fn enabled() -> bool {
    true
}
