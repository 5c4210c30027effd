//! Showcase Assets - manifest-driven asset loading with subresource integrity
//!
//! This crate resolves logical asset names through a build manifest
//! (`manifest.json`), computes SRI digests for the resolved files and
//! renders `<script>`/`<link>` tags carrying `integrity` and `crossorigin`.
//! Build-time tooling lives in the `asset-tools` crate; both share the
//! digest code in `asset-digest`.

pub mod cache;
pub mod config;
pub mod enqueue;
pub mod manifest;
pub mod sri;

pub use cache::{CacheBackend, CacheError, FileCache, MemoryCache, NullCache};
pub use config::{AssetConfig, ConfigError};
pub use enqueue::{AssetKind, AssetLoader, AssetRegistry, EnqueueError};
pub use manifest::{Manifest, ManifestEntry, ManifestError, ManifestErrorKind, ResolvedAsset};
pub use sri::{IntegrityRecord, SriError, SriGenerator, VerifiedEntry, VerifyReport, VerifyStatus};
