//! Manifest-driven script/style enqueueing
//!
//! [`AssetLoader`] resolves a logical name through the [`Manifest`],
//! registers the result in an [`AssetRegistry`] and, when an
//! [`SriGenerator`] is attached, adds `integrity` + `crossorigin`.
//!
//! Failure policy:
//! - manifest resolution fails → the call fails; nothing is registered
//! - integrity fails → the asset is still enqueued without the attribute

pub mod html;
mod registry;

pub use registry::{sanitize_dependencies, sanitize_handle, AssetKind, AssetRegistry, RegisteredAsset};

use std::sync::Arc;

use tracing::{debug, warn};

use crate::cache::{self, CacheError};
use crate::config::AssetConfig;
use crate::manifest::{Manifest, ManifestError};
use crate::sri::SriGenerator;

/// Errors from enqueue calls
#[derive(Debug, thiserror::Error)]
pub enum EnqueueError {
    #[error("invalid asset handle '{handle}'")]
    InvalidHandle { handle: String },

    #[error(transparent)]
    Manifest(#[from] ManifestError),
}

impl EnqueueError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidHandle { .. } => "aps_manifest_invalid_handle",
            Self::Manifest(e) => e.code(),
        }
    }
}

/// Enqueues manifest assets with optional SRI
pub struct AssetLoader {
    manifest: Arc<Manifest>,
    sri: Option<SriGenerator>,
    crossorigin: String,
    registry: AssetRegistry,
}

impl AssetLoader {
    /// Loader without integrity attributes
    pub fn new(manifest: Arc<Manifest>) -> Self {
        let crossorigin = manifest.config().integrity.crossorigin.clone();
        Self {
            manifest,
            sri: None,
            crossorigin,
            registry: AssetRegistry::new(),
        }
    }

    /// Attach an integrity generator
    pub fn with_sri(mut self, sri: SriGenerator) -> Self {
        self.sri = Some(sri);
        self
    }

    /// Build manifest, cache and (if enabled) SRI from configuration
    pub fn from_config(config: AssetConfig) -> Result<Self, CacheError> {
        let backend = cache::from_settings(&config.cache)?;
        let integrity_enabled = config.integrity.enabled;
        let manifest = Arc::new(Manifest::new(config, Arc::clone(&backend)));

        let loader = Self::new(Arc::clone(&manifest));
        Ok(if integrity_enabled {
            loader.with_sri(SriGenerator::new(&manifest, backend))
        } else {
            loader
        })
    }

    pub fn manifest(&self) -> &Arc<Manifest> {
        &self.manifest
    }

    pub fn sri(&self) -> Option<&SriGenerator> {
        self.sri.as_ref()
    }

    pub fn registry(&self) -> &AssetRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut AssetRegistry {
        &mut self.registry
    }

    /// Resolve, register and enqueue a script
    pub fn enqueue_script<S: AsRef<str>>(
        &mut self,
        handle: &str,
        key: &str,
        deps: &[S],
        in_footer: bool,
    ) -> Result<(), EnqueueError> {
        let (handle, asset) = self.prepare(handle, key)?;
        let deps = sanitize_dependencies(deps);

        let registered = self.registry.register(RegisteredAsset::script(
            &handle,
            &asset.url,
            Some(&asset.version),
            deps,
            in_footer,
        ));
        self.finish(AssetKind::Script, &handle, key, registered);
        Ok(())
    }

    /// Resolve, register and enqueue a stylesheet
    pub fn enqueue_style<S: AsRef<str>>(
        &mut self,
        handle: &str,
        key: &str,
        deps: &[S],
        media: &str,
    ) -> Result<(), EnqueueError> {
        let (handle, asset) = self.prepare(handle, key)?;
        let deps = sanitize_dependencies(deps);
        let media = if media.trim().is_empty() { "all" } else { media.trim() };

        let registered = self.registry.register(RegisteredAsset::style(
            &handle,
            &asset.url,
            Some(&asset.version),
            deps,
            media,
        ));
        self.finish(AssetKind::Style, &handle, key, registered);
        Ok(())
    }

    /// Head output (styles and head scripts) not yet printed
    pub fn render_head(&mut self) -> String {
        self.registry.render_head()
    }

    /// Remaining output for the end of the body
    pub fn render_footer(&mut self) -> String {
        self.registry.render_footer()
    }

    fn prepare(
        &self,
        handle: &str,
        key: &str,
    ) -> Result<(String, crate::manifest::ResolvedAsset), EnqueueError> {
        let asset = self.manifest.get_asset(key).map_err(|e| {
            warn!(key = key, code = e.code(), error = %e, "asset not enqueued");
            EnqueueError::Manifest(e)
        })?;

        let sanitized = sanitize_handle(handle);
        if sanitized.is_empty() {
            warn!(handle = handle, "asset not enqueued: invalid handle");
            return Err(EnqueueError::InvalidHandle {
                handle: handle.to_string(),
            });
        }

        Ok((sanitized, asset))
    }

    fn finish(&mut self, kind: AssetKind, handle: &str, key: &str, registered: bool) {
        if registered {
            self.apply_integrity(kind, handle, key);
        } else {
            debug!(handle = handle, "handle already registered; keeping first registration");
        }
        self.registry.enqueue(kind, handle);
    }

    fn apply_integrity(&mut self, kind: AssetKind, handle: &str, key: &str) {
        let Some(sri) = &self.sri else {
            return;
        };

        match sri.integrity_for_asset(key) {
            Ok(integrity) => {
                self.registry.add_data(kind, handle, "integrity", &integrity);
                self.registry
                    .add_data(kind, handle, "crossorigin", &self.crossorigin);
            }
            Err(e) => {
                warn!(
                    handle = handle,
                    key = key,
                    code = e.code(),
                    error = %e,
                    "integrity unavailable; serving asset without it"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::NullCache;
    use std::fs;
    use tempfile::TempDir;

    const NO_DEPS: &[&str] = &[];

    fn setup() -> (TempDir, Arc<Manifest>) {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("js")).unwrap();
        fs::create_dir_all(dir.path().join("css")).unwrap();
        fs::write(dir.path().join("js/admin.js"), "console.log('ok');").unwrap();
        fs::write(dir.path().join("css/admin.css"), "body{}").unwrap();
        fs::write(
            dir.path().join("manifest.json"),
            r#"{"admin.js": {"file": "js/admin.js"}, "admin.css": {"file": "css/admin.css"}}"#,
        )
        .unwrap();

        let config = AssetConfig::new(
            dir.path().to_string_lossy().to_string(),
            "https://example.com/dist/",
        );
        (dir, Arc::new(Manifest::new(config, Arc::new(NullCache))))
    }

    #[test]
    fn test_enqueue_script_with_sri() {
        let (_dir, manifest) = setup();
        let sri = SriGenerator::new(&manifest, Arc::new(NullCache));
        let mut loader = AssetLoader::new(manifest).with_sri(sri);

        loader.enqueue_script("aps-admin", "admin.js", NO_DEPS, true).unwrap();

        let asset = loader.registry().get(AssetKind::Script, "aps-admin").unwrap();
        assert!(asset.integrity().unwrap().starts_with("sha384-"));
        assert_eq!(asset.data.get("crossorigin").map(String::as_str), Some("anonymous"));
        assert!(loader.registry().is_enqueued(AssetKind::Script, "aps-admin"));
    }

    #[test]
    fn test_enqueue_script_without_sri() {
        let (_dir, manifest) = setup();
        let mut loader = AssetLoader::new(manifest);

        loader.enqueue_script("aps-admin", "admin.js", NO_DEPS, true).unwrap();

        let asset = loader.registry().get(AssetKind::Script, "aps-admin").unwrap();
        assert!(asset.integrity().is_none());
        assert!(!loader.render_footer().contains("integrity"));
    }

    #[test]
    fn test_manifest_failure_fails_call() {
        let (_dir, manifest) = setup();
        let mut loader = AssetLoader::new(manifest);

        let err = loader
            .enqueue_script("aps-missing", "missing.js", NO_DEPS, true)
            .unwrap_err();
        assert_eq!(err.code(), "aps_manifest_missing_entry");
        assert!(!loader.registry().is_registered(AssetKind::Script, "aps-missing"));
    }

    #[test]
    fn test_sri_failure_degrades() {
        let (_dir, manifest) = setup();

        // Resolution succeeds; hashing trips the size limit
        let mut config = manifest.config().clone();
        config.limits.max_asset_bytes = 8;
        let manifest = Arc::new(Manifest::new(config, Arc::new(NullCache)));
        let sri = SriGenerator::new(&manifest, Arc::new(NullCache));
        let mut loader = AssetLoader::new(manifest).with_sri(sri);

        loader.enqueue_script("aps-admin", "admin.js", NO_DEPS, true).unwrap();
        let asset = loader.registry().get(AssetKind::Script, "aps-admin").unwrap();
        assert!(asset.integrity().is_none());
        assert!(loader.render_footer().contains("admin.js?ver="));
    }

    #[test]
    fn test_invalid_handle() {
        let (_dir, manifest) = setup();
        let mut loader = AssetLoader::new(manifest);

        let err = loader.enqueue_script("???", "admin.js", NO_DEPS, true).unwrap_err();
        assert!(matches!(err, EnqueueError::InvalidHandle { .. }));
    }

    #[test]
    fn test_same_handle_twice_single_tag() {
        let (_dir, manifest) = setup();
        let mut loader = AssetLoader::new(manifest);

        loader.enqueue_script("aps-admin", "admin.js", NO_DEPS, true).unwrap();
        loader.enqueue_script("aps-admin", "admin.js", NO_DEPS, true).unwrap();

        let html = format!("{}{}", loader.render_head(), loader.render_footer());
        assert_eq!(html.matches("<script").count(), 1);
    }

    #[test]
    fn test_enqueue_style_and_deps() {
        let (_dir, manifest) = setup();
        let sri = SriGenerator::new(&manifest, Arc::new(NullCache));
        let mut loader = AssetLoader::new(manifest).with_sri(sri);

        loader.enqueue_style("APS Admin", "admin.css", &["Dashicons", ""], " ").unwrap();

        let asset = loader.registry().get(AssetKind::Style, "aps-admin").unwrap();
        assert_eq!(asset.deps, vec!["dashicons".to_string()]);
        assert_eq!(asset.media, "all");
        assert!(asset.integrity().is_some());
    }

    #[test]
    fn test_from_config_respects_integrity_switch() {
        let (dir, _) = setup();
        let mut config = AssetConfig::new(dir.path().to_string_lossy().to_string(), "/dist/");
        config.cache.backend = crate::config::CacheBackendKind::Disabled;
        config.integrity.enabled = false;

        let loader = AssetLoader::from_config(config).unwrap();
        assert!(loader.sri().is_none());
    }
}
