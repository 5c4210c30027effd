//! Build tools → manifest → integrity → rendered tags

use std::fs;
use std::path::Path;
use std::sync::Arc;

use asset_tools::{generate, SriOptions};
use base64::{engine::general_purpose::STANDARD, Engine};
use sha2::{Digest, Sha384};
use showcase_assets::cache::{CacheBackend, FileCache, MemoryCache, NullCache};
use showcase_assets::config::CacheBackendKind;
use showcase_assets::{
    AssetConfig, AssetLoader, Manifest, ManifestErrorKind, SriGenerator, VerifyStatus,
};
use tempfile::TempDir;

const ADMIN_JS: &str = "console.log('ok');";
const NO_DEPS: &[&str] = &[];

fn create_dist(manifest: &str) -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("js")).unwrap();
    fs::write(dir.path().join("js/admin.js"), ADMIN_JS).unwrap();
    fs::write(dir.path().join("manifest.json"), manifest).unwrap();
    dir
}

fn config_for(dir: &Path) -> AssetConfig {
    AssetConfig::new(dir.to_string_lossy().to_string(), "https://example.com/dist")
}

fn independent_sri(bytes: &[u8]) -> String {
    format!("sha384-{}", STANDARD.encode(Sha384::digest(bytes)))
}

#[test]
fn test_admin_js_scenario() {
    let dir = create_dist(r#"{"admin.js": {"file": "js/admin.js"}}"#);
    let manifest = Arc::new(Manifest::new(config_for(dir.path()), Arc::new(NullCache)));

    let asset = manifest.get_asset("admin.js").unwrap();
    assert_eq!(asset.url, "https://example.com/dist/js/admin.js");
    assert!(asset.version.parse::<u64>().is_ok());

    let sri = SriGenerator::new(&manifest, Arc::new(NullCache));
    let integrity = sri.generate_hash(&asset.path).unwrap();
    assert_eq!(integrity, independent_sri(ADMIN_JS.as_bytes()));
    assert_eq!(sri.generate_hash(&asset.path).unwrap(), integrity);
}

#[test]
fn test_other_js_scenario() {
    let dir = create_dist(r#"{"other.js": {"file": "js/other.js"}}"#);
    let manifest = Manifest::new(config_for(dir.path()), Arc::new(NullCache));

    let err = manifest.get_asset("admin.js").unwrap_err();
    assert_eq!(err.kind(), ManifestErrorKind::NotFound);

    let err = manifest.get_asset("other.js").unwrap_err();
    assert_eq!(err.kind(), ManifestErrorKind::FileMissing);
}

#[test]
fn test_malformed_manifest_page_still_renders() {
    let dir = create_dist("{\"admin.js\": ");
    let mut loader = AssetLoader::from_config({
        let mut config = config_for(dir.path());
        config.cache.backend = CacheBackendKind::Disabled;
        config
    })
    .unwrap();

    let err = loader
        .enqueue_script("aps-admin", "admin.js", NO_DEPS, true)
        .unwrap_err();
    assert!(err.to_string().contains("invalid JSON"));
    assert!(loader.render_footer().is_empty());
}

#[test]
fn test_generate_sri_feeds_runtime() {
    let dir = create_dist(r#"{"admin.js": {"file": "js/admin.js", "isEntry": true}}"#);
    let outcome = generate(dir.path(), &SriOptions::default()).unwrap();
    assert_eq!(outcome.merged, 1);

    let manifest = Arc::new(Manifest::new(config_for(dir.path()), Arc::new(NullCache)));
    let precomputed = manifest.entry("admin.js").unwrap().integrity.unwrap();
    assert_eq!(precomputed, independent_sri(ADMIN_JS.as_bytes()));

    let sri = SriGenerator::new(&manifest, Arc::new(NullCache));
    assert_eq!(sri.integrity_for_asset("admin.js").unwrap(), precomputed);

    let mut loader = AssetLoader::new(Arc::clone(&manifest)).with_sri(sri);
    loader.enqueue_script("aps-admin", "admin.js", NO_DEPS, true).unwrap();
    let html = loader.render_footer();
    assert_eq!(html.matches("<script").count(), 1);
    assert!(html.contains(&format!("integrity=\"{}\"", precomputed)));
    assert!(html.contains("crossorigin=\"anonymous\""));
}

#[test]
fn test_edited_file_is_rehashed_when_not_trusting_manifest() {
    let dir = create_dist(r#"{"admin.js": {"file": "js/admin.js"}}"#);
    generate(dir.path(), &SriOptions::default()).unwrap();

    // Edit after the build without rerunning the tools
    let edited = "console.log('edited');";
    fs::write(dir.path().join("js/admin.js"), edited).unwrap();

    let mut config = config_for(dir.path());
    config.integrity.trust_manifest = false;
    let manifest = Arc::new(Manifest::new(config, Arc::new(MemoryCache::new())));
    let sri = SriGenerator::new(&manifest, Arc::new(MemoryCache::new()));

    let stale = manifest.entry("admin.js").unwrap().integrity.unwrap();
    let path = manifest.get_asset_path("admin.js").unwrap();
    assert!(!sri.verify_hash(&path, &stale));
    assert_eq!(
        sri.integrity_for_asset("admin.js").unwrap(),
        independent_sri(edited.as_bytes())
    );
}

#[test]
fn test_verify_flags_file_edited_after_build() {
    let dir = create_dist(
        r#"{"admin.js": {"file": "js/admin.js"}, "site.css": {"file": "css/site.css"}, "extra.js": {"file": "js/extra.js"}}"#,
    );
    fs::create_dir_all(dir.path().join("css")).unwrap();
    fs::write(dir.path().join("css/site.css"), "body{margin:0}").unwrap();
    fs::write(dir.path().join("js/extra.js"), "export default 1;").unwrap();

    let outcome = generate(dir.path(), &SriOptions::default()).unwrap();
    assert_eq!(outcome.merged, 3);

    fs::write(dir.path().join("css/site.css"), "body{margin:1px}").unwrap();

    let loader = AssetLoader::from_config({
        let mut config = config_for(dir.path());
        config.cache.backend = CacheBackendKind::Disabled;
        config
    })
    .unwrap();
    let report = loader.sri().unwrap().verify_manifest().unwrap();

    assert_eq!(report.total, 3);
    assert_eq!(report.checked(), 3);
    assert_eq!(report.problems(), 1);
    for entry in &report.entries {
        let expected = if entry.key == "site.css" {
            VerifyStatus::Mismatch
        } else {
            VerifyStatus::Ok
        };
        assert_eq!(entry.status, expected, "{}", entry.key);
    }
}

#[test]
fn test_file_cache_shared_between_loaders() {
    let dir = create_dist(r#"{"admin.js": {"file": "js/admin.js"}}"#);
    let cache_dir = TempDir::new().unwrap();
    let backend: Arc<dyn CacheBackend> = Arc::new(FileCache::open(cache_dir.path()).unwrap());

    let first = Arc::new(Manifest::new(config_for(dir.path()), Arc::clone(&backend)));
    let sri = SriGenerator::new(&first, Arc::clone(&backend));
    let integrity = sri.integrity_for_asset("admin.js").unwrap();
    assert!(fs::read_dir(cache_dir.path()).unwrap().count() >= 2);

    // A second "process" sees the same cached manifest and digest
    let second = Arc::new(Manifest::new(config_for(dir.path()), Arc::clone(&backend)));
    let sri = SriGenerator::new(&second, backend);
    assert_eq!(sri.integrity_for_asset("admin.js").unwrap(), integrity);
}

#[test]
fn test_loader_from_toml_config() {
    let dir = create_dist(r#"{"admin.js": {"file": "js/admin.js"}}"#);
    let cache_dir = TempDir::new().unwrap();
    let toml = format!(
        r#"
dist_path = "{}"
dist_url = "/wp-content/plugins/showcase/assets/dist/"

[cache]
backend = "file"
dir = "{}"

[integrity]
crossorigin = "use-credentials"
"#,
        dir.path().display().to_string().replace('\\', "/"),
        cache_dir.path().display().to_string().replace('\\', "/"),
    );
    let config = AssetConfig::from_str(&toml).unwrap();

    let mut loader = AssetLoader::from_config(config).unwrap();
    loader.enqueue_script("aps-admin", "admin.js", NO_DEPS, false).unwrap();

    let head = loader.render_head();
    assert!(head.contains("src=\"/wp-content/plugins/showcase/assets/dist/js/admin.js?ver="));
    assert!(head.contains("integrity=\"sha384-"));
    assert!(head.contains("crossorigin=\"use-credentials\""));
    assert!(loader.render_footer().is_empty());
}
