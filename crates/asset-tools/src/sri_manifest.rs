//! `manifest-sri.json` generation and build manifest merging

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use asset_digest::{
    integrity_for_bytes, CompressionFormat, CompressionStats, DigestError, DistFile, DistWalker,
    ExcludeRules,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::compression::COMPRESSION_REPORT_FILE;
use crate::output::write_json;
use crate::{FileFailure, ToolError};

/// Build manifest emitted by the bundler
pub const MANIFEST_FILE: &str = "manifest.json";

/// Output of `generate-sri`
pub const SRI_MANIFEST_FILE: &str = "manifest-sri.json";

/// One hashed file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SriEntry {
    /// Path relative to the dist root
    pub path: String,
    pub integrity: String,
    pub size: u64,
    pub gzip: CompressionStats,
    pub brotli: CompressionStats,
}

/// Relative path → entry, sorted
pub type SriManifest = BTreeMap<String, SriEntry>;

/// Options for [`generate`]
#[derive(Debug, Clone)]
pub struct SriOptions {
    /// Extra glob patterns to skip
    pub excludes: Vec<String>,

    /// Write integrity values back into `manifest.json`
    pub merge: bool,
}

impl Default for SriOptions {
    fn default() -> Self {
        Self {
            excludes: Vec::new(),
            merge: true,
        }
    }
}

/// Result of a [`generate`] run
#[derive(Debug)]
pub struct SriOutcome {
    pub entries: SriManifest,
    pub failures: Vec<FileFailure>,
    pub output: PathBuf,
    /// Build manifest entries that received an integrity value
    pub merged: usize,
}

impl SriOutcome {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Hash every eligible file under `dist` and write `manifest-sri.json`
///
/// Per-file failures are collected, not fatal: the output still lists every
/// file that could be hashed.
pub fn generate(dist: &Path, options: &SriOptions) -> Result<SriOutcome, ToolError> {
    if !dist.is_dir() {
        return Err(ToolError::DistMissing(dist.to_path_buf()));
    }

    let rules = ExcludeRules::new(&[MANIFEST_FILE, SRI_MANIFEST_FILE, COMPRESSION_REPORT_FILE])
        .and_then(|rules| rules.with_patterns(&options.excludes))
        .map_err(DigestError::from)?;
    let files = DistWalker::new(dist, rules).collect()?;

    generate_for_files(dist, &files, options)
}

/// Hash an already collected file list and write the outputs under `dist`
pub fn generate_for_files(
    dist: &Path,
    files: &[DistFile],
    options: &SriOptions,
) -> Result<SriOutcome, ToolError> {
    let mut entries = SriManifest::new();
    let mut failures = Vec::new();

    for file in files {
        match hash_file(file) {
            Ok(entry) => {
                debug!(file = %file.relative, integrity = %entry.integrity, "hashed");
                entries.insert(file.relative.clone(), entry);
            }
            Err(e) => {
                warn!(file = %file.relative, error = %e, "failed to hash file");
                failures.push(FileFailure {
                    relative: file.relative.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    let output = dist.join(SRI_MANIFEST_FILE);
    write_json(&output, &entries)?;

    let manifest_path = dist.join(MANIFEST_FILE);
    let merged = if options.merge && manifest_path.is_file() {
        merge_into_manifest(&manifest_path, &entries)?
    } else {
        0
    };

    Ok(SriOutcome {
        entries,
        failures,
        output,
        merged,
    })
}

/// Integrity, size and compressed sizes for one file
pub fn hash_file(file: &DistFile) -> Result<SriEntry, ToolError> {
    let bytes = fs::read(&file.path).map_err(|e| ToolError::io(&file.path, e))?;

    let gzip = CompressionStats::measure(CompressionFormat::Gzip, &bytes)
        .map_err(|e| ToolError::io(&file.path, e))?;
    let brotli = CompressionStats::measure(CompressionFormat::Brotli, &bytes)
        .map_err(|e| ToolError::io(&file.path, e))?;

    Ok(SriEntry {
        path: file.relative.clone(),
        integrity: integrity_for_bytes(&bytes),
        size: bytes.len() as u64,
        gzip,
        brotli,
    })
}

/// Set `integrity` on every manifest entry whose `file` was hashed
///
/// All other fields are kept as they are. The manifest is only rewritten
/// when at least one value changed. Returns the number of entries that carry
/// a freshly computed integrity.
pub fn merge_into_manifest(path: &Path, entries: &SriManifest) -> Result<usize, ToolError> {
    let raw = fs::read_to_string(path).map_err(|e| ToolError::io(path, e))?;
    let mut manifest: Value =
        serde_json::from_str(&raw).map_err(|e| ToolError::InvalidManifest {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    let Some(map) = manifest.as_object_mut() else {
        return Err(ToolError::InvalidManifest {
            path: path.to_path_buf(),
            message: "top level is not an object".to_string(),
        });
    };

    let mut matched = 0;
    let mut changed = false;

    for (key, value) in map.iter_mut() {
        let Some(entry) = value.as_object_mut() else {
            debug!(key = %key, "skipping non-object manifest entry");
            continue;
        };
        let Some(file) = entry.get("file").and_then(Value::as_str) else {
            continue;
        };

        let relative = file.trim_start_matches(['/', '\\']);
        let Some(sri) = entries.get(relative) else {
            continue;
        };

        matched += 1;
        let integrity = Value::String(sri.integrity.clone());
        if entry.get("integrity") != Some(&integrity) {
            entry.insert("integrity".to_string(), integrity);
            changed = true;
        }
    }

    if changed {
        write_json(path, &manifest)?;
    }

    Ok(matched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const OK_JS_SRI: &str =
        "sha384-5Gl3y+KNz75Kwz8dC3aTFf+gd0mL/fefvtlccHev/tn4SQT+Ci+RBedvcMwNTc9P";

    fn create_dist() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("js")).unwrap();
        fs::write(dir.path().join("js/admin.js"), "console.log('ok');").unwrap();
        fs::write(dir.path().join("js/admin.js.map"), "{}").unwrap();
        dir
    }

    #[test]
    fn test_generate_writes_sri_manifest() {
        let dir = create_dist();
        let outcome = generate(dir.path(), &SriOptions::default()).unwrap();

        assert!(outcome.is_success());
        assert_eq!(outcome.entries.len(), 1);
        let entry = &outcome.entries["js/admin.js"];
        assert_eq!(entry.integrity, OK_JS_SRI);
        assert_eq!(entry.size, 18);

        let written: Value =
            serde_json::from_str(&fs::read_to_string(&outcome.output).unwrap()).unwrap();
        assert_eq!(written["js/admin.js"]["path"], "js/admin.js");
        assert_eq!(written["js/admin.js"]["integrity"], OK_JS_SRI);
        assert_eq!(written["js/admin.js"]["size"], 18);
    }

    #[test]
    fn test_generate_missing_dist() {
        let dir = TempDir::new().unwrap();
        let err = generate(&dir.path().join("dist"), &SriOptions::default()).unwrap_err();
        assert!(matches!(err, ToolError::DistMissing(_)));
    }

    #[test]
    fn test_generate_honours_excludes() {
        let dir = create_dist();
        fs::write(dir.path().join("js/vendor.js"), "v").unwrap();
        let options = SriOptions {
            excludes: vec!["**/vendor.js".to_string()],
            merge: true,
        };

        let outcome = generate(dir.path(), &options).unwrap();
        assert!(!outcome.entries.contains_key("js/vendor.js"));
    }

    #[test]
    fn test_rerun_skips_own_output() {
        let dir = create_dist();
        generate(dir.path(), &SriOptions::default()).unwrap();
        let outcome = generate(dir.path(), &SriOptions::default()).unwrap();
        assert!(!outcome.entries.contains_key(SRI_MANIFEST_FILE));
    }

    #[test]
    fn test_merge_preserves_fields() {
        let dir = create_dist();
        fs::write(
            dir.path().join(MANIFEST_FILE),
            r#"{"admin.js": {"file": "js/admin.js", "isEntry": true}, "gone.js": {"file": "js/gone.js"}}"#,
        )
        .unwrap();

        let outcome = generate(dir.path(), &SriOptions::default()).unwrap();
        assert_eq!(outcome.merged, 1);

        let manifest: Value =
            serde_json::from_str(&fs::read_to_string(dir.path().join(MANIFEST_FILE)).unwrap())
                .unwrap();
        assert_eq!(manifest["admin.js"]["integrity"], OK_JS_SRI);
        assert_eq!(manifest["admin.js"]["isEntry"], true);
        assert!(manifest["gone.js"].get("integrity").is_none());
    }

    #[test]
    fn test_no_merge_leaves_manifest_untouched() {
        let dir = create_dist();
        let original = r#"{"admin.js": {"file": "js/admin.js"}}"#;
        fs::write(dir.path().join(MANIFEST_FILE), original).unwrap();

        let options = SriOptions {
            merge: false,
            ..SriOptions::default()
        };
        generate(dir.path(), &options).unwrap();

        assert_eq!(fs::read_to_string(dir.path().join(MANIFEST_FILE)).unwrap(), original);
    }

    #[test]
    fn test_unreadable_file_is_reported_and_others_written() {
        let dir = create_dist();
        fs::write(dir.path().join(MANIFEST_FILE), r#"{"admin.js": {"file": "js/admin.js"}}"#).unwrap();

        let good = DistFile {
            path: dir.path().join("js/admin.js"),
            relative: "js/admin.js".to_string(),
            size: 18,
        };
        // Removed between the walk and the read
        let vanished = DistFile {
            path: dir.path().join("js/vanished.js"),
            relative: "js/vanished.js".to_string(),
            size: 10,
        };

        let outcome =
            generate_for_files(dir.path(), &[good, vanished], &SriOptions::default()).unwrap();

        assert!(!outcome.is_success());
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].relative, "js/vanished.js");
        assert!(outcome.failures[0].error.contains("vanished.js"));
        assert_eq!(outcome.merged, 1);

        let written: Value =
            serde_json::from_str(&fs::read_to_string(&outcome.output).unwrap()).unwrap();
        assert_eq!(written["js/admin.js"]["integrity"], OK_JS_SRI);
        assert!(written.get("js/vanished.js").is_none());
    }

    #[test]
    fn test_hash_file_missing_path() {
        let dir = TempDir::new().unwrap();
        let file = DistFile {
            path: dir.path().join("missing.js"),
            relative: "missing.js".to_string(),
            size: 0,
        };
        assert!(matches!(hash_file(&file), Err(ToolError::Io { .. })));
    }

    #[test]
    fn test_merge_invalid_manifest() {
        let dir = create_dist();
        fs::write(dir.path().join(MANIFEST_FILE), "{not json").unwrap();

        let err = generate(dir.path(), &SriOptions::default()).unwrap_err();
        assert!(matches!(err, ToolError::InvalidManifest { .. }));
        // hashes are still written
        assert!(dir.path().join(SRI_MANIFEST_FILE).exists());
    }
}
