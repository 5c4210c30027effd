//! Manifest entries and structural validation

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ManifestError;

/// Validated manifest contents, ordered by key
pub type ManifestEntries = BTreeMap<String, ManifestEntry>;

/// A single logical asset in the build manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Path relative to the dist root
    pub file: String,

    /// Precomputed SRI value merged in by `generate-sri`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integrity: Option<String>,
}

impl ManifestEntry {
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            integrity: None,
        }
    }

    /// `file` without leading separators
    pub fn relative_path(&self) -> &str {
        self.file.trim_start_matches(['/', '\\'])
    }
}

fn key_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9._-]+$").expect("static regex"))
}

fn scheme_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)^[a-z]+:/").expect("static regex"))
}

/// Logical names are restricted to `[A-Za-z0-9._-]+`
pub fn is_safe_asset_name(key: &str) -> bool {
    key_pattern().is_match(key)
}

/// Reject traversal, backslashes and absolute URLs
pub fn is_safe_asset_path(path: &str) -> bool {
    !path.contains("..") && !path.contains('\\') && !scheme_pattern().is_match(path)
}

/// Trim and validate a caller-supplied key
pub fn sanitize_asset_key(key: &str) -> Result<&str, ManifestError> {
    let key = key.trim();
    if key.is_empty() || !is_safe_asset_name(key) {
        return Err(ManifestError::InvalidKey {
            key: key.to_string(),
        });
    }
    Ok(key)
}

/// Parse raw manifest bytes into validated entries
///
/// Unknown per-entry fields (Vite's `src`, `isEntry`, `css`, ...) are
/// accepted and dropped. A non-string `integrity` is ignored rather than
/// rejected, since it only disables the precomputed fast path.
pub fn parse_manifest(bytes: &[u8]) -> Result<ManifestEntries, ManifestError> {
    let decoded: Value = serde_json::from_slice(bytes).map_err(|e| ManifestError::InvalidJson {
        message: e.to_string(),
    })?;

    let Value::Object(map) = decoded else {
        return Err(ManifestError::InvalidSchema);
    };

    let mut entries = ManifestEntries::new();
    for (key, payload) in map {
        if !is_safe_asset_name(&key) {
            return Err(ManifestError::InvalidKey { key });
        }

        let file = payload
            .get("file")
            .and_then(Value::as_str)
            .filter(|f| !f.is_empty());
        let Some(file) = file else {
            return Err(ManifestError::InvalidEntry { key });
        };

        if !is_safe_asset_path(file) {
            return Err(ManifestError::InvalidPath {
                file: file.to_string(),
            });
        }

        let integrity = payload
            .get("integrity")
            .and_then(Value::as_str)
            .map(str::to_string);

        entries.insert(
            key,
            ManifestEntry {
                file: file.to_string(),
                integrity,
            },
        );
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_manifest() {
        let json = br#"{
            "admin.js": {"file": "js/admin.js", "isEntry": true},
            "site.css": {"file": "css/site.css", "integrity": "sha384-abc"}
        }"#;
        let entries = parse_manifest(json).unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries["admin.js"], ManifestEntry::new("js/admin.js"));
        assert_eq!(entries["site.css"].integrity.as_deref(), Some("sha384-abc"));
    }

    #[test]
    fn test_invalid_json_message() {
        let err = parse_manifest(b"{ not json").unwrap_err();
        assert!(matches!(err, ManifestError::InvalidJson { .. }));
        assert!(err.to_string().starts_with("invalid JSON"));
    }

    #[test]
    fn test_non_object_is_schema_error() {
        assert!(matches!(
            parse_manifest(b"[1, 2, 3]"),
            Err(ManifestError::InvalidSchema)
        ));
        assert!(matches!(parse_manifest(b"\"x\""), Err(ManifestError::InvalidSchema)));
    }

    #[test]
    fn test_unsafe_key_rejected() {
        let err = parse_manifest(br#"{"src/admin.ts": {"file": "js/admin.js"}}"#).unwrap_err();
        assert!(matches!(err, ManifestError::InvalidKey { key } if key == "src/admin.ts"));
    }

    #[test]
    fn test_entry_without_file_rejected() {
        for json in [
            br#"{"admin.js": {}}"#.as_slice(),
            br#"{"admin.js": {"file": ""}}"#.as_slice(),
            br#"{"admin.js": {"file": 42}}"#.as_slice(),
            br#"{"admin.js": "js/admin.js"}"#.as_slice(),
        ] {
            assert!(matches!(
                parse_manifest(json),
                Err(ManifestError::InvalidEntry { .. })
            ));
        }
    }

    #[test]
    fn test_unsafe_paths_rejected() {
        for file in ["../secret.js", "js\\admin.js", "https://evil.test/x.js", "C:/x.js"] {
            let json = serde_json::json!({ "admin.js": { "file": file } }).to_string();
            assert!(
                matches!(parse_manifest(json.as_bytes()), Err(ManifestError::InvalidPath { .. })),
                "{} should be rejected",
                file
            );
        }
    }

    #[test]
    fn test_non_string_integrity_ignored() {
        let entries =
            parse_manifest(br#"{"admin.js": {"file": "js/admin.js", "integrity": 1}}"#).unwrap();
        assert_eq!(entries["admin.js"].integrity, None);
    }

    #[test]
    fn test_sanitize_asset_key() {
        assert_eq!(sanitize_asset_key("  admin.js ").unwrap(), "admin.js");
        assert!(sanitize_asset_key("").is_err());
        assert!(sanitize_asset_key("a b").is_err());
        assert!(sanitize_asset_key("../x").is_err());
    }

    #[test]
    fn test_relative_path_strips_leading_separators() {
        assert_eq!(ManifestEntry::new("/js/admin.js").relative_path(), "js/admin.js");
        assert_eq!(ManifestEntry::new("js/admin.js").relative_path(), "js/admin.js");
    }
}
