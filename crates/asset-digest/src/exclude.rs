//! Exclusion rules for dist walking
//!
//! Derivative files (source maps, pre-compressed siblings) and the tools' own
//! reports are never hashed or compressed again.

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::path::Path;

/// Patterns excluded from every walk
const DEFAULT_EXCLUDES: &[&str] = &["*.map", "*.gz", "*.br"];

/// Exclusion rules for filtering dist files
#[derive(Debug, Clone)]
pub struct ExcludeRules {
    patterns: Vec<String>,
    glob_set: GlobSet,
}

impl ExcludeRules {
    /// Default exclusions plus the given report/output file names
    ///
    /// Names match at any depth, case-insensitively.
    pub fn new(skip_names: &[&str]) -> Result<Self, globset::Error> {
        let mut patterns: Vec<String> = DEFAULT_EXCLUDES.iter().map(|p| p.to_string()).collect();
        patterns.extend(skip_names.iter().map(|name| format!("**/{}", name)));
        Self::build(patterns)
    }

    /// Add additional glob patterns
    pub fn with_patterns<S: AsRef<str>>(self, extra: &[S]) -> Result<Self, globset::Error> {
        let mut patterns = self.patterns;
        patterns.extend(
            extra
                .iter()
                .map(|p| p.as_ref().trim().to_string())
                .filter(|p| !p.is_empty()),
        );
        Self::build(patterns)
    }

    fn build(patterns: Vec<String>) -> Result<Self, globset::Error> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &patterns {
            builder.add(GlobBuilder::new(pattern).case_insensitive(true).build()?);
        }

        Ok(Self {
            glob_set: builder.build()?,
            patterns,
        })
    }

    /// Check if a dist-relative path should be skipped
    pub fn is_excluded(&self, relative: &Path) -> bool {
        let path_str = relative.to_string_lossy().replace('\\', "/");
        self.glob_set.is_match(path_str.as_str())
    }

    /// Patterns in effect, defaults first
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}
