//! Recursive dist directory walking

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::exclude::ExcludeRules;
use crate::{DigestError, DigestResult};

/// A regular file found under the dist root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistFile {
    /// Absolute (or root-joined) path on disk
    pub path: PathBuf,

    /// Path relative to the dist root, always `/`-separated
    pub relative: String,

    /// Size in bytes at walk time
    pub size: u64,
}

/// Walks a dist directory, yielding eligible files in a stable order
#[derive(Debug, Clone)]
pub struct DistWalker {
    root: PathBuf,
    rules: ExcludeRules,
}

impl DistWalker {
    pub fn new(root: impl Into<PathBuf>, rules: ExcludeRules) -> Self {
        Self {
            root: root.into(),
            rules,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Collect every non-excluded regular file, sorted by relative path
    ///
    /// Symlinks are not followed and are skipped.
    pub fn collect(&self) -> DigestResult<Vec<DistFile>> {
        let mut files = Vec::new();

        for entry in WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by(|a, b| a.file_name().cmp(b.file_name()))
        {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let rel_path = path
                .strip_prefix(&self.root)
                .map_err(|_| DigestError::PathNotInRoot(path.display().to_string()))?;

            if self.rules.is_excluded(rel_path) {
                continue;
            }

            let size = entry.metadata()?.len();
            files.push(DistFile {
                path: path.to_path_buf(),
                relative: to_forward_slashes(rel_path),
                size,
            });
        }

        files.sort_by(|a, b| a.relative.cmp(&b.relative));
        Ok(files)
    }
}

/// Render a relative path with `/` separators on every platform
pub fn to_forward_slashes(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
