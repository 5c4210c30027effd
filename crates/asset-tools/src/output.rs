//! Atomic output files

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::ToolError;

/// Write `bytes` to `path` via a sibling temp file and rename
///
/// Readers (web servers, a concurrent runtime) see the old or the new
/// content, never a partial file.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), ToolError> {
    let temp_path = temp_sibling(path);

    if let Err(e) = fs::write(&temp_path, bytes) {
        let _ = fs::remove_file(&temp_path);
        return Err(ToolError::io(&temp_path, e));
    }

    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(ToolError::io(path, e));
    }

    Ok(())
}

/// Pretty JSON with a trailing newline, written atomically
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), ToolError> {
    let mut json = serde_json::to_string_pretty(value)?;
    json.push('\n');
    write_atomic(path, json.as_bytes())
}

/// `<path>.<ext>` (appended, not replacing the existing extension)
pub fn with_appended_extension(path: &Path, ext: &str) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(".");
    os.push(ext);
    PathBuf::from(os)
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.tmp-{}", name, std::process::id()))
}
