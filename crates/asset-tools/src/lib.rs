//! Build-time asset tooling
//!
//! - [`sri_manifest`]: hash every dist file, write `manifest-sri.json` and
//!   merge integrity values into the build manifest
//! - [`compression`]: write `.gz`/`.br` siblings and `compression-report.json`

pub mod compression;
pub mod output;
pub mod sri_manifest;

use std::io;
use std::path::PathBuf;

use asset_digest::DigestError;
use tracing_subscriber::EnvFilter;

pub use compression::{compress_dist, compress_files, CompressOutcome, CompressionReport, FileReport, COMPRESSION_REPORT_FILE};
pub use sri_manifest::{generate, generate_for_files, SriEntry, SriManifest, SriOptions, SriOutcome, MANIFEST_FILE, SRI_MANIFEST_FILE};

/// Default dist directory, relative to the working directory
pub const DEFAULT_DIST_DIR: &str = "assets/dist";

/// Errors that abort a tool run
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("dist directory not found: {}", .0.display())]
    DistMissing(PathBuf),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid build manifest {}: {message}", path.display())]
    InvalidManifest { path: PathBuf, message: String },

    #[error(transparent)]
    Digest(#[from] DigestError),
}

impl ToolError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// A file that could not be processed; the run continues without it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFailure {
    pub relative: String,
    pub error: String,
}

/// Install the fmt subscriber used by both binaries (stderr, `RUST_LOG`)
pub fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}
