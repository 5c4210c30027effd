//! Asset digest primitives shared by the runtime and the build tools
//!
//! Every SRI string served at request time and every hash written by
//! `generate-sri` goes through [`sri`], so the two can never disagree on
//! algorithm or encoding. The same holds for [`compress`], which both the
//! SRI report and `compress-assets` use for size/ratio figures.

pub mod compress;
pub mod exclude;
pub mod sri;
pub mod walk;

use std::io;
use std::path::PathBuf;

pub use compress::{CompressionFormat, CompressionStats, BROTLI_LGWIN, BROTLI_QUALITY, GZIP_LEVEL};
pub use exclude::ExcludeRules;
pub use sri::{
    integrity_for_bytes, integrity_for_file, integrity_with, is_valid_integrity, parse_integrity,
    read_limited, verify_bytes, SriAlgorithm, DEFAULT_ALGORITHM,
};
pub use walk::{DistFile, DistWalker};

/// Errors raised while reading, hashing or walking assets
#[derive(Debug, thiserror::Error)]
pub enum DigestError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{path} is {size} bytes, above the {limit} byte limit")]
    TooLarge { path: PathBuf, size: u64, limit: u64 },

    #[error("malformed integrity value: {0}")]
    Malformed(String),

    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Glob pattern error: {0}")]
    Glob(#[from] globset::Error),

    #[error("Path is not within dist root: {0}")]
    PathNotInRoot(String),
}

/// Result alias for digest operations
pub type DigestResult<T> = Result<T, DigestError>;
