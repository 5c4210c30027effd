//! Pre-compression of built assets
//!
//! Both encoders run at their maximum settings: these files are compressed
//! once at build time and served many times.

use std::fmt;
use std::io::{self, Write};
use std::str::FromStr;

use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};

/// gzip compression level
pub const GZIP_LEVEL: u32 = 9;

/// brotli quality (0-11)
pub const BROTLI_QUALITY: u32 = 11;

/// brotli window size (log2)
pub const BROTLI_LGWIN: u32 = 22;

const BROTLI_BUFFER_SIZE: usize = 4096;

/// Pre-compression formats, each written as a sibling file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionFormat {
    Gzip,
    Brotli,
}

impl CompressionFormat {
    /// All formats, in report order
    pub const ALL: [CompressionFormat; 2] = [CompressionFormat::Gzip, CompressionFormat::Brotli];

    /// Sibling file extension (without the dot)
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Gzip => "gz",
            Self::Brotli => "br",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Gzip => "gzip",
            Self::Brotli => "brotli",
        }
    }

    /// Compress `bytes` into a fresh buffer
    pub fn compress(&self, bytes: &[u8]) -> io::Result<Vec<u8>> {
        match self {
            Self::Gzip => gzip(bytes),
            Self::Brotli => brotli(bytes),
        }
    }
}

impl fmt::Display for CompressionFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CompressionFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gzip" | "gz" => Ok(Self::Gzip),
            "brotli" | "br" => Ok(Self::Brotli),
            other => Err(format!("unknown compression format '{}' (expected gzip or brotli)", other)),
        }
    }
}

/// gzip at level 9
pub fn gzip(bytes: &[u8]) -> io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::new(GZIP_LEVEL));
    encoder.write_all(bytes)?;
    encoder.finish()
}

/// brotli at quality 11, 4 MiB window
pub fn brotli(bytes: &[u8]) -> io::Result<Vec<u8>> {
    let mut writer =
        brotli::CompressorWriter::new(Vec::new(), BROTLI_BUFFER_SIZE, BROTLI_QUALITY, BROTLI_LGWIN);
    writer.write_all(bytes)?;
    Ok(writer.into_inner())
}

/// Size of a compressed variant relative to its original
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompressionStats {
    /// Compressed size in bytes
    pub size: u64,

    /// `size / max(original, 1)`, rounded to 4 decimals
    pub ratio: f64,
}

impl CompressionStats {
    pub fn new(size: u64, original: u64) -> Self {
        Self {
            size,
            ratio: ratio(size, original),
        }
    }

    /// Compress `bytes` and measure the result
    pub fn measure(format: CompressionFormat, bytes: &[u8]) -> io::Result<Self> {
        let compressed = format.compress(bytes)?;
        Ok(Self::new(compressed.len() as u64, bytes.len() as u64))
    }
}

/// Compression ratio rounded to 4 decimal places
pub fn ratio(compressed: u64, original: u64) -> f64 {
    let raw = compressed as f64 / original.max(1) as f64;
    (raw * 10_000.0).round() / 10_000.0
}
