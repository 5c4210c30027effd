//! Subresource Integrity digests
//!
//! Browsers check `integrity` against the raw bytes they fetched, so the
//! digest is taken over the file bytes as stored (never text-decoded) and
//! encoded with the standard, padded base64 alphabet.

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha384, Sha512};

use crate::{DigestError, DigestResult};

/// Hash algorithms accepted in an integrity value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SriAlgorithm {
    Sha256,
    Sha384,
    Sha512,
}

/// Algorithm used for everything this workspace emits
pub const DEFAULT_ALGORITHM: SriAlgorithm = SriAlgorithm::Sha384;

impl SriAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Sha384 => "sha384",
            Self::Sha512 => "sha512",
        }
    }

    /// Length of the raw digest in bytes
    pub fn digest_len(&self) -> usize {
        match self {
            Self::Sha256 => 32,
            Self::Sha384 => 48,
            Self::Sha512 => 64,
        }
    }

    fn digest(&self, bytes: &[u8]) -> Vec<u8> {
        match self {
            Self::Sha256 => Sha256::digest(bytes).to_vec(),
            Self::Sha384 => Sha384::digest(bytes).to_vec(),
            Self::Sha512 => Sha512::digest(bytes).to_vec(),
        }
    }
}

impl fmt::Display for SriAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SriAlgorithm {
    type Err = DigestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sha256" => Ok(Self::Sha256),
            "sha384" => Ok(Self::Sha384),
            "sha512" => Ok(Self::Sha512),
            other => Err(DigestError::Malformed(format!("unsupported algorithm '{}'", other))),
        }
    }
}

/// Compute the `sha384-<base64>` integrity value for `bytes`
pub fn integrity_for_bytes(bytes: &[u8]) -> String {
    integrity_with(DEFAULT_ALGORITHM, bytes)
}

/// Compute an integrity value with an explicit algorithm
pub fn integrity_with(algorithm: SriAlgorithm, bytes: &[u8]) -> String {
    format!("{}-{}", algorithm.as_str(), STANDARD.encode(algorithm.digest(bytes)))
}

/// Hash a file on disk, refusing files larger than `max_bytes`
pub fn integrity_for_file(path: &Path, max_bytes: Option<u64>) -> DigestResult<String> {
    let bytes = read_limited(path, max_bytes)?;
    Ok(integrity_for_bytes(&bytes))
}

/// Read a whole file, enforcing an optional size cap
///
/// The cap is checked against the metadata first and again while reading,
/// so a file growing between `stat` and `read` is still bounded.
pub fn read_limited(path: &Path, max_bytes: Option<u64>) -> DigestResult<Vec<u8>> {
    let io_err = |source| DigestError::Io {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(io_err)?;
    let size = file.metadata().map_err(io_err)?.len();

    if let Some(limit) = max_bytes {
        if size > limit {
            return Err(DigestError::TooLarge {
                path: path.to_path_buf(),
                size,
                limit,
            });
        }
    }

    let mut contents = Vec::with_capacity(size as usize);
    match max_bytes {
        Some(limit) => {
            file.take(limit.saturating_add(1)).read_to_end(&mut contents).map_err(io_err)?;
            if contents.len() as u64 > limit {
                return Err(DigestError::TooLarge {
                    path: path.to_path_buf(),
                    size: contents.len() as u64,
                    limit,
                });
            }
        }
        None => {
            let mut file = file;
            file.read_to_end(&mut contents).map_err(io_err)?;
        }
    }

    Ok(contents)
}

/// Split an integrity value into algorithm and raw digest
pub fn parse_integrity(value: &str) -> DigestResult<(SriAlgorithm, Vec<u8>)> {
    let (algo, encoded) = value
        .split_once('-')
        .ok_or_else(|| DigestError::Malformed(value.to_string()))?;
    let algorithm: SriAlgorithm = algo.parse()?;
    let digest = STANDARD
        .decode(encoded)
        .map_err(|e| DigestError::Malformed(format!("{}: {}", value, e)))?;

    if digest.len() != algorithm.digest_len() {
        return Err(DigestError::Malformed(format!(
            "{}: expected {} digest bytes, got {}",
            value,
            algorithm.digest_len(),
            digest.len()
        )));
    }

    Ok((algorithm, digest))
}

/// True when `value` is a well-formed integrity string
pub fn is_valid_integrity(value: &str) -> bool {
    parse_integrity(value).is_ok()
}

/// Check `bytes` against an expected integrity value in constant time
pub fn verify_bytes(bytes: &[u8], expected: &str) -> bool {
    let Ok((algorithm, expected_digest)) = parse_integrity(expected) else {
        return false;
    };
    let actual = algorithm.digest(bytes);

    actual.len() == expected_digest.len()
        && actual
            .iter()
            .zip(expected_digest.iter())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}
