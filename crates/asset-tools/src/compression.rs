//! Pre-compressed siblings and `compression-report.json`

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use asset_digest::{CompressionFormat, CompressionStats, DigestError, DistFile, DistWalker, ExcludeRules};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::output::{with_appended_extension, write_atomic, write_json};
use crate::{FileFailure, ToolError};

/// Output of `compress-assets`
pub const COMPRESSION_REPORT_FILE: &str = "compression-report.json";

/// Sizes for one file (or the totals)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FileReport {
    pub original_size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gzip: Option<CompressionStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brotli: Option<CompressionStats>,
}

impl FileReport {
    pub fn stats(&self, format: CompressionFormat) -> Option<&CompressionStats> {
        match format {
            CompressionFormat::Gzip => self.gzip.as_ref(),
            CompressionFormat::Brotli => self.brotli.as_ref(),
        }
    }

    fn set(&mut self, format: CompressionFormat, stats: CompressionStats) {
        match format {
            CompressionFormat::Gzip => self.gzip = Some(stats),
            CompressionFormat::Brotli => self.brotli = Some(stats),
        }
    }

    /// `admin.js: 31.20% (gzip), 28.10% (brotli)`
    pub fn summary_line(&self, relative: &str) -> String {
        let parts: Vec<String> = CompressionFormat::ALL
            .iter()
            .filter_map(|f| {
                self.stats(*f)
                    .map(|s| format!("{:.2}% ({})", s.ratio * 100.0, f))
            })
            .collect();
        format!("{}: {}", relative, parts.join(", "))
    }
}

/// The aggregated report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressionReport {
    pub generated_at: DateTime<Utc>,
    pub formats: Vec<CompressionFormat>,
    pub files: BTreeMap<String, FileReport>,
    pub totals: FileReport,
}

impl CompressionReport {
    fn new(formats: &[CompressionFormat]) -> Self {
        Self {
            generated_at: Utc::now(),
            formats: formats.to_vec(),
            files: BTreeMap::new(),
            totals: FileReport::default(),
        }
    }

    fn add(&mut self, relative: String, file: FileReport) {
        self.files.insert(relative, file);
        self.totals = totals(&self.formats, self.files.values());
    }
}

/// Result of a [`compress_dist`] run
#[derive(Debug)]
pub struct CompressOutcome {
    pub report: CompressionReport,
    pub failures: Vec<FileFailure>,
}

impl CompressOutcome {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Deduplicated formats in report order; empty means all
pub fn normalize_formats(formats: &[CompressionFormat]) -> Vec<CompressionFormat> {
    if formats.is_empty() {
        return CompressionFormat::ALL.to_vec();
    }
    let mut formats = formats.to_vec();
    formats.sort();
    formats.dedup();
    formats
}

/// Compress every eligible file under `dist` and write the report
pub fn compress_dist(
    dist: &Path,
    formats: &[CompressionFormat],
    excludes: &[String],
) -> Result<CompressOutcome, ToolError> {
    if !dist.is_dir() {
        return Err(ToolError::DistMissing(dist.to_path_buf()));
    }

    let rules = ExcludeRules::new(&[COMPRESSION_REPORT_FILE])
        .and_then(|rules| rules.with_patterns(excludes))
        .map_err(DigestError::from)?;
    let files = DistWalker::new(dist, rules).collect()?;

    compress_files(dist, &files, formats)
}

/// Compress an already collected file list and write the report under `dist`
///
/// A file that fails is left out of the report; the rest are still written.
pub fn compress_files(
    dist: &Path,
    files: &[DistFile],
    formats: &[CompressionFormat],
) -> Result<CompressOutcome, ToolError> {
    let formats = normalize_formats(formats);
    let mut report = CompressionReport::new(&formats);
    let mut failures = Vec::new();

    for file in files {
        match compress_file(file, &formats) {
            Ok(file_report) => report.add(file.relative.clone(), file_report),
            Err(e) => {
                warn!(file = %file.relative, error = %e, "failed to compress file");
                failures.push(FileFailure {
                    relative: file.relative.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    write_json(&dist.join(COMPRESSION_REPORT_FILE), &report)?;
    Ok(CompressOutcome { report, failures })
}

/// Write `<file>.gz` / `<file>.br` for each format
pub fn compress_file(file: &DistFile, formats: &[CompressionFormat]) -> Result<FileReport, ToolError> {
    let bytes = fs::read(&file.path).map_err(|e| ToolError::io(&file.path, e))?;
    let original = bytes.len() as u64;

    let mut report = FileReport {
        original_size: original,
        ..FileReport::default()
    };

    for format in formats {
        let compressed = format
            .compress(&bytes)
            .map_err(|e| ToolError::io(&file.path, e))?;
        write_atomic(&with_appended_extension(&file.path, format.extension()), &compressed)?;
        report.set(*format, CompressionStats::new(compressed.len() as u64, original));
    }

    Ok(report)
}

fn totals<'a>(formats: &[CompressionFormat], files: impl Iterator<Item = &'a FileReport>) -> FileReport {
    let files: Vec<&FileReport> = files.collect();
    let original: u64 = files.iter().map(|f| f.original_size).sum();

    let mut totals = FileReport {
        original_size: original,
        ..FileReport::default()
    };
    for format in formats {
        let size: u64 = files
            .iter()
            .filter_map(|f| f.stats(*format))
            .map(|s| s.size)
            .sum();
        totals.set(*format, CompressionStats::new(size, original));
    }
    totals
}
