//! compress-assets
//!
//! Writes `.gz` and `.br` siblings for built assets and a
//! `compression-report.json` summary.

use asset_digest::CompressionFormat;
use asset_tools::{compress_dist, init_logging, COMPRESSION_REPORT_FILE, DEFAULT_DIST_DIR};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "compress-assets")]
#[command(about = "Pre-compress built assets with gzip and brotli", version)]
struct Cli {
    /// Dist directory
    #[arg(default_value = DEFAULT_DIST_DIR)]
    dist: PathBuf,

    /// Formats to write: gzip (gz), brotli (br). Default: both
    formats: Vec<CompressionFormat>,

    /// Additional glob patterns to skip (repeatable)
    #[arg(long = "exclude", short = 'e')]
    excludes: Vec<String>,
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    let outcome = match compress_dist(&cli.dist, &cli.formats, &cli.excludes) {
        Ok(o) => o,
        Err(e) => {
            eprintln!("Compression failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    for (relative, file) in &outcome.report.files {
        println!("{}", file.summary_line(relative));
    }
    println!(
        "Compression report written to {}",
        cli.dist.join(COMPRESSION_REPORT_FILE).display()
    );

    if outcome.is_success() {
        return ExitCode::SUCCESS;
    }

    eprintln!("{} file(s) could not be compressed:", outcome.failures.len());
    for failure in &outcome.failures {
        eprintln!("  {}: {}", failure.relative, failure.error);
    }
    ExitCode::FAILURE
}
