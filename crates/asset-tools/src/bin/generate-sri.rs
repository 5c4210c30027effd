//! generate-sri
//!
//! Hashes every built asset, writes `manifest-sri.json` and merges the
//! integrity values into `manifest.json`.

use asset_tools::{generate, init_logging, SriOptions, DEFAULT_DIST_DIR};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "generate-sri")]
#[command(about = "Compute SHA-384 subresource integrity for built assets", version)]
struct Cli {
    /// Dist directory
    #[arg(default_value = DEFAULT_DIST_DIR)]
    dist: PathBuf,

    /// Additional glob patterns to skip (repeatable)
    #[arg(long = "exclude", short = 'e')]
    excludes: Vec<String>,

    /// Do not write integrity values into manifest.json
    #[arg(long)]
    no_merge: bool,
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    let options = SriOptions {
        excludes: cli.excludes,
        merge: !cli.no_merge,
    };

    let outcome = match generate(&cli.dist, &options) {
        Ok(o) => o,
        Err(e) => {
            eprintln!("SRI generation failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    println!(
        "SRI hashes for {} file(s) written to {}",
        outcome.entries.len(),
        outcome.output.display()
    );
    if outcome.merged > 0 {
        println!("Merged integrity into {} manifest entries", outcome.merged);
    }

    if outcome.is_success() {
        return ExitCode::SUCCESS;
    }

    eprintln!("{} file(s) could not be hashed:", outcome.failures.len());
    for failure in &outcome.failures {
        eprintln!("  {}: {}", failure.relative, failure.error);
    }
    ExitCode::FAILURE
}
