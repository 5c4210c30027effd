//! Showcase Assets CLI
//!
//! Entry point for the `showcase-assets` inspection tool.

use clap::{Parser, Subcommand};
use showcase_assets::config::DEFAULT_CONFIG_PATH;
use showcase_assets::{AssetConfig, AssetLoader, VerifyStatus};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "showcase-assets")]
#[command(about = "Inspect manifest assets and their integrity values", version)]
struct Cli {
    /// Path to config file (default: assets.toml)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a manifest key to URL, version and path
    Resolve {
        /// Logical asset name, e.g. admin.js
        key: String,
    },

    /// Print the integrity value for a manifest key
    Integrity {
        /// Logical asset name
        key: String,
    },

    /// Render the tags for one or more manifest keys
    Tags {
        /// Logical asset names (.js/.mjs become scripts, .css styles)
        #[arg(required = true)]
        keys: Vec<String>,
    },

    /// Recompute precomputed integrity values and report mismatches
    Verify,
}

fn main() -> ExitCode {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match load_config(cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let loader = match AssetLoader::from_config(config) {
        Ok(l) => l,
        Err(e) => {
            eprintln!("Error opening cache: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Commands::Resolve { key } => run_resolve(&loader, &key),
        Commands::Integrity { key } => run_integrity(&loader, &key),
        Commands::Tags { keys } => run_tags(loader, &keys),
        Commands::Verify => run_verify(&loader),
    }
}

fn load_config(config_path: Option<PathBuf>) -> Result<AssetConfig, String> {
    let path = config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    AssetConfig::from_file(&path).map_err(|e| format!("{}: {}", path.display(), e))
}

fn run_resolve(loader: &AssetLoader, key: &str) -> ExitCode {
    let asset = match loader.manifest().get_asset(key) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("Error [{}]: {}", e.code(), e);
            return ExitCode::FAILURE;
        }
    };

    match serde_json::to_string_pretty(&asset) {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error serializing output: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_integrity(loader: &AssetLoader, key: &str) -> ExitCode {
    let Some(sri) = loader.sri() else {
        eprintln!("Integrity is disabled in the configuration");
        return ExitCode::FAILURE;
    };

    match sri.integrity_for_asset(key) {
        Ok(integrity) => {
            println!("{}", integrity);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error [{}]: {}", e.code(), e);
            ExitCode::FAILURE
        }
    }
}

fn run_tags(mut loader: AssetLoader, keys: &[String]) -> ExitCode {
    let mut failed = false;
    let no_deps: &[&str] = &[];

    for key in keys {
        let handle = key.rsplit_once('.').map_or(key.as_str(), |(stem, _)| stem);
        let result = if key.ends_with(".css") {
            loader.enqueue_style(handle, key, no_deps, "all")
        } else if key.ends_with(".js") || key.ends_with(".mjs") {
            loader.enqueue_script(handle, key, no_deps, true)
        } else {
            eprintln!("Skipping {}: not a script or stylesheet", key);
            failed = true;
            continue;
        };

        if let Err(e) = result {
            eprintln!("Error [{}]: {}", e.code(), e);
            failed = true;
        }
    }

    print!("{}", loader.render_head());
    print!("{}", loader.render_footer());

    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn run_verify(loader: &AssetLoader) -> ExitCode {
    let Some(sri) = loader.sri() else {
        eprintln!("Integrity is disabled in the configuration");
        return ExitCode::FAILURE;
    };

    let report = match sri.verify_manifest() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error [{}]: {}", e.code(), e);
            return ExitCode::FAILURE;
        }
    };

    for entry in &report.entries {
        match &entry.status {
            VerifyStatus::Ok => println!("  OK        {}", entry.key),
            VerifyStatus::Mismatch => println!("  MISMATCH  {}", entry.key),
            VerifyStatus::Missing(e) => println!("  MISSING   {} ({})", entry.key, e),
            VerifyStatus::Error(e) => println!("  ERROR     {} ({})", entry.key, e),
        }
    }

    println!();
    println!(
        "Checked {} of {} entries, {} problem(s)",
        report.checked(),
        report.total,
        report.problems()
    );

    if report.is_clean() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
