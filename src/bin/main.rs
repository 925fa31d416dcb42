//! MC Asset Pipeline CLI
//!
//! Generate texture atlases and block/entity descriptors for a game version.

use clap::{Parser, Subcommand};
use mc_asset_pipeline::{
    AssetPipeline, ErrorResponse, GenerateOptions, GenerateResponse, PipelineConfig, PipelineError,
    Progress,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mc-asset-pipeline")]
#[command(author, version, about = "Generate renderer-ready assets from Minecraft client archives", long_about = None)]
struct Cli {
    /// Cache directory (overrides the config file)
    #[arg(long, global = true)]
    cache_root: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate (or reuse) assets for a version or alias such as "latest"
    Generate {
        /// Version id or alias
        version: String,

        /// Regenerate even if cached output is valid
        #[arg(long)]
        force: bool,

        /// Extra texture categories to keep as raw files (e.g. "entity,item")
        #[arg(long, value_delimiter = ',')]
        ensure_raw_assets: Vec<String>,

        /// Abort generation after this many seconds
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// List cached versions and their completeness
    Status,

    /// Resolve a version or alias to its client archive
    Resolve {
        /// Version id or alias
        version: String,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            print_json(&ErrorResponse::from(&err));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), PipelineError> {
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(root) = cli.cache_root {
        config = config.with_cache_root(root);
    }

    let pipeline = AssetPipeline::with_default_transport(config)?;

    match cli.command {
        Commands::Generate {
            version,
            force,
            ensure_raw_assets,
            timeout,
        } => {
            let report = |event: Progress| match event {
                Progress::Stage(stage) => tracing::debug!(stage = %stage, "stage"),
                Progress::Download { received, total } => {
                    tracing::trace!(received, total, "download progress")
                }
            };
            let options = GenerateOptions {
                force,
                ensure_raw_assets,
                timeout: timeout.map(Duration::from_secs),
                cancel: None,
                progress: Some(&report),
            };

            let assets = pipeline.generate(&version, options)?;
            tracing::info!(
                textures = %assets.texture_path.display(),
                block_states = %assets.block_states_path.display(),
                "assets ready"
            );
            print_json(&GenerateResponse::from(&assets));
        }
        Commands::Status => {
            print_json(&pipeline.status()?);
        }
        Commands::Resolve { version } => {
            print_json(&pipeline.resolver().resolve(&version)?);
        }
    }

    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => tracing::error!(error = %e, "failed to serialize output"),
    }
}
