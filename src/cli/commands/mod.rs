//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod backfill;
mod detect;
mod import;
mod serve;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{ArgGroup, Parser, Subcommand};

use crate::config::Config;
use crate::repository::{open_store, ImageDocRepository};
use crate::vision::{VisionClient, WebDetector};

#[derive(Parser)]
#[command(name = "webdetect")]
#[command(about = "Cached image web detection service")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server with the detectWeb endpoint
    Serve {
        /// Address to bind (overrides config)
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Fill cached web detection for every image in the active-id list
    Backfill {
        /// Active-id list document (overrides config)
        #[arg(long)]
        list_id: Option<String>,
        /// Pause after each annotation call in milliseconds (overrides config)
        #[arg(long)]
        delay_ms: Option<u64>,
    },

    /// Run one interactive detection and print the response
    #[command(group(ArgGroup::new("target").required(true).multiple(true).args(["doc", "url"])))]
    Detect {
        /// Image document id
        #[arg(long)]
        doc: Option<String>,
        /// Image address (used directly, or as fallback when --doc is missing)
        #[arg(long)]
        url: Option<String>,
        /// Caller uid to act as
        #[arg(long, default_value = "cli")]
        uid: String,
    },

    /// Seed the configured store from a JSON file
    Import {
        /// JSON file of the form {"collection": {"id": {...fields}}}
        file: PathBuf,
    },
}

/// Open the configured store and wrap it in the image repository.
fn open_images(config: &Config) -> anyhow::Result<ImageDocRepository> {
    let store = open_store(&config.store)?;
    Ok(ImageDocRepository::new(
        store,
        config.store.images_collection.clone(),
        config.store.id_lists_collection.clone(),
    ))
}

fn open_detector(config: &Config) -> anyhow::Result<Arc<dyn WebDetector>> {
    Ok(Arc::new(VisionClient::new(config.vision.clone())?))
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref()).await?;

    if let Some(ref path) = config.source_path {
        tracing::debug!("Using config file {}", path.display());
    }

    match cli.command {
        Commands::Serve { bind } => serve::cmd_serve(&config, bind).await,
        Commands::Backfill { list_id, delay_ms } => {
            backfill::cmd_backfill(&config, list_id, delay_ms).await
        }
        Commands::Detect { doc, url, uid } => detect::cmd_detect(&config, doc, url, uid).await,
        Commands::Import { file } => import::cmd_import(&config, &file).await,
    }
}
