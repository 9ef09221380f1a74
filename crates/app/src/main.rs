//! Stencil: sort a stream of scanned documents into layout templates.
//!
//! ```bash
//! stencil classify ~/scans/batch-01
//! stencil --threshold 1.5 classify page1.png page2.png
//! stencil watch --dir ~/scans/inbox
//! stencil templates
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

#[derive(Parser)]
#[command(name = "stencil")]
#[command(version)]
#[command(about = "Online template classification for document images", long_about = None)]
struct Cli {
    /// Config file (defaults to the per-user stencil.toml)
    #[arg(long, short, env = "STENCIL_CONFIG")]
    config: Option<PathBuf>,

    /// Classifier state file, overriding the config
    #[arg(long, env = "STENCIL_SNAPSHOT")]
    snapshot: Option<PathBuf>,

    /// Match threshold (standardized distance), overriding the config
    #[arg(long)]
    threshold: Option<f64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify images (files or directories) in order
    Classify {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Classify images as they appear in the intake folder
    Watch {
        /// Folder to watch, overriding the config
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// List stored templates
    Templates,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries one JSON line per document.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = config::AppConfig::load(cli.config.as_deref())?;
    if let Some(threshold) = cli.threshold {
        config.classifier.threshold = threshold;
        config.classifier.validate()?;
    }
    if let Some(snapshot) = cli.snapshot {
        config.snapshot_path = Some(snapshot);
    }

    match cli.command {
        Commands::Classify { paths } => commands::classify(&config, &paths).await,
        Commands::Watch { dir } => commands::watch(&config, dir.as_deref()).await,
        Commands::Templates => commands::templates(&config),
    }
}
