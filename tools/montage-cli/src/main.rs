//! Montage CLI: command-line interface for timeline inspection and rendering.
//!
//! Usage:
//!   montage validate <TIMELINE>          Validate a timeline document
//!   montage resolve <TIMELINE>           Show the frame plan of a timeline
//!   montage subtitles <TIMELINE> -o FILE Write the ASS script of a timeline
//!   montage render <REQUEST>             Run a render job locally
//!   montage check                        Check for ffmpeg/ffprobe

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use montage_common::config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "montage",
    about = "Timeline-driven video rendering",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to $XDG_CONFIG_HOME/montage/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a timeline JSON document
    Validate {
        /// Path to the timeline file
        path: PathBuf,
    },

    /// Resolve a timeline into its frame plan
    Resolve {
        /// Path to the timeline file
        path: PathBuf,

        /// Print the active clips of every frame
        #[arg(long)]
        frames: bool,
    },

    /// Render the subtitle track of a timeline to an ASS file
    Subtitles {
        /// Path to the timeline file
        path: PathBuf,

        /// Output ASS file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Run a render job against a local object store
    Render {
        /// Path to the render request JSON
        request: PathBuf,

        /// Object store root (one directory per bucket)
        #[arg(long)]
        store_root: Option<PathBuf>,

        /// Bucket to publish renders to
        #[arg(long)]
        bucket: Option<String>,
    },

    /// Check for the external media tools
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    };
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    montage_common::logging::init_logging(&config.logging);

    match cli.command {
        Commands::Validate { path } => commands::validate::run(path),
        Commands::Resolve { path, frames } => commands::resolve::run(path, frames),
        Commands::Subtitles { path, output } => {
            commands::subtitles::run(path, output, &config).await
        }
        Commands::Render {
            request,
            store_root,
            bucket,
        } => commands::render::run(request, store_root, bucket, config).await,
        Commands::Check => commands::check::run(&config),
    }
}
