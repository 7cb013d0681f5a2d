//! Kino Bridge - Headless host for the video player bridge
//!
//! Features:
//! - Scripted method calls from JSON lines
//! - Event stream printing per player
//! - End-to-end demo playback against the simulated engine

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

/// Kino Bridge - Video player channel host
#[derive(Parser)]
#[command(name = "kino-bridge")]
#[command(author = "Purple Squirrel Media")]
#[command(version)]
#[command(about = "Drive the Kino video player bridge from the command line", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text")]
    format: String,

    /// Bridge configuration file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Simulated engine: delay before a source is prepared
    #[arg(long, default_value = "50")]
    prepare_delay_ms: u64,

    /// Simulated engine: media duration
    #[arg(long, default_value = "10000")]
    duration_ms: i64,

    /// Simulated engine: buffering progress step in percent
    #[arg(long, default_value = "25")]
    buffering_step: i32,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a script of method calls, one JSON object per line
    Run {
        /// Script file (reads stdin when omitted)
        script: Option<PathBuf>,
    },

    /// Create a player, play a source and dispose it
    Demo {
        /// URI or path of the media to play
        uri: String,

        /// How long to play before disposing, in milliseconds
        #[arg(short, long, default_value = "500")]
        play_ms: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing; stdout is reserved for replies and events
    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    kino_bridge::init();

    let engine = kino_bridge::SimulatedConfig {
        prepare_delay_ms: cli.prepare_delay_ms,
        duration_ms: cli.duration_ms,
        buffering_step: cli.buffering_step,
        ..Default::default()
    };
    let plugin = commands::build_plugin(cli.config.as_deref(), engine)?;

    match cli.command {
        Commands::Run { script } => {
            commands::run(plugin, script.as_deref(), &cli.format).await?;
        }
        Commands::Demo { uri, play_ms } => {
            commands::demo(plugin, &uri, play_ms, &cli.format).await?;
        }
    }

    Ok(())
}
