//! pidrec CLI: record an application's window by process ID.
//!
//! Usage:
//!   pidrec record --process <PID> [OPTIONS]   Record until Ctrl+C (or --duration)
//!   pidrec check                              Check system capabilities

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use pidrec_common::config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "pidrec",
    about = "Record the window of a running process to an MP4 file",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record the primary window of a process
    Record {
        /// Process ID owning the window to record
        #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..))]
        process: u32,

        /// Output file (defaults to the configured path)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Target FPS
        #[arg(long)]
        fps: Option<u32>,

        /// Capture frame queue depth
        #[arg(long)]
        queue_depth: Option<u32>,

        /// Record only the window instead of its whole display
        #[arg(long)]
        window_only: bool,

        /// Stop after this many seconds instead of waiting for Ctrl+C
        #[arg(long, value_parser = commands::record::parse_duration_secs)]
        duration: Option<std::time::Duration>,
    },

    /// Check system capabilities
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load();

    let mut logging = config.logging.clone();
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    pidrec_common::logging::init_logging(&logging);

    match cli.command {
        Commands::Record {
            process,
            output,
            fps,
            queue_depth,
            window_only,
            duration,
        } => {
            let args = commands::record::RecordArgs {
                pid: process,
                output: output.unwrap_or_else(|| config.recording.output.clone()),
                fps: fps.unwrap_or(config.recording.fps),
                queue_depth: queue_depth.unwrap_or(config.recording.queue_depth),
                window_only,
                duration,
            };
            commands::record::run(args, &config.encoder).await
        }
        Commands::Check => commands::check::run(),
    }
}
