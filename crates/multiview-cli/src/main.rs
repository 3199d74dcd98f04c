//! Multiview CLI - Headless driver for the synchronized dashboard
//!
//! Features:
//! - Catalog inspection (HTTP endpoint or built-in presets)
//! - Simulated sync runs with drifting, stalled and unsupported streams
//! - Configuration dump

use clap::{Parser, Subcommand};
use multiview_core::DashboardConfig;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

/// Multiview CLI - Synchronized live stream dashboard
#[derive(Parser)]
#[command(name = "multiview")]
#[command(author = "Purple Squirrel Media")]
#[command(version)]
#[command(about = "Synchronized multi-stream HLS dashboard toolkit", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Output format (text, json, table)
    #[arg(short, long, default_value = "text", global = true)]
    format: String,

    /// Dashboard configuration file (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch and print the stream catalog
    Catalog {
        /// Catalog endpoint, e.g. http://localhost:3001/api/streams
        endpoint: Option<String>,

        /// Built-in catalog when no endpoint is given (local, public)
        #[arg(short, long, default_value = "local")]
        preset: String,
    },

    /// Run the sync loop against simulated live streams
    Simulate {
        /// Number of streams
        #[arg(short = 'n', long, default_value = "6")]
        streams: u32,

        /// Simulated duration in seconds
        #[arg(short, long, default_value = "30")]
        duration: f64,

        /// Tick length in milliseconds
        #[arg(long, default_value = "250")]
        tick_ms: u64,

        /// Stream id that plays at a different rate
        #[arg(long)]
        drift_stream: Option<u32>,

        /// Playback rate of the drifting stream
        #[arg(long, default_value = "0.9")]
        drift_rate: f64,

        /// Stream id that stalls halfway through
        #[arg(long)]
        stall_stream: Option<u32>,

        /// Stream id that cannot be played
        #[arg(long)]
        unsupported_stream: Option<u32>,

        /// Snapshot interval in simulated seconds
        #[arg(short, long, default_value = "5")]
        report_every: f64,

        /// Override the drift tolerance (seconds)
        #[arg(short, long)]
        tolerance: Option<f64>,

        /// Re-check followers on their own position reports
        #[arg(long)]
        follower_progress: bool,

        /// Pace ticks in wall-clock time
        #[arg(long)]
        realtime: bool,
    },

    /// Print the effective configuration
    Config {
        /// Start from the low-latency preset
        #[arg(long)]
        low_latency: bool,
    },
}

fn init_tracing(verbose: bool, json: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // Logs go to stderr so JSON output stays machine-readable
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.log_json);
    multiview_core::init();

    let config = match &cli.config {
        Some(path) => DashboardConfig::from_file(path)?,
        None => DashboardConfig::default(),
    };

    match cli.command {
        Commands::Catalog { endpoint, preset } => {
            commands::catalog(&config, endpoint.as_deref(), &preset, &cli.format).await?;
        }
        Commands::Simulate {
            streams,
            duration,
            tick_ms,
            drift_stream,
            drift_rate,
            stall_stream,
            unsupported_stream,
            report_every,
            tolerance,
            follower_progress,
            realtime,
        } => {
            let mut config = config;
            if let Some(tolerance) = tolerance {
                config.sync.tolerance_secs = tolerance;
            }
            if follower_progress {
                config.sync.resync_on_follower_progress = true;
            }

            let options = commands::SimulateOptions {
                streams,
                duration,
                tick: std::time::Duration::from_millis(tick_ms),
                drift_stream,
                drift_rate,
                stall_stream,
                unsupported_stream,
                report_every,
                realtime,
            };
            commands::simulate(config, options, &cli.format).await?;
        }
        Commands::Config { low_latency } => {
            let config = if low_latency {
                DashboardConfig::low_latency()
            } else {
                config
            };
            commands::show_config(&config)?;
        }
    }

    Ok(())
}
