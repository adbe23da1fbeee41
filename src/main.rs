use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use adsblookup::commands::update::{DEFAULT_DOWNSAMPLING, DEFAULT_THRESHOLD_NM, read_airport_list};
use adsblookup::commands::{handle_build_airports, handle_trace_all, handle_update};
use adsblookup::puller::DEFAULT_CONCURRENCY;

#[derive(Parser, Debug)]
#[command(
    name = "adsblookup",
    about = "Pull ADS-B traces and build feature matrices for anomaly detection near airports."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Accumulate feature rows for traffic near the given airports
    Update {
        /// Airport identifiers (e.g. KCOS); read from --airports-file when empty
        airports: Vec<String>,
        /// Plain-text list of airport identifiers, one per line
        #[arg(long, default_value = "airports.txt")]
        airports_file: PathBuf,
        /// Sorted airport table built by `build-airports`
        #[arg(long, default_value = "database.csv")]
        database: PathBuf,
        /// Directory for the per-airport feature CSVs
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,
        /// Proximity threshold in nautical miles
        #[arg(long, default_value_t = DEFAULT_THRESHOLD_NM)]
        threshold_nm: f64,
        /// Keep every Nth feature row
        #[arg(long, default_value_t = DEFAULT_DOWNSAMPLING)]
        downsampling: usize,
    },
    /// Pull the trace of every aircraft in the current snapshot
    TraceAll {
        /// Directory for the per-aircraft JSON files
        #[arg(long, default_value = "traceall_out")]
        output_dir: PathBuf,
        /// Worker pool size
        #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
        concurrency: usize,
        /// Pull the reduced-history trace variant
        #[arg(long)]
        recent: bool,
    },
    /// Build the sorted airport table from an OurAirports-format CSV
    BuildAirports {
        /// Source CSV (OurAirports format)
        #[arg(long, default_value = "airports.csv")]
        source: PathBuf,
        /// Output table path
        #[arg(long, default_value = "database.csv")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Ctrl-C received, finishing in-flight work");
                cancel.cancel();
            }
        });
    }

    match cli.command {
        Command::Update {
            airports,
            airports_file,
            database,
            output_dir,
            threshold_nm,
            downsampling,
        } => {
            let airports = if airports.is_empty() {
                read_airport_list(&airports_file)?
            } else {
                airports
            };
            handle_update(
                &airports,
                &database,
                &output_dir,
                threshold_nm,
                downsampling,
                cancel,
            )
            .await
        }
        Command::TraceAll {
            output_dir,
            concurrency,
            recent,
        } => handle_trace_all(&output_dir, concurrency, recent, cancel).await,
        Command::BuildAirports { source, out } => handle_build_airports(&source, &out).await,
    }
}
