use anyhow::Result;
use chrono::Utc;
use std::path::Path;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::adsb_client::{AdsbClient, sanitize_hex};
use crate::puller::BulkPuller;

/// Pull the trace of every aircraft in the current snapshot into one JSON
/// file each under `output_dir`.
pub async fn handle_trace_all(
    output_dir: &Path,
    concurrency: usize,
    recent: bool,
    cancel: CancellationToken,
) -> Result<()> {
    let client = AdsbClient::new()?;
    let started = Utc::now();

    let snapshot = client.fetch_snapshot(None).await?;
    let hexes: Vec<String> = snapshot
        .aircraft
        .iter()
        .filter_map(|ac| ac.hex.as_deref())
        .map(sanitize_hex)
        .filter(|hex| !hex.is_empty())
        .collect();
    info!("Snapshot holds {} aircraft with usable hexes", hexes.len());

    let puller = BulkPuller::new(output_dir)
        .with_concurrency(concurrency)
        .with_recent(recent)
        .with_cancellation(cancel);

    // Periodic progress line while the pull runs; the counter is shared
    // with the workers and costs nothing to read.
    let counter = puller.progress_counter();
    let total = hexes.len();
    let reporter = tokio::spawn(async move {
        loop {
            tokio::time::sleep(Duration::from_secs(5)).await;
            let done = counter.load(Ordering::Relaxed);
            info!("Pulled {}/{} traces", done, total);
            if done >= total {
                break;
            }
        }
    });

    let summary = puller.pull_all(&client, &hexes).await;
    reporter.abort();
    let summary = summary?;

    info!(
        "Trace pull complete in {}s: {} files written, {} aircraft skipped",
        (Utc::now() - started).num_seconds(),
        summary.written,
        summary.skipped
    );
    Ok(())
}
