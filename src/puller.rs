use anyhow::{Context, Result};
use futures_util::StreamExt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::adsb_client::{TraceSource, sanitize_hex};
use crate::trace::Trace;

pub const DEFAULT_CONCURRENCY: usize = 10;

/// Outcome of one bulk pull.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PullSummary {
    /// Hexes submitted
    pub requested: usize,
    /// Traces fetched and written to disk
    pub written: usize,
    /// Hexes with no data (or cancelled before their fetch started)
    pub skipped: usize,
}

/// Pulls traces for many aircraft with a bounded worker pool, writing each
/// result to its own file as it completes.
///
/// Results are persisted and released inside the worker, so memory in
/// flight is bounded by the concurrency limit, not the input list size.
/// One aircraft failing to fetch never aborts the batch; only filesystem
/// failures are fatal.
pub struct BulkPuller {
    output_dir: PathBuf,
    concurrency: usize,
    recent: bool,
    completed: Arc<AtomicUsize>,
    cancel: CancellationToken,
}

impl BulkPuller {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            concurrency: DEFAULT_CONCURRENCY,
            recent: false,
            completed: Arc::new(AtomicUsize::new(0)),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Pull the reduced-history trace variant instead of the full history.
    pub fn with_recent(mut self, recent: bool) -> Self {
        self.recent = recent;
        self
    }

    /// Stop issuing new fetches once `token` is cancelled; in-flight
    /// fetches finish normally.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Number of units of work completed so far. Monotonically increasing
    /// and readable while a pull is running.
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Relaxed)
    }

    /// Shared handle to the completed-count, for progress reporting from
    /// another task.
    pub fn progress_counter(&self) -> Arc<AtomicUsize> {
        self.completed.clone()
    }

    /// Pull traces for every hex and write each non-null result to
    /// `{output_dir}/{icao}` as pretty-printed JSON.
    pub async fn pull_all<S>(&self, source: &S, hexes: &[String]) -> Result<PullSummary>
    where
        S: TraceSource + Sync,
    {
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .with_context(|| format!("Creating output directory {:?}", self.output_dir))?;

        info!(
            "Pulling {} traces with {} workers into {:?}",
            hexes.len(),
            self.concurrency,
            self.output_dir
        );

        let written = AtomicUsize::new(0);
        let write_error: Mutex<Option<anyhow::Error>> = Mutex::new(None);

        futures_util::stream::iter(hexes)
            .for_each_concurrent(self.concurrency, |hex| {
                let written = &written;
                let write_error = &write_error;
                async move {
                    if !self.cancel.is_cancelled() {
                        if let Some(trace) = source.fetch_trace(hex, self.recent).await {
                            match self.write_trace(hex, &trace).await {
                                Ok(()) => {
                                    written.fetch_add(1, Ordering::Relaxed);
                                }
                                Err(e) => {
                                    let mut slot = write_error.lock().unwrap();
                                    if slot.is_none() {
                                        *slot = Some(e);
                                    }
                                }
                            }
                        } else {
                            debug!("No trace data for {}, skipping", hex);
                        }
                    }
                    self.completed.fetch_add(1, Ordering::Relaxed);
                }
            })
            .await;

        // Filesystem problems are resource-level, not per-aircraft: fail
        // the batch once everything in flight has drained.
        if let Some(e) = write_error.lock().unwrap().take() {
            return Err(e);
        }

        let written = written.load(Ordering::Relaxed);
        let summary = PullSummary {
            requested: hexes.len(),
            written,
            skipped: hexes.len() - written,
        };
        info!(
            "Bulk pull finished: {} written, {} skipped of {} requested",
            summary.written, summary.skipped, summary.requested
        );
        Ok(summary)
    }

    async fn write_trace(&self, hex: &str, trace: &Trace) -> Result<()> {
        let name = trace
            .icao
            .clone()
            .unwrap_or_else(|| sanitize_hex(hex));
        let path = self.output_dir.join(name);
        let json = trace.to_pretty_json()?;
        tokio::fs::write(&path, json)
            .await
            .with_context(|| format!("Writing {:?}", path))
    }
}
