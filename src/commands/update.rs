use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::adsb_client::{AdsbClient, TraceSource};
use crate::airports::{AirportIndex, AirportRecord};
use crate::features::{self, FeatureVector};
use crate::geo::within_radius;
use crate::snapshot::AircraftState;

/// Emitter categories worth modeling near airports: A3 (large), A4 (B757),
/// A5 (heavy).
const CATEGORIES: [&str; 3] = ["A3", "A4", "A5"];

pub const DEFAULT_THRESHOLD_NM: f64 = 25.0;
pub const DEFAULT_DOWNSAMPLING: usize = 20;

fn wanted(ac: &AircraftState, airport: &AirportRecord, threshold_nm: f64) -> bool {
    ac.hex.is_some()
        && ac
            .category
            .as_deref()
            .is_some_and(|c| CATEGORIES.contains(&c))
        && within_radius(
            ac.lat,
            ac.lon,
            airport.latitude,
            airport.longitude,
            threshold_nm,
        )
}

/// Collect feature rows for traffic around one airport: snapshot, keep
/// nearby aircraft of the wanted categories, pull each one's recent trace,
/// extract features, re-filter by proximity, downsample.
async fn collect_frames(
    client: &AdsbClient,
    airport: &AirportRecord,
    threshold_nm: f64,
    downsampling: usize,
    cancel: &CancellationToken,
) -> Result<Vec<FeatureVector>> {
    let snapshot = client.fetch_snapshot(None).await?;

    let hexes: Vec<String> = snapshot
        .aircraft
        .iter()
        .filter(|ac| wanted(ac, airport, threshold_nm))
        .filter_map(|ac| ac.hex.clone())
        .collect();

    info!(
        "{}: {} of {} aircraft within {} nm and wanted categories",
        airport.ident,
        hexes.len(),
        snapshot.aircraft.len(),
        threshold_nm
    );

    let mut frames = Vec::new();
    for hex in &hexes {
        if cancel.is_cancelled() {
            break;
        }
        let Some(trace) = client.fetch_trace(hex, true).await else {
            continue;
        };
        frames.extend(
            features::extract(&trace)
                .into_iter()
                .filter(|f| {
                    within_radius(
                        Some(f.latitude),
                        Some(f.longitude),
                        airport.latitude,
                        airport.longitude,
                        threshold_nm,
                    )
                })
                .step_by(downsampling.max(1)),
        );
    }

    Ok(frames)
}

/// Accumulate feature rows for each named airport into `{ident}.csv` under
/// `output_dir`. An airport with no usable data, a failed lookup, or a
/// failed snapshot is logged and skipped; it never aborts the rest of the
/// run.
pub async fn handle_update(
    airports: &[String],
    database_path: &Path,
    output_dir: &Path,
    threshold_nm: f64,
    downsampling: usize,
    cancel: CancellationToken,
) -> Result<()> {
    let index = AirportIndex::load(database_path)
        .with_context(|| format!("Loading airport database {:?}", database_path))?;
    let client = AdsbClient::new()?;

    fs::create_dir_all(output_dir)
        .with_context(|| format!("Creating output directory {:?}", output_dir))?;

    for ident in airports {
        if cancel.is_cancelled() {
            info!("Cancelled, stopping airport updates");
            break;
        }

        let airport = match index.require(ident) {
            Ok(airport) => airport,
            Err(e) => {
                warn!("{}, skipping", e);
                continue;
            }
        };

        let frames =
            match collect_frames(&client, airport, threshold_nm, downsampling, &cancel).await {
                Ok(frames) => frames,
                Err(e) => {
                    warn!("Failed to collect frames for {}: {}", ident, e);
                    continue;
                }
            };

        if frames.is_empty() {
            info!("Not enough data for {}", ident);
            continue;
        }

        let out_path = output_dir.join(format!("{ident}.csv"));
        features::append_rows(&out_path, &frames)?;
        info!("{} updated with {} frames", ident, frames.len());
    }

    Ok(())
}

/// Read airport identifiers from a plain text file, one per line, skipping
/// blanks. Used when the command line names no airports.
pub fn read_airport_list(path: &Path) -> Result<Vec<String>> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("Reading airport list {:?}", path))?;
    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}
