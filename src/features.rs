use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use tracing::debug;

use crate::trace::Trace;

/// Kinematic feature vector derived from one trace state, the row format
/// consumed by the downstream outlier-detection models.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector {
    pub latitude: f64,
    pub longitude: f64,
    /// Barometric altitude in feet
    pub altitude: f64,
    /// Descent gradient: feet lost/gained per nautical mile, computed as
    /// 60 * climb_rate / ground_speed
    pub gradient: f64,
}

impl FeatureVector {
    pub fn as_row(&self) -> [f64; 4] {
        [self.latitude, self.longitude, self.altitude, self.gradient]
    }
}

/// Map a trace's states into feature vectors, preserving input order.
///
/// A state produces no vector when the aircraft is on the ground, when any
/// of latitude/longitude/altitude/climb-rate is missing, or when ground
/// speed is zero or missing (the gradient would be undefined). Degenerate
/// states are skipped, never an error.
pub fn extract(trace: &Trace) -> Vec<FeatureVector> {
    let mut out = Vec::new();

    for state in &trace.states {
        let altitude = match state.altitude.and_then(|a| a.feet()) {
            Some(v) => v,
            None => continue,
        };
        let (latitude, longitude) = match (state.latitude, state.longitude) {
            (Some(lat), Some(lon)) => (lat, lon),
            _ => continue,
        };
        let climb_rate = match state.climb_rate {
            Some(v) => v,
            None => continue,
        };
        let gs = match state.gs {
            Some(v) if v != 0.0 => v,
            _ => continue,
        };

        out.push(FeatureVector {
            latitude,
            longitude,
            altitude,
            gradient: 60.0 * climb_rate / gs,
        });
    }

    debug!(
        "Extracted {} feature vectors from {} trace states",
        out.len(),
        trace.states.len()
    );
    out
}

/// Append feature rows to a CSV file, creating it if absent.
///
/// Row format matches the model training input exactly: each of the four
/// numeric fields followed by a comma, one row per line.
pub fn append_rows<P: AsRef<Path>>(path: P, rows: &[FeatureVector]) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path.as_ref())
        .with_context(|| format!("Opening {:?}", path.as_ref()))?;

    let mut buf = String::new();
    for row in rows {
        for field in row.as_row() {
            buf.push_str(&field.to_string());
            buf.push(',');
        }
        buf.push('\n');
    }

    file.write_all(buf.as_bytes())
        .with_context(|| format!("Writing {:?}", path.as_ref()))?;
    Ok(())
}
