use anyhow::{Context, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue, REFERER};
use std::time::Duration;
use tracing::{debug, warn};

use crate::geo::BoundingBox;
use crate::snapshot::Snapshot;
use crate::trace::Trace;

/// The globe endpoints reject requests without a matching referer.
static GLOBE_ORIGIN: &str = "https://globe.adsbexchange.com";

/// The original scripts had no timeout at all; a stuck fetch would hang a
/// worker forever.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Strips anything that cannot appear in a trace URL, e.g. the `~` prefix
/// on TIS-B hexes.
static HEX_SANITIZE_RE: Lazy<Regex> = Lazy::new(|| Regex::new("[^A-Za-z0-9]+").unwrap());

/// Normalize an ICAO hex for URL construction: drop non-alphanumerics and
/// lowercase.
pub fn sanitize_hex(hex: &str) -> String {
    HEX_SANITIZE_RE.replace_all(hex, "").to_lowercase()
}

/// Build the per-aircraft trace URL. The provider shards trace files into
/// subdirectories named by the last two characters of the hex; reproduce
/// that scheme exactly. `recent` selects the reduced-history variant
/// (roughly the last hour instead of up to 25 hours); the record shape is
/// identical.
fn trace_url(icao: &str, recent: bool) -> String {
    let variant = if recent { "recent" } else { "full" };
    let shard = &icao[icao.len().saturating_sub(2)..];
    format!("{GLOBE_ORIGIN}/data/traces/{shard}/trace_{variant}_{icao}.json")
}

/// Source of per-aircraft traces. The bulk puller works against this trait
/// so tests can substitute a stub for the live endpoint.
#[async_trait]
pub trait TraceSource {
    /// Fetch and decode one aircraft's trace. `None` means "no data
    /// available, skip": bad status, unreachable host, or unparseable
    /// JSON all land here rather than failing the caller.
    async fn fetch_trace(&self, icao_hex: &str, recent: bool) -> Option<Trace>;
}

/// HTTP client for the ADS-B aggregation service.
#[derive(Debug, Clone)]
pub struct AdsbClient {
    client: reqwest::Client,
}

impl AdsbClient {
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_FETCH_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(REFERER, HeaderValue::from_static(GLOBE_ORIGIN));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .context("Building HTTP client")?;
        Ok(Self { client })
    }

    /// Fetch a live snapshot of all visible aircraft, optionally scoped to
    /// a bounding box. Unlike trace fetches this is a batch-level request,
    /// so failures surface as errors.
    pub async fn fetch_snapshot(&self, bbox: Option<&BoundingBox>) -> Result<Snapshot> {
        let mut url = format!("{GLOBE_ORIGIN}/re-api/?all_with_pos");
        if let Some(bbox) = bbox {
            url.push_str("&box=");
            url.push_str(&bbox.to_query_value());
        }

        let value = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?
            .error_for_status()
            .with_context(|| format!("GET {url}"))?
            .json::<serde_json::Value>()
            .await
            .with_context(|| format!("Reading snapshot body from {url}"))?;

        Snapshot::parse(value)
    }

    /// Fetch one aircraft's trace as raw provider JSON. Any HTTP status
    /// >= 400 or a body that is not JSON yields `None`.
    pub async fn fetch_trace_raw(&self, icao_hex: &str, recent: bool) -> Option<serde_json::Value> {
        let icao = sanitize_hex(icao_hex);
        if icao.is_empty() {
            warn!("Ignoring empty ICAO hex {:?}", icao_hex);
            return None;
        }

        let url = trace_url(&icao, recent);
        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(e) => {
                debug!("Trace request failed for {}: {}", icao, e);
                return None;
            }
        };

        let status = response.status();
        if status.as_u16() >= 400 {
            debug!("Received bad status code {} for {}", status, icao);
            return None;
        }

        match response.json::<serde_json::Value>().await {
            Ok(value) => Some(value),
            Err(e) => {
                debug!("Failed to read trace JSON for {} [{}]: {}", icao, status, e);
                None
            }
        }
    }
}

#[async_trait]
impl TraceSource for AdsbClient {
    async fn fetch_trace(&self, icao_hex: &str, recent: bool) -> Option<Trace> {
        let raw = self.fetch_trace_raw(icao_hex, recent).await?;
        match Trace::from_provider_json(raw) {
            Ok(trace) => Some(trace),
            Err(e) => {
                warn!("Discarding undecodable trace for {}: {}", icao_hex, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trace_url_sharding() {
        assert_eq!(
            trace_url("a1b2c3", false),
            "https://globe.adsbexchange.com/data/traces/c3/trace_full_a1b2c3.json"
        );
        assert_eq!(
            trace_url("a1b2c3", true),
            "https://globe.adsbexchange.com/data/traces/c3/trace_recent_a1b2c3.json"
        );
        // Degenerate short input still shards on whatever is there.
        assert_eq!(
            trace_url("7", false),
            "https://globe.adsbexchange.com/data/traces/7/trace_full_7.json"
        );
    }

    #[test]
    fn test_sanitize_hex() {
        assert_eq!(sanitize_hex("A1B2C3"), "a1b2c3");
        assert_eq!(sanitize_hex("~a56e2f"), "a56e2f");
        assert_eq!(sanitize_hex("  ae14-60 "), "ae1460");
        assert_eq!(sanitize_hex("~~"), "");
    }
}
