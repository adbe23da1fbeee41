use anyhow::{Context, Result};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::warn;

/// Barometric altitude as reported by the provider: either feet or the
/// literal string "ground" for aircraft on the surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Altitude {
    Feet(f64),
    Ground,
}

impl Altitude {
    /// Altitude in feet, or `None` when the aircraft is on the ground.
    pub fn feet(&self) -> Option<f64> {
        match self {
            Altitude::Feet(v) => Some(*v),
            Altitude::Ground => None,
        }
    }

    pub fn is_ground(&self) -> bool {
        matches!(self, Altitude::Ground)
    }
}

impl Serialize for Altitude {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Altitude::Feet(v) => serializer.serialize_f64(*v),
            Altitude::Ground => serializer.serialize_str("ground"),
        }
    }
}

impl<'de> Deserialize<'de> for Altitude {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match serde_json::Value::deserialize(deserializer)? {
            serde_json::Value::Number(n) => n
                .as_f64()
                .map(Altitude::Feet)
                .ok_or_else(|| D::Error::custom("altitude is not a finite number")),
            serde_json::Value::String(s) if s == "ground" => Ok(Altitude::Ground),
            other => Err(D::Error::custom(format!(
                "unexpected altitude value: {other}"
            ))),
        }
    }
}

/// Deserialize an altitude field within a snapshot, resolving unexpected
/// values to `None` with a warning. One aircraft reporting garbage must
/// not cost the rest of the snapshot.
fn tolerant_altitude<'de, D>(deserializer: D) -> Result<Option<Altitude>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let altitude = serde_json::from_value::<Altitude>(value.clone()).ok();
    if altitude.is_none() && !value.is_null() {
        warn!("Ignoring unexpected altitude value: {}", value);
    }
    Ok(altitude)
}

/// A single aircraft within a snapshot. Every field is optional: the
/// provider omits whatever a given aircraft did not transmit, and an absent
/// field must never fail the whole snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AircraftState {
    /// 24-bit ICAO address as a hex string (may carry a `~` prefix for
    /// TIS-B targets)
    pub hex: Option<String>,
    /// Latitude in decimal degrees
    pub lat: Option<f64>,
    /// Longitude in decimal degrees
    pub lon: Option<f64>,
    /// Barometric altitude in feet, or "ground"
    #[serde(deserialize_with = "tolerant_altitude")]
    pub alt_baro: Option<Altitude>,
    /// Geometric (GNSS/INS) altitude in feet, WGS84
    pub alt_geom: Option<f64>,
    /// Rate of change of barometric altitude, feet/minute
    pub baro_rate: Option<f64>,
    /// Rate of change of geometric altitude, feet/minute
    pub geom_rate: Option<f64>,
    /// Ground speed in knots
    pub gs: Option<f64>,
    /// True track over ground in degrees (0-359)
    pub track: Option<f64>,
    /// Roll in degrees, negative is left
    pub roll: Option<f64>,
    /// Heading, degrees clockwise from magnetic north
    pub mag_heading: Option<f64>,
    /// Selected altitude from the MCP/FCU
    pub nav_altitude_mcp: Option<f64>,
    /// Selected heading
    pub nav_heading: Option<f64>,
    /// Engaged automation modes (autopilot, vnav, althold, approach, ...)
    pub nav_modes: Option<Vec<String>>,
    /// Emitter category (A0-D7)
    pub category: Option<String>,
    /// Seconds since the last message from this aircraft
    pub seen: Option<f64>,
    /// Seconds since the last position update
    pub seen_pos: Option<f64>,
    /// Messages received per second from this aircraft
    #[serde(rename = "messageRate")]
    pub message_rate: Option<f64>,
}

/// A point-in-time set of aircraft states pulled from the snapshot
/// endpoint, plus the bounding box and message count the provider reports.
/// Immutable after parse.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    /// UNIX timestamp of the dataset
    pub now: Option<f64>,
    /// Total messages received by the provider
    pub messages: Option<u64>,
    /// Number of aircraft with a known position
    pub global_ac_count_withpos: Option<u64>,
    /// Borders of the box containing all returned aircraft
    pub south: Option<f64>,
    pub west: Option<f64>,
    pub north: Option<f64>,
    pub east: Option<f64>,
    pub aircraft: Vec<AircraftState>,
}

impl Snapshot {
    /// Parse a snapshot from the raw provider JSON. Unknown fields are
    /// ignored and missing fields resolve to `None`/empty.
    pub fn parse(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value).context("Parsing snapshot JSON")
    }
}
