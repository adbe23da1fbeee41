use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::snapshot::Altitude;

/// Bit in the per-state flags element that gates the geometric climb rate.
const FLAG_GEOM_RATE: i64 = 4;
/// Bit in the per-state flags element that gates the geometric altitude.
const FLAG_GEOM_ALT: i64 = 8;

/// A single decoded position report from a trace.
///
/// The provider encodes each state as a fixed-position heterogeneous array
/// of up to 15 elements. Older schema versions ship shorter arrays, so any
/// out-of-range index decodes as `None` instead of failing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceState {
    /// Seconds since the trace's base timestamp
    pub seconds_offset: Option<f64>,
    /// Latitude in decimal degrees
    pub latitude: Option<f64>,
    /// Longitude in decimal degrees
    pub longitude: Option<f64>,
    /// Barometric altitude in feet, or "ground"
    pub altitude: Option<Altitude>,
    /// Ground speed in knots
    pub gs: Option<f64>,
    /// True track over ground in degrees (0-359)
    pub track: Option<f64>,
    /// Raw per-state flags bitmask
    pub flags: Option<i64>,
    /// Rate of change of barometric altitude, feet/minute
    pub climb_rate: Option<f64>,
    /// Message source for this position (e.g. "adsb_icao")
    pub source_type: Option<String>,
    /// Geometric (GNSS/INS) altitude in feet, WGS84
    pub geom_alt: Option<f64>,
    /// Rate of change of geometric altitude, feet/minute
    pub geom_rate: Option<f64>,
    /// Indicated airspeed in knots
    pub ias: Option<f64>,
    /// Roll in degrees, negative is left
    pub roll: Option<f64>,
}

fn num_at(raw: &[Value], index: usize) -> Option<f64> {
    raw.get(index).and_then(Value::as_f64)
}

fn int_at(raw: &[Value], index: usize) -> Option<i64> {
    raw.get(index).and_then(Value::as_i64)
}

fn str_at(raw: &[Value], index: usize) -> Option<String> {
    raw.get(index)
        .and_then(Value::as_str)
        .map(|s| s.to_string())
}

fn altitude_at(raw: &[Value], index: usize) -> Option<Altitude> {
    raw.get(index)
        .and_then(|v| serde_json::from_value::<Altitude>(v.clone()).ok())
}

impl TraceState {
    /// Decode one raw positional array.
    ///
    /// The geometric altitude and geometric rate slots are only meaningful
    /// when the corresponding flag bit is set; the provider reuses those
    /// slots otherwise, so an unset bit forces the field to `None` even
    /// when the slot holds a number.
    pub fn decode(raw: &[Value]) -> Self {
        let flags = int_at(raw, 6);
        let bits = flags.unwrap_or(0);
        let has_geom_rate = bits & FLAG_GEOM_RATE != 0;
        let has_geom_alt = bits & FLAG_GEOM_ALT != 0;

        TraceState {
            seconds_offset: num_at(raw, 0),
            latitude: num_at(raw, 1),
            longitude: num_at(raw, 2),
            altitude: altitude_at(raw, 3),
            gs: num_at(raw, 4),
            track: num_at(raw, 5),
            flags,
            climb_rate: num_at(raw, 7),
            source_type: str_at(raw, 9),
            geom_alt: if has_geom_alt { num_at(raw, 10) } else { None },
            geom_rate: if has_geom_rate { num_at(raw, 11) } else { None },
            ias: num_at(raw, 12),
            roll: num_at(raw, 13),
        }
    }
}

/// Per-aircraft historical trace: identity and registration metadata plus
/// the ordered sequence of decoded position states.
///
/// This is also the persisted per-aircraft file format; serializing a
/// decoded trace and reading it back yields field-for-field equality.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Trace {
    /// 24-bit ICAO address as a hex string
    pub icao: Option<String>,
    /// Registration number
    pub registration: Option<String>,
    /// Aircraft type designator
    pub aircraft_type: Option<String>,
    /// Free-text aircraft description
    pub description: Option<String>,
    /// Owner or operator
    pub owner_operator: Option<String>,
    /// Base UNIX timestamp of the trace
    pub timestamp: Option<f64>,
    pub military: bool,
    pub interesting: bool,
    pub pia: bool,
    pub ladd: bool,
    pub states: Vec<TraceState>,
}

/// Provider-side trace envelope, prior to decoding the state arrays.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawTrace {
    icao: Option<String>,
    r: Option<String>,
    t: Option<String>,
    desc: Option<String>,
    #[serde(rename = "ownOp")]
    own_op: Option<String>,
    #[serde(rename = "dbFlags")]
    db_flags: Option<i64>,
    timestamp: Option<f64>,
    trace: Vec<Vec<Value>>,
}

impl Trace {
    /// Decode a trace from the raw provider JSON. A missing `dbFlags`
    /// decodes as no flags set.
    pub fn from_provider_json(value: Value) -> Result<Self> {
        let raw: RawTrace = serde_json::from_value(value).context("Parsing trace JSON")?;
        let db_flags = raw.db_flags.unwrap_or(0);

        Ok(Trace {
            icao: raw.icao,
            registration: raw.r,
            aircraft_type: raw.t,
            description: raw.desc,
            owner_operator: raw.own_op,
            timestamp: raw.timestamp,
            military: db_flags & 1 != 0,
            interesting: db_flags & 2 != 0,
            pia: db_flags & 4 != 0,
            ladd: db_flags & 8 != 0,
            states: raw.trace.iter().map(|s| TraceState::decode(s)).collect(),
        })
    }

    /// Render the decoded trace as pretty-printed JSON, the on-disk format
    /// for per-aircraft output files.
    pub fn to_pretty_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Serializing trace")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_full_state_with_geometric_bits_set() {
        let raw = json!([10.5, 38.81, -104.71, 5000, 120, 90, 12, -200, null, "adsb_icao", 5150, -250, 115, -1.2]);
        let state = TraceState::decode(raw.as_array().unwrap());

        assert_eq!(state.seconds_offset, Some(10.5));
        assert_eq!(state.latitude, Some(38.81));
        assert_eq!(state.longitude, Some(-104.71));
        assert_eq!(state.altitude, Some(Altitude::Feet(5000.0)));
        assert_eq!(state.gs, Some(120.0));
        assert_eq!(state.track, Some(90.0));
        assert_eq!(state.flags, Some(12));
        assert_eq!(state.climb_rate, Some(-200.0));
        assert_eq!(state.source_type.as_deref(), Some("adsb_icao"));
        // Bits 4 and 8 are both set, so both geometric fields populate.
        assert_eq!(state.geom_alt, Some(5150.0));
        assert_eq!(state.geom_rate, Some(-250.0));
        assert_eq!(state.ias, Some(115.0));
        assert_eq!(state.roll, Some(-1.2));
    }

    #[test]
    fn test_unset_bits_suppress_geometric_fields() {
        // The provider reuses slots 10/11 when the bits are unset; the
        // decoded fields must still be None.
        let raw = json!([0, 38.81, -104.71, 5000, 120, 90, 0, -200, null, "adsb_icao", 9999, 8888, 115, 0]);
        let state = TraceState::decode(raw.as_array().unwrap());
        assert_eq!(state.geom_alt, None);
        assert_eq!(state.geom_rate, None);

        // Only the geom-rate bit set: altitude stays suppressed.
        let raw = json!([0, 38.81, -104.71, 5000, 120, 90, 4, -200, null, "adsb_icao", 9999, 8888]);
        let state = TraceState::decode(raw.as_array().unwrap());
        assert_eq!(state.geom_alt, None);
        assert_eq!(state.geom_rate, Some(8888.0));
    }

    #[test]
    fn test_decode_short_array_yields_none_for_trailing_fields() {
        // Bits 4+8 set but only 10 elements: the geometric slots do not
        // exist, so the decoder must produce None without indexing past
        // the end.
        let raw = json!([10.5, 38.81, -104.71, 5000, 120, 90, 12, -200, null, "adsb_icao"]);
        let state = TraceState::decode(raw.as_array().unwrap());
        assert_eq!(state.geom_alt, None);
        assert_eq!(state.geom_rate, None);
        assert_eq!(state.ias, None);
        assert_eq!(state.roll, None);
        assert_eq!(state.climb_rate, Some(-200.0));

        let state = TraceState::decode(json!([3.0, 38.0]).as_array().unwrap());
        assert_eq!(state.seconds_offset, Some(3.0));
        assert_eq!(state.latitude, Some(38.0));
        assert_eq!(state.longitude, None);
        assert_eq!(state.altitude, None);
        assert_eq!(state.flags, None);

        let state = TraceState::decode(&[]);
        assert_eq!(state, TraceState::default());
    }

    #[test]
    fn test_decode_ground_altitude() {
        let raw = json!([0, 38.81, -104.71, "ground", 0, 90, 0]);
        let state = TraceState::decode(raw.as_array().unwrap());
        assert_eq!(state.altitude, Some(Altitude::Ground));
    }

    #[test]
    fn test_trace_from_provider_json() {
        let raw = json!({
            "icao": "a1b2c3",
            "r": "N123AB",
            "t": "B738",
            "desc": "BOEING 737-800",
            "ownOp": "EXAMPLE AIR",
            "dbFlags": 5,
            "timestamp": 1697000000.0,
            "trace": [
                [0, 38.81, -104.71, 5000, 120, 90, 0, -200, null, "adsb_icao"],
                [4.2, 38.82, -104.72, 5100, 125, 91, 0, 300, null, "adsb_icao"]
            ]
        });

        let trace = Trace::from_provider_json(raw).expect("Failed to parse trace");
        assert_eq!(trace.icao.as_deref(), Some("a1b2c3"));
        assert_eq!(trace.registration.as_deref(), Some("N123AB"));
        assert_eq!(trace.aircraft_type.as_deref(), Some("B738"));
        assert_eq!(trace.owner_operator.as_deref(), Some("EXAMPLE AIR"));
        assert!(trace.military);
        assert!(!trace.interesting);
        assert!(trace.pia);
        assert!(!trace.ladd);
        assert_eq!(trace.states.len(), 2);
        assert_eq!(trace.states[1].climb_rate, Some(300.0));
    }

    #[test]
    fn test_missing_db_flags_decodes_as_unflagged() {
        let raw = json!({"icao": "a1b2c3", "trace": []});
        let trace = Trace::from_provider_json(raw).expect("Failed to parse trace");
        assert!(!trace.military && !trace.interesting && !trace.pia && !trace.ladd);
        assert!(trace.states.is_empty());
    }

    #[test]
    fn test_trace_json_round_trip() {
        let raw = json!({
            "icao": "ae1460",
            "r": "96-0042",
            "dbFlags": 1,
            "timestamp": 1697000000.0,
            "trace": [
                [0, 38.81, -104.71, "ground", 0, 90, 0],
                [7.5, 38.82, -104.72, 5100, 125, 91, 12, 300, null, "adsb_icao", 5200, 280]
            ]
        });

        let trace = Trace::from_provider_json(raw).expect("Failed to parse trace");
        let json = trace.to_pretty_json().expect("Failed to serialize trace");
        let back: Trace = serde_json::from_str(&json).expect("Failed to deserialize trace");
        assert_eq!(trace, back);
    }
}
