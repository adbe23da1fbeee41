use serde::{Deserialize, Serialize};

/// Geographic bounding box used to scope snapshot requests.
/// Borders are in decimal degrees, south/west inclusive of the lower corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub south: f64,
    pub north: f64,
    pub west: f64,
    pub east: f64,
}

impl BoundingBox {
    /// Render the box as the `south,north,west,east` query value the
    /// snapshot endpoint expects.
    pub fn to_query_value(&self) -> String {
        format!("{},{},{},{}", self.south, self.north, self.west, self.east)
    }
}

/// Check whether a point lies within `threshold_nm` nautical miles of a
/// target point, using a squared-angular-distance approximation with the
/// longitude delta scaled by the cosine of the average latitude.
///
/// One arcminute of latitude is one nautical mile, so the threshold is
/// compared in degrees as `threshold_nm / 60`. Missing coordinates are
/// treated as "not within range" rather than an error.
pub fn within_radius(
    lat: Option<f64>,
    lon: Option<f64>,
    target_lat: f64,
    target_lon: f64,
    threshold_nm: f64,
) -> bool {
    let (lat, lon) = match (lat, lon) {
        (Some(lat), Some(lon)) => (lat, lon),
        _ => return false,
    };

    let avg_lat = ((lat + target_lat) / 2.0).to_radians();
    let dlat = lat - target_lat;
    let dlon = (lon - target_lon) * avg_lat.cos();
    let threshold_deg = threshold_nm / 60.0;

    dlat * dlat + dlon * dlon < threshold_deg * threshold_deg
}
