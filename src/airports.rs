use anyhow::{Context, Result, anyhow};
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use tracing::{debug, info, warn};

/// One row of the flat airport table: identifier plus coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct AirportRecord {
    /// Airport identifier (ICAO or local code)
    pub ident: String,
    /// Latitude in decimal degrees
    pub latitude: f64,
    /// Longitude in decimal degrees
    pub longitude: f64,
}

/// Build the sorted flat airport table from an OurAirports-format CSV.
///
/// Relevant OurAirports columns (0-based): 1: ident, 4: latitude_deg,
/// 5: longitude_deg. Rows without an identifier or numeric coordinates are
/// skipped. Output rows are sorted by identifier ascending, each field
/// trailing-comma-terminated, one record per line.
pub fn build_database<P: AsRef<Path>, Q: AsRef<Path>>(source: P, out_path: Q) -> Result<usize> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(source.as_ref())
        .with_context(|| format!("Opening {:?}", source.as_ref()))?;

    let mut records = Vec::new();
    let mut skipped = 0usize;

    for (lineno, result) in reader.records().enumerate() {
        let row = result.with_context(|| format!("Reading CSV record {}", lineno + 1))?;

        let ident = row.get(1).map(str::trim).unwrap_or("");
        let latitude = row.get(4).and_then(|s| s.trim().parse::<f64>().ok());
        let longitude = row.get(5).and_then(|s| s.trim().parse::<f64>().ok());

        match (latitude, longitude) {
            (Some(latitude), Some(longitude)) if !ident.is_empty() => {
                records.push(AirportRecord {
                    ident: ident.to_string(),
                    latitude,
                    longitude,
                });
            }
            _ => {
                debug!("Skipping airport row {} without ident/coordinates", lineno + 1);
                skipped += 1;
            }
        }
    }

    records.sort_by(|a, b| a.ident.cmp(&b.ident));

    let mut out = File::create(out_path.as_ref())
        .with_context(|| format!("Creating {:?}", out_path.as_ref()))?;
    for record in &records {
        writeln!(
            out,
            "{},{},{},",
            record.ident, record.latitude, record.longitude
        )?;
    }

    info!(
        "Wrote {} airports to {:?} ({} rows skipped)",
        records.len(),
        out_path.as_ref(),
        skipped
    );
    Ok(records.len())
}

/// Read the flat airport table written by [`build_database`]. Malformed
/// lines are skipped with a warning; blank lines are ignored.
pub fn load_database<P: AsRef<Path>>(path: P) -> Result<Vec<AirportRecord>> {
    let f = File::open(path.as_ref()).with_context(|| format!("Opening {:?}", path.as_ref()))?;
    let reader = BufReader::new(f);
    let mut out = Vec::new();

    for (lineno, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("Reading line {}", lineno + 1))?;
        if line.trim().is_empty() {
            continue;
        }

        let parts: Vec<&str> = line.split(',').filter(|p| !p.is_empty()).collect();
        if parts.len() < 3 {
            warn!("Skipping malformed airport line {}: {:?}", lineno + 1, line);
            continue;
        }
        let (latitude, longitude) = match (parts[1].parse::<f64>(), parts[2].parse::<f64>()) {
            (Ok(lat), Ok(lon)) => (lat, lon),
            _ => {
                warn!(
                    "Skipping airport line {} with bad coordinates: {:?}",
                    lineno + 1,
                    line
                );
                continue;
            }
        };
        out.push(AirportRecord {
            ident: parts[0].to_string(),
            latitude,
            longitude,
        });
    }

    Ok(out)
}

/// Airport table sorted by identifier, queried by binary search.
#[derive(Debug, Clone)]
pub struct AirportIndex {
    records: Vec<AirportRecord>,
}

impl AirportIndex {
    /// Build an index from records, sorting them by identifier. Sorting
    /// here keeps lookups correct even for a hand-edited table file.
    pub fn from_records(mut records: Vec<AirportRecord>) -> Self {
        records.sort_by(|a, b| a.ident.cmp(&b.ident));
        Self { records }
    }

    /// Load the index from a flat table file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::from_records(load_database(path)?))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Binary search for an exact identifier match. A miss is `None`,
    /// never a neighboring record.
    pub fn lookup(&self, ident: &str) -> Option<&AirportRecord> {
        self.records
            .binary_search_by(|record| record.ident.as_str().cmp(ident))
            .ok()
            .map(|i| &self.records[i])
    }

    /// Like [`lookup`](Self::lookup) but with an error naming the missing
    /// identifier, for callers that require the airport to exist.
    pub fn require(&self, ident: &str) -> Result<&AirportRecord> {
        self.lookup(ident)
            .ok_or_else(|| anyhow!("Airport {} not found in database", ident))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_index() -> AirportIndex {
        AirportIndex::from_records(vec![
            AirportRecord {
                ident: "KDEN".to_string(),
                latitude: 39.86,
                longitude: -104.67,
            },
            AirportRecord {
                ident: "KCOS".to_string(),
                latitude: 38.80,
                longitude: -104.70,
            },
        ])
    }

    #[test]
    fn test_lookup_exact_match() {
        let index = sample_index();
        let kcos = index.lookup("KCOS").expect("KCOS should be present");
        assert_eq!(kcos.latitude, 38.80);
        assert_eq!(kcos.longitude, -104.70);

        let kden = index.lookup("KDEN").expect("KDEN should be present");
        assert_eq!(kden.latitude, 39.86);
    }

    #[test]
    fn test_lookup_miss_is_none_not_a_neighbor() {
        let index = sample_index();
        assert!(index.lookup("KXXX").is_none());
        assert!(index.lookup("").is_none());
        assert!(index.lookup("KCO").is_none());
        assert!(index.require("KXXX").is_err());
    }

    #[test]
    fn test_build_database_sorts_and_formats() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("airports.csv");
        let table = dir.path().join("database.csv");

        std::fs::write(
            &source,
            "id,ident,type,name,latitude_deg,longitude_deg,elevation_ft\n\
             2,\"KDEN\",\"large_airport\",\"Denver Intl\",39.86,-104.67,5434\n\
             1,\"KCOS\",\"medium_airport\",\"City of Colorado Springs, Municipal\",38.80,-104.70,6187\n\
             3,\"ZZZZ\",\"heliport\",\"No Coordinates\",,,100\n",
        )
        .unwrap();

        let count = build_database(&source, &table).expect("Failed to build database");
        assert_eq!(count, 2);

        let contents = std::fs::read_to_string(&table).unwrap();
        assert_eq!(contents, "KCOS,38.8,-104.7,\nKDEN,39.86,-104.67,\n");
    }

    #[test]
    fn test_load_database_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let table = dir.path().join("database.csv");
        std::fs::write(&table, "KCOS,38.8,-104.7,\nKDEN,39.86,-104.67,\n\nbogus,line,\n").unwrap();

        let records = load_database(&table).expect("Failed to load database");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].ident, "KCOS");
        assert_eq!(records[1].longitude, -104.67);

        let index = AirportIndex::from_records(records);
        assert_eq!(index.len(), 2);
        assert!(index.lookup("KCOS").is_some());
    }
}
