use anyhow::Result;
use std::path::Path;
use tracing::info;

use crate::airports;

/// Build the sorted flat airport table from an OurAirports-format CSV.
pub async fn handle_build_airports(source: &Path, out_path: &Path) -> Result<()> {
    info!("Building airport database from {:?}", source);
    let count = airports::build_database(source, out_path)?;
    info!("Airport database ready: {} records in {:?}", count, out_path);
    Ok(())
}
