//! adsblookup - aircraft trace and snapshot ingestion for anomaly
//! detection near airports
//!
//! This library pulls live snapshots and per-aircraft position traces from
//! a public ADS-B aggregation service, decodes the provider's compact
//! positional-array format into typed records, filters by proximity to
//! reference airports, and assembles numeric feature matrices for
//! downstream outlier-detection models.

pub mod adsb_client;
pub mod airports;
pub mod commands;
pub mod features;
pub mod geo;
pub mod puller;
pub mod snapshot;
pub mod trace;

pub use adsb_client::{AdsbClient, TraceSource};
pub use airports::{AirportIndex, AirportRecord};
pub use features::FeatureVector;
pub use geo::BoundingBox;
pub use puller::{BulkPuller, PullSummary};
pub use snapshot::{AircraftState, Altitude, Snapshot};
pub use trace::{Trace, TraceState};
