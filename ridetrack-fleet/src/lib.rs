pub mod geo;
pub mod inventory;
pub mod pricing;
pub mod tracking;

pub use geo::GeoError;
pub use inventory::CapacityLedger;
pub use pricing::FareEngine;
pub use tracking::{Eta, VehicleTracker};
