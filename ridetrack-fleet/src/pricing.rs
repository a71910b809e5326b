use ridetrack_core::{FareRate, FareTable, GeoPoint, VehicleType};

use crate::geo::{distance_km, GeoError};

/// Distance-based fares from the configured per-vehicle-type rates
#[derive(Debug, Clone, Default)]
pub struct FareEngine {
    table: FareTable,
}

impl FareEngine {
    pub fn new(table: FareTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &FareTable {
        &self.table
    }

    /// `base + per_km * max(0, km - included_km)`, floored at the minimum fare.
    pub fn price_for_distance(rate: &FareRate, km: f64) -> i64 {
        let chargeable_km = (km - rate.included_km).max(0.0);
        let distance_cents = (chargeable_km * rate.per_km_cents as f64).round() as i64;
        rate.base_cents.saturating_add(distance_cents).max(rate.minimum_cents)
    }

    pub fn fare_per_passenger(
        &self,
        pickup: &GeoPoint,
        dropoff: &GeoPoint,
        vehicle_type: VehicleType,
    ) -> Result<i64, GeoError> {
        let km = distance_km(pickup, dropoff)?;
        Ok(Self::price_for_distance(self.table.rate_for(vehicle_type), km))
    }

    /// Fare for the whole party.
    pub fn quote(
        &self,
        pickup: &GeoPoint,
        dropoff: &GeoPoint,
        vehicle_type: VehicleType,
        passengers: u32,
    ) -> Result<i64, GeoError> {
        let per_passenger = self.fare_per_passenger(pickup, dropoff, vehicle_type)?;
        Ok(per_passenger.saturating_mul(passengers as i64))
    }
}
