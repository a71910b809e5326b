use serde::{Deserialize, Serialize};

use crate::vehicle::VehicleType;

/// Distance-based fare for one passenger, in minor currency units.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct FareRate {
    pub base_cents: i64,
    pub per_km_cents: i64,
    /// Distance covered by the base fare.
    pub included_km: f64,
    pub minimum_cents: i64,
}

/// Fare rates per vehicle class
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FareTable {
    pub bus: FareRate,
    pub minibus: FareRate,
    pub van: FareRate,
}

impl FareTable {
    pub fn rate_for(&self, vehicle_type: VehicleType) -> &FareRate {
        match vehicle_type {
            VehicleType::Bus => &self.bus,
            VehicleType::Minibus => &self.minibus,
            VehicleType::Van => &self.van,
        }
    }
}

impl Default for FareTable {
    fn default() -> Self {
        Self {
            bus: FareRate { base_cents: 1300, per_km_cents: 225, included_km: 5.0, minimum_cents: 1300 },
            minibus: FareRate { base_cents: 1500, per_km_cents: 250, included_km: 4.0, minimum_cents: 1500 },
            van: FareRate { base_cents: 2000, per_km_cents: 300, included_km: 3.0, minimum_cents: 2000 },
        }
    }
}
