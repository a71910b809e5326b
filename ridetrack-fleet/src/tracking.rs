use chrono::{DateTime, Utc};
use ridetrack_core::{GeoPoint, LocationUpdate};
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;
use uuid::Uuid;

use crate::geo::{distance_km, eta_minutes, GeoError};

/// Travel estimate from a vehicle's last reported position.
#[derive(Debug, Clone, PartialEq)]
pub struct Eta {
    pub distance_km: f64,
    pub minutes: u32,
    /// When the position the estimate starts from was reported.
    pub reported_at: DateTime<Utc>,
}

/// Latest known position of each vehicle, fed by the tracking stream.
pub struct VehicleTracker {
    positions: RwLock<HashMap<Uuid, LocationUpdate>>,
    average_speed_kmh: f64,
}

impl VehicleTracker {
    pub fn new(average_speed_kmh: f64) -> Self {
        Self {
            positions: RwLock::new(HashMap::new()),
            average_speed_kmh,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<Uuid, LocationUpdate>> {
        self.positions.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<Uuid, LocationUpdate>> {
        self.positions.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Store `update` unless a newer report is already held.
    ///
    /// Returns whether the update was kept.
    pub fn record(&self, update: LocationUpdate) -> Result<bool, GeoError> {
        if !update.position.is_valid() {
            return Err(GeoError::InvalidCoordinate {
                lat: update.position.lat,
                lng: update.position.lng,
            });
        }

        let mut positions = self.write();
        if let Some(existing) = positions.get(&update.vehicle_id) {
            if existing.recorded_at > update.recorded_at {
                debug!("Ignoring stale location for vehicle {}", update.vehicle_id);
                return Ok(false);
            }
        }
        positions.insert(update.vehicle_id, update);
        Ok(true)
    }

    pub fn position(&self, vehicle_id: Uuid) -> Option<LocationUpdate> {
        self.read().get(&vehicle_id).cloned()
    }

    /// Estimate for the vehicle to reach `point`, `None` if it has never reported.
    pub fn eta_to(&self, vehicle_id: Uuid, point: &GeoPoint) -> Result<Option<Eta>, GeoError> {
        let Some(update) = self.position(vehicle_id) else {
            return Ok(None);
        };
        let distance_km = distance_km(&update.position, point)?;
        Ok(Some(Eta {
            distance_km,
            minutes: eta_minutes(distance_km, self.average_speed_kmh)?,
            reported_at: update.recorded_at,
        }))
    }

    /// Vehicles within `radius_km` of `point`, closest first, with their distance.
    pub fn nearby(&self, point: &GeoPoint, radius_km: f64) -> Result<Vec<(Uuid, f64)>, GeoError> {
        let positions = self.read();
        let mut found = Vec::new();
        for update in positions.values() {
            let km = distance_km(&update.position, point)?;
            if km <= radius_km {
                found.push((update.vehicle_id, km));
            }
        }
        found.sort_by(|a, b| a.1.total_cmp(&b.1));
        Ok(found)
    }
}
