//! Great-circle distance and travel-time estimates.
//!
//! Straight-line figures only; road routing is not modelled.

use ridetrack_core::GeoPoint;

pub const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeoError {
    #[error("Invalid coordinate: lat {lat}, lng {lng}")]
    InvalidCoordinate { lat: f64, lng: f64 },

    #[error("Invalid average speed: {0} km/h")]
    InvalidSpeed(f64),
}

fn validate(point: &GeoPoint) -> Result<(), GeoError> {
    if point.is_valid() {
        Ok(())
    } else {
        Err(GeoError::InvalidCoordinate { lat: point.lat, lng: point.lng })
    }
}

/// Haversine distance between two points in kilometres.
pub fn distance_km(a: &GeoPoint, b: &GeoPoint) -> Result<f64, GeoError> {
    validate(a)?;
    validate(b)?;

    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (d_lng / 2.0).sin().powi(2);

    Ok(2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin())
}

/// Whole minutes to cover `distance_km` at `average_speed_kmh`, rounded up.
pub fn eta_minutes(distance_km: f64, average_speed_kmh: f64) -> Result<u32, GeoError> {
    if !average_speed_kmh.is_finite() || average_speed_kmh <= 0.0 {
        return Err(GeoError::InvalidSpeed(average_speed_kmh));
    }
    let minutes = (distance_km.max(0.0) / average_speed_kmh * 60.0).ceil();
    Ok(minutes.min(u32::MAX as f64) as u32)
}

pub fn is_within(a: &GeoPoint, b: &GeoPoint, radius_km: f64) -> Result<bool, GeoError> {
    Ok(distance_km(a, b)? <= radius_km)
}
