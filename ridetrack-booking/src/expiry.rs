//! Reservation expiry.
//!
//! Pending bookings past their window are moved to `expired` one at a time
//! with a conditional transition; only the transitions this caller wins are
//! counted, and their seats go back to the vehicle in a single ledger update.

use ridetrack_core::{BookingResult, BookingStatus};
use serde::Serialize;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::manager::ReservationManager;

/// Outcome of a fleet-wide sweep
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SweepSummary {
    pub expired: usize,
    /// Vehicles that had at least one booking expired.
    pub vehicles: Vec<Uuid>,
    pub failed_vehicles: usize,
}

impl ReservationManager {
    /// Expire `vehicle_id`'s stale pending bookings and return their seats.
    pub async fn expire_stale_bookings(&self, vehicle_id: Uuid) -> BookingResult<usize> {
        let now = self.clock.now();
        let pending = self.bookings.query(vehicle_id, BookingStatus::Pending).await?;

        let mut expired = 0;
        let mut seats = 0u32;
        let mut failure = None;
        for booking in pending.iter().filter(|b| b.is_stale(now)) {
            match self
                .bookings
                .transition(booking.id, BookingStatus::Pending, BookingStatus::Expired, now)
                .await
            {
                Ok(true) => {
                    debug!("Booking {} expired ({} seats)", booking.id, booking.number_of_passengers);
                    expired += 1;
                    seats = seats.saturating_add(booking.number_of_passengers);
                }
                Ok(false) => {}
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        // Seats of bookings already moved to expired are returned even when
        // the sweep stopped early; later sweeps no longer see those bookings.
        if seats > 0 {
            self.ledger.release_online(vehicle_id, seats).await.inspect_err(|e| {
                error!(
                    "Expired {} bookings on vehicle {} but could not return {} seats: {}",
                    expired, vehicle_id, seats, e
                )
            })?;
            info!("Expired {} stale bookings on vehicle {}, {} seats released", expired, vehicle_id, seats);
        }

        if let Some(e) = failure {
            error!("Expiry sweep on vehicle {} stopped after {} bookings: {}", vehicle_id, expired, e);
            return Err(e.into());
        }

        Ok(expired)
    }

    /// Sweep every vehicle with pending bookings. A failing vehicle is
    /// logged and skipped so the rest of the fleet is still swept.
    pub async fn expire_all_stale(&self) -> BookingResult<SweepSummary> {
        let mut summary = SweepSummary::default();
        for vehicle_id in self.bookings.vehicles_with_status(BookingStatus::Pending).await? {
            match self.expire_stale_bookings(vehicle_id).await {
                Ok(0) => {}
                Ok(n) => {
                    summary.expired += n;
                    summary.vehicles.push(vehicle_id);
                }
                Err(e) => {
                    error!("Expiry sweep failed for vehicle {}: {}", vehicle_id, e);
                    summary.failed_vehicles += 1;
                }
            }
        }
        Ok(summary)
    }
}
