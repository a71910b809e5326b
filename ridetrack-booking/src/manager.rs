use chrono::Duration;
use ridetrack_core::{
    Booking, BookingError, BookingResult, BookingStatus, BookingStore, Clock, NewBooking, RetryPolicy,
};
use ridetrack_fleet::{CapacityLedger, FareEngine};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct ReservationSettings {
    /// How long a pending booking holds its seats.
    pub reservation_timeout: Duration,
    /// Sweep the vehicle's stale bookings before admitting a new one.
    pub lazy_expiry: bool,
    /// Retries for lost booking status races.
    pub retry: RetryPolicy,
}

impl Default for ReservationSettings {
    fn default() -> Self {
        Self {
            reservation_timeout: Duration::minutes(10),
            lazy_expiry: true,
            retry: RetryPolicy::default(),
        }
    }
}

/// Booking lifecycle on top of the capacity ledger.
///
/// Seats are taken before a booking is written and given back when a
/// booking leaves a seat-holding status. Status changes are conditional on
/// the status that was read, so concurrent cancels and sweeps release a
/// booking's seats once.
pub struct ReservationManager {
    pub(crate) ledger: Arc<CapacityLedger>,
    pub(crate) bookings: Arc<dyn BookingStore>,
    pub(crate) fares: FareEngine,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) settings: ReservationSettings,
}

impl ReservationManager {
    pub fn new(
        ledger: Arc<CapacityLedger>,
        bookings: Arc<dyn BookingStore>,
        fares: FareEngine,
        clock: Arc<dyn Clock>,
        settings: ReservationSettings,
    ) -> Self {
        Self { ledger, bookings, fares, clock, settings }
    }

    pub fn ledger(&self) -> &CapacityLedger {
        &self.ledger
    }

    /// Reserve seats and create a pending booking.
    ///
    /// Every call creates a new booking; callers retrying after a timeout
    /// should check for an existing one first.
    pub async fn create_booking(&self, request: NewBooking) -> BookingResult<Booking> {
        let vehicle_id = request.vehicle_id;
        let passengers = request.number_of_passengers;

        if passengers == 0 {
            return Err(BookingError::InvalidRequest("number_of_passengers must be at least 1".to_string()));
        }
        if request.passenger_id.trim().is_empty() {
            return Err(BookingError::InvalidRequest("passenger_id is required".to_string()));
        }

        if self.settings.lazy_expiry {
            self.expire_stale_bookings(vehicle_id).await?;
        }

        let vehicle = self.ledger.snapshot(vehicle_id).await?;
        if !vehicle.is_active {
            return Err(BookingError::VehicleOffline(vehicle_id));
        }

        let fare_cents = match self
            .fares
            .quote(&request.pickup, &request.dropoff, vehicle.vehicle_type, passengers)
        {
            Ok(fare) => fare,
            Err(e) => {
                warn!("Fare lookup failed for vehicle {}, booking at 0: {}", vehicle_id, e);
                0
            }
        };

        // Re-checks activity and capacity against the latest record.
        let seats = self.ledger.reserve_online(vehicle_id, passengers).await?;

        let booking = Booking::pending(request, fare_cents, self.clock.now(), self.settings.reservation_timeout);
        if let Err(e) = self.bookings.create(&booking).await {
            error!("Failed to store booking {} for vehicle {}: {}", booking.id, vehicle_id, e);
            if let Err(release) = self.ledger.release_online(vehicle_id, passengers).await {
                error!(
                    "Could not return {} seats to vehicle {} after failed booking: {}",
                    passengers, vehicle_id, release
                );
            }
            return Err(e.into());
        }

        info!(
            "Booking {} created: {} seat(s) on vehicle {}, {} left",
            booking.id, passengers, vehicle_id, seats.available_seats
        );
        Ok(booking)
    }

    /// Passenger cancels their own booking; its seats are returned.
    pub async fn cancel_booking(&self, booking_id: Uuid, requester_id: &str) -> BookingResult<Booking> {
        let (cancelled, previous) = self
            .settings
            .retry
            .run("cancel_booking", move || async move {
                let booking = self.get_booking(booking_id).await?;
                if booking.passenger_id != requester_id {
                    return Err(BookingError::NotPermitted(requester_id.to_string()));
                }
                if !booking.status.holds_seats() {
                    return Err(rejection(&booking, BookingStatus::Cancelled));
                }

                let now = self.clock.now();
                let previous = booking.status;
                if self
                    .bookings
                    .transition(booking_id, previous, BookingStatus::Cancelled, now)
                    .await?
                {
                    let mut booking = booking;
                    booking.apply_status(BookingStatus::Cancelled, now);
                    Ok(Some((booking, previous)))
                } else {
                    Ok(None)
                }
            })
            .await?;

        if let Err(e) = self
            .ledger
            .release_online(cancelled.vehicle_id, cancelled.number_of_passengers)
            .await
        {
            // Put the booking back so it still accounts for the seats it holds
            // and the passenger can cancel again.
            error!(
                "Could not return {} seats to vehicle {} for booking {}, restoring {}: {}",
                cancelled.number_of_passengers, cancelled.vehicle_id, booking_id, previous, e
            );
            match self
                .bookings
                .transition(booking_id, BookingStatus::Cancelled, previous, self.clock.now())
                .await
            {
                Ok(true) => {}
                Ok(false) => error!("Booking {} changed while restoring it to {}", booking_id, previous),
                Err(restore) => error!("Failed to restore booking {} to {}: {}", booking_id, previous, restore),
            }
            return Err(e);
        }

        info!("Booking {} cancelled by {}", booking_id, requester_id);
        Ok(cancelled)
    }

    /// Driver or payment acknowledgement: `pending -> confirmed`.
    pub async fn confirm_booking(&self, booking_id: Uuid) -> BookingResult<Booking> {
        let booking = self.get_booking(booking_id).await?;
        if booking.status == BookingStatus::Pending && booking.is_stale(self.clock.now()) {
            // Free the seats now rather than waiting for the next sweep.
            self.expire_stale_bookings(booking.vehicle_id).await?;
            return Err(BookingError::BookingExpired(booking_id));
        }

        let confirmed = self.move_status(booking_id, BookingStatus::Pending, BookingStatus::Confirmed).await?;
        info!("Booking {} confirmed", booking_id);
        Ok(confirmed)
    }

    /// Trip finished: `confirmed -> completed`. Seat counts are left to the driver.
    pub async fn complete_booking(&self, booking_id: Uuid) -> BookingResult<Booking> {
        let completed = self.move_status(booking_id, BookingStatus::Confirmed, BookingStatus::Completed).await?;
        info!("Booking {} completed", booking_id);
        Ok(completed)
    }

    pub async fn get_booking(&self, booking_id: Uuid) -> BookingResult<Booking> {
        self.bookings
            .get(booking_id)
            .await?
            .ok_or_else(|| BookingError::booking_not_found(booking_id))
    }

    pub async fn list_bookings(&self, vehicle_id: Uuid, status: BookingStatus) -> BookingResult<Vec<Booking>> {
        Ok(self.bookings.query(vehicle_id, status).await?)
    }

    async fn move_status(&self, booking_id: Uuid, from: BookingStatus, to: BookingStatus) -> BookingResult<Booking> {
        self.settings
            .retry
            .run(to.as_str(), move || async move {
                let booking = self.get_booking(booking_id).await?;
                if booking.status != from {
                    return Err(rejection(&booking, to));
                }

                let now = self.clock.now();
                if self.bookings.transition(booking_id, from, to, now).await? {
                    let mut booking = booking;
                    booking.apply_status(to, now);
                    Ok(Some(booking))
                } else {
                    Ok(None)
                }
            })
            .await
    }
}

/// Error for a booking that cannot move to `to` from where it is.
fn rejection(booking: &Booking, to: BookingStatus) -> BookingError {
    match booking.status {
        BookingStatus::Cancelled => BookingError::AlreadyCancelled(booking.id),
        BookingStatus::Expired => BookingError::BookingExpired(booking.id),
        from => BookingError::InvalidTransition { from, to },
    }
}
