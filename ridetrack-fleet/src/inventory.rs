use chrono::{DateTime, Utc};
use ridetrack_core::{
    BookingError, BookingResult, CapacityRecord, CapacityStore, Clock, RetryPolicy, StoreError, VehicleType,
};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Seat ledger for every vehicle in the fleet.
///
/// All writes are read-modify-write cycles committed with
/// [`CapacityStore::compare_and_swap`]; a lost race is re-read and retried
/// under the configured [`RetryPolicy`]. A rejected operation leaves the
/// stored counters untouched.
pub struct CapacityLedger {
    store: Arc<dyn CapacityStore>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
}

impl CapacityLedger {
    pub fn new(store: Arc<dyn CapacityStore>, clock: Arc<dyn Clock>, retry: RetryPolicy) -> Self {
        Self { store, clock, retry }
    }

    /// Free seats on `vehicle`, never negative.
    pub fn get_available(vehicle: &CapacityRecord) -> u32 {
        vehicle.available()
    }

    pub fn can_accommodate(vehicle: &CapacityRecord, passengers: u32) -> bool {
        Self::get_available(vehicle) >= passengers
    }

    pub async fn snapshot(&self, vehicle_id: Uuid) -> BookingResult<CapacityRecord> {
        self.store
            .get(vehicle_id)
            .await?
            .ok_or_else(|| BookingError::vehicle_not_found(vehicle_id))
    }

    /// Add a vehicle with empty counters, active.
    pub async fn register(
        &self,
        vehicle_id: Uuid,
        vehicle_type: VehicleType,
        capacity: u32,
    ) -> BookingResult<CapacityRecord> {
        if capacity == 0 {
            return Err(BookingError::InvalidRequest("capacity must be at least 1".to_string()));
        }

        let record = CapacityRecord::new(vehicle_id, vehicle_type, capacity, self.clock.now());
        match self.store.insert(&record).await {
            Ok(()) => {}
            Err(StoreError::Duplicate(_)) => {
                return Err(BookingError::InvalidRequest(format!(
                    "vehicle {} is already registered",
                    vehicle_id
                )))
            }
            Err(e) => return Err(e.into()),
        }

        info!("Registered {} {} with {} seats", vehicle_type, vehicle_id, capacity);
        Ok(record)
    }

    /// Overwrite the app-booked seat count. Negative input is stored as zero.
    pub async fn set_online(&self, vehicle_id: Uuid, new_online: i64) -> BookingResult<CapacityRecord> {
        let online = clamp_count(new_online);
        self.update(vehicle_id, "set_online", move |current, now| {
            let occupied = online.saturating_add(current.offline_occupied_seats);
            if occupied > current.capacity {
                return Err(BookingError::CapacityExceeded { occupied, capacity: current.capacity });
            }
            Ok(Some(current.next(online, current.offline_occupied_seats, now)))
        })
        .await
    }

    /// Overwrite the walk-up seat count. Negative input is stored as zero.
    pub async fn set_offline(&self, vehicle_id: Uuid, new_offline: i64) -> BookingResult<CapacityRecord> {
        let offline = clamp_count(new_offline);
        self.update(vehicle_id, "set_offline", move |current, now| {
            let occupied = current.online_booked_seats.saturating_add(offline);
            if occupied > current.capacity {
                return Err(BookingError::CapacityExceeded { occupied, capacity: current.capacity });
            }
            Ok(Some(current.next(current.online_booked_seats, offline, now)))
        })
        .await
    }

    /// Driver boards one walk-up passenger.
    pub async fn add_offline_passenger(&self, vehicle_id: Uuid) -> BookingResult<CapacityRecord> {
        self.update(vehicle_id, "add_offline_passenger", |current, now| {
            if current.occupied() >= current.capacity {
                return Err(BookingError::CapacityExceeded {
                    occupied: current.occupied(),
                    capacity: current.capacity,
                });
            }
            Ok(Some(current.next(
                current.online_booked_seats,
                current.offline_occupied_seats + 1,
                now,
            )))
        })
        .await
    }

    /// Driver drops one walk-up passenger. No write when none are aboard.
    pub async fn remove_offline_passenger(&self, vehicle_id: Uuid) -> BookingResult<CapacityRecord> {
        self.update(vehicle_id, "remove_offline_passenger", |current, now| {
            if current.offline_occupied_seats == 0 {
                return Ok(None);
            }
            Ok(Some(current.next(
                current.online_booked_seats,
                current.offline_occupied_seats - 1,
                now,
            )))
        })
        .await
    }

    /// Take `passengers` seats for an app booking.
    pub async fn reserve_online(&self, vehicle_id: Uuid, passengers: u32) -> BookingResult<CapacityRecord> {
        if passengers == 0 {
            return Err(BookingError::InvalidRequest("number_of_passengers must be at least 1".to_string()));
        }

        self.update(vehicle_id, "reserve_online", move |current, now| {
            if !current.is_active {
                return Err(BookingError::VehicleOffline(current.id));
            }
            if !Self::can_accommodate(current, passengers) {
                return Err(BookingError::InsufficientCapacity {
                    requested: passengers,
                    available: Self::get_available(current),
                });
            }
            Ok(Some(current.next(
                current.online_booked_seats + passengers,
                current.offline_occupied_seats,
                now,
            )))
        })
        .await
    }

    /// Give back seats held by a cancelled or expired booking.
    pub async fn release_online(&self, vehicle_id: Uuid, passengers: u32) -> BookingResult<CapacityRecord> {
        self.update(vehicle_id, "release_online", move |current, now| {
            if passengers == 0 || current.online_booked_seats == 0 {
                return Ok(None);
            }
            Ok(Some(current.next(
                current.online_booked_seats.saturating_sub(passengers),
                current.offline_occupied_seats,
                now,
            )))
        })
        .await
    }

    /// Driver goes on or off duty. Inactive vehicles refuse new bookings.
    pub async fn set_active(&self, vehicle_id: Uuid, active: bool) -> BookingResult<CapacityRecord> {
        self.update(vehicle_id, "set_active", move |current, now| {
            if current.is_active == active {
                return Ok(None);
            }
            let mut next = current.next(current.online_booked_seats, current.offline_occupied_seats, now);
            next.is_active = active;
            Ok(Some(next))
        })
        .await
    }

    /// Read, apply `change`, commit if the version has not moved.
    ///
    /// `change` returns `Ok(None)` when there is nothing to write; the
    /// current record is returned as-is in that case.
    async fn update<F>(&self, vehicle_id: Uuid, label: &str, change: F) -> BookingResult<CapacityRecord>
    where
        F: Fn(&CapacityRecord, DateTime<Utc>) -> BookingResult<Option<CapacityRecord>> + Sync,
    {
        let change = &change;
        let record = self
            .retry
            .run(label, move || async move {
                let current = self
                    .store
                    .get(vehicle_id)
                    .await?
                    .ok_or_else(|| BookingError::vehicle_not_found(vehicle_id))?;

                let next = match change(&current, self.clock.now())? {
                    Some(next) => next,
                    None => return Ok(Some(current)),
                };

                if self.store.compare_and_swap(current.version, &next).await? {
                    Ok(Some(next))
                } else {
                    Ok(None)
                }
            })
            .await?;

        debug!(
            "{} on vehicle {}: online {}, offline {}, available {} (v{})",
            label,
            vehicle_id,
            record.online_booked_seats,
            record.offline_occupied_seats,
            record.available_seats,
            record.version
        );
        Ok(record)
    }
}

fn clamp_count(value: i64) -> u32 {
    value.clamp(0, u32::MAX as i64) as u32
}
