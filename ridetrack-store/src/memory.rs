use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ridetrack_core::repository::StoreResult;
use ridetrack_core::{Booking, BookingStatus, BookingStore, CapacityRecord, CapacityStore, StoreError};
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

/// In-process store for both vehicles and bookings.
///
/// Each operation holds the map lock only for the duration of the check and
/// write, so compare-and-swap and conditional transitions are atomic with
/// respect to every other caller sharing this instance.
#[derive(Debug, Default)]
pub struct MemoryStore {
    vehicles: Mutex<HashMap<Uuid, CapacityRecord>>,
    bookings: Mutex<HashMap<Uuid, Booking>>,
    writes: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed writes (inserts, swaps, transitions) so far.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    fn vehicles(&self) -> StoreResult<MutexGuard<'_, HashMap<Uuid, CapacityRecord>>> {
        self.vehicles
            .lock()
            .map_err(|_| StoreError::Backend("vehicle map lock poisoned".to_string()))
    }

    fn bookings(&self) -> StoreResult<MutexGuard<'_, HashMap<Uuid, Booking>>> {
        self.bookings
            .lock()
            .map_err(|_| StoreError::Backend("booking map lock poisoned".to_string()))
    }

    fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl CapacityStore for MemoryStore {
    async fn get(&self, vehicle_id: Uuid) -> StoreResult<Option<CapacityRecord>> {
        Ok(self.vehicles()?.get(&vehicle_id).cloned())
    }

    async fn insert(&self, record: &CapacityRecord) -> StoreResult<()> {
        let mut vehicles = self.vehicles()?;
        if vehicles.contains_key(&record.id) {
            return Err(StoreError::Duplicate(record.id.to_string()));
        }
        vehicles.insert(record.id, record.clone());
        self.record_write();
        Ok(())
    }

    async fn compare_and_swap(&self, expected_version: u64, next: &CapacityRecord) -> StoreResult<bool> {
        let mut vehicles = self.vehicles()?;
        match vehicles.get_mut(&next.id) {
            Some(current) if current.version == expected_version => {
                *current = next.clone();
                self.record_write();
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(StoreError::Backend(format!("vehicle {} vanished during update", next.id))),
        }
    }
}

#[async_trait]
impl BookingStore for MemoryStore {
    async fn create(&self, booking: &Booking) -> StoreResult<()> {
        let mut bookings = self.bookings()?;
        if bookings.contains_key(&booking.id) {
            return Err(StoreError::Duplicate(booking.id.to_string()));
        }
        bookings.insert(booking.id, booking.clone());
        self.record_write();
        Ok(())
    }

    async fn get(&self, booking_id: Uuid) -> StoreResult<Option<Booking>> {
        Ok(self.bookings()?.get(&booking_id).cloned())
    }

    async fn transition(
        &self,
        booking_id: Uuid,
        from: BookingStatus,
        to: BookingStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let mut bookings = self.bookings()?;
        match bookings.get_mut(&booking_id) {
            Some(booking) if booking.status == from => {
                booking.apply_status(to, at);
                self.record_write();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn query(&self, vehicle_id: Uuid, status: BookingStatus) -> StoreResult<Vec<Booking>> {
        let bookings = self.bookings()?;
        let mut found: Vec<Booking> = bookings
            .values()
            .filter(|b| b.vehicle_id == vehicle_id && b.status == status)
            .cloned()
            .collect();
        found.sort_by_key(|b| b.created_at);
        Ok(found)
    }

    async fn vehicles_with_status(&self, status: BookingStatus) -> StoreResult<Vec<Uuid>> {
        let bookings = self.bookings()?;
        let ids: BTreeSet<Uuid> = bookings
            .values()
            .filter(|b| b.status == status)
            .map(|b| b.vehicle_id)
            .collect();
        Ok(ids.into_iter().collect())
    }
}
