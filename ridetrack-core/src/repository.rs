use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::booking::{Booking, BookingStatus};
use crate::vehicle::CapacityRecord;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store backend error: {0}")]
    Backend(String),

    #[error("Corrupt record {key}: {reason}")]
    Corrupt { key: String, reason: String },

    #[error("Duplicate key: {0}")]
    Duplicate(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Backing store for vehicle seat counters.
///
/// `compare_and_swap` is the only write path for counters: it commits `next`
/// if and only if the stored record still has `expected_version`, and
/// reports whether it did. Implementations must make the check and the
/// write one atomic step.
#[async_trait]
pub trait CapacityStore: Send + Sync {
    async fn get(&self, vehicle_id: Uuid) -> StoreResult<Option<CapacityRecord>>;

    /// Create a record. Fails with `Duplicate` if the id already exists.
    async fn insert(&self, record: &CapacityRecord) -> StoreResult<()>;

    async fn compare_and_swap(
        &self,
        expected_version: u64,
        next: &CapacityRecord,
    ) -> StoreResult<bool>;
}

/// Backing store for booking records.
#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn create(&self, booking: &Booking) -> StoreResult<()>;

    async fn get(&self, booking_id: Uuid) -> StoreResult<Option<Booking>>;

    /// Move a booking from `from` to `to` only if it is still in `from`.
    /// Returns `false` when the stored status differs (another writer won).
    /// Moving to `Expired` also sets `is_expired`.
    async fn transition(
        &self,
        booking_id: Uuid,
        from: BookingStatus,
        to: BookingStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<bool>;

    async fn query(&self, vehicle_id: Uuid, status: BookingStatus) -> StoreResult<Vec<Booking>>;

    /// Distinct vehicles that have at least one booking in `status`.
    async fn vehicles_with_status(&self, status: BookingStatus) -> StoreResult<Vec<Uuid>>;
}
