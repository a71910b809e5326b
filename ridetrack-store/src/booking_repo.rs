use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ridetrack_core::repository::StoreResult;
use ridetrack_core::{Booking, BookingStatus, BookingStore, GeoPoint, StoreError};
use sqlx::PgPool;
use uuid::Uuid;

const BOOKING_COLUMNS: &str = "id, vehicle_id, passenger_id, number_of_passengers, pickup_lat, pickup_lng, \
     dropoff_lat, dropoff_lng, status, fare_cents, created_at, updated_at, reservation_expires_at, is_expired";

/// Booking records in Postgres.
///
/// Status changes are conditional updates (`WHERE status = $from`), so two
/// sweepers or a sweeper and a canceller cannot both act on one booking.
pub struct PgBookingStore {
    pool: PgPool,
}

impl PgBookingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    vehicle_id: Uuid,
    passenger_id: String,
    number_of_passengers: i32,
    pickup_lat: f64,
    pickup_lng: f64,
    dropoff_lat: f64,
    dropoff_lng: f64,
    status: String,
    fare_cents: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    reservation_expires_at: DateTime<Utc>,
    is_expired: bool,
}

impl TryFrom<BookingRow> for Booking {
    type Error = StoreError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        let status = row.status.parse::<BookingStatus>().map_err(|reason| StoreError::Corrupt {
            key: format!("bookings/{}", row.id),
            reason,
        })?;
        let number_of_passengers = u32::try_from(row.number_of_passengers).map_err(|_| StoreError::Corrupt {
            key: format!("bookings/{}", row.id),
            reason: format!("number_of_passengers: {}", row.number_of_passengers),
        })?;

        Ok(Booking {
            id: row.id,
            vehicle_id: row.vehicle_id,
            passenger_id: row.passenger_id,
            number_of_passengers,
            pickup: GeoPoint::new(row.pickup_lat, row.pickup_lng),
            dropoff: GeoPoint::new(row.dropoff_lat, row.dropoff_lng),
            status,
            fare_cents: row.fare_cents,
            created_at: row.created_at,
            updated_at: row.updated_at,
            reservation_expires_at: row.reservation_expires_at,
            is_expired: row.is_expired,
        })
    }
}

fn backend(e: sqlx::Error) -> StoreError {
    match e {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Duplicate(db.message().to_string()),
        other => StoreError::Backend(other.to_string()),
    }
}

#[async_trait]
impl BookingStore for PgBookingStore {
    async fn create(&self, booking: &Booking) -> StoreResult<()> {
        let passengers = i32::try_from(booking.number_of_passengers)
            .map_err(|_| StoreError::Backend("number_of_passengers out of range".to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO bookings (id, vehicle_id, passenger_id, number_of_passengers, pickup_lat, pickup_lng,
                                  dropoff_lat, dropoff_lng, status, fare_cents, created_at, updated_at,
                                  reservation_expires_at, is_expired)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(booking.id)
        .bind(booking.vehicle_id)
        .bind(&booking.passenger_id)
        .bind(passengers)
        .bind(booking.pickup.lat)
        .bind(booking.pickup.lng)
        .bind(booking.dropoff.lat)
        .bind(booking.dropoff.lng)
        .bind(booking.status.as_str())
        .bind(booking.fare_cents)
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .bind(booking.reservation_expires_at)
        .bind(booking.is_expired)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        Ok(())
    }

    async fn get(&self, booking_id: Uuid) -> StoreResult<Option<Booking>> {
        let sql = format!("SELECT {} FROM bookings WHERE id = $1", BOOKING_COLUMNS);
        let row: Option<BookingRow> = sqlx::query_as(&sql)
            .bind(booking_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;

        row.map(Booking::try_from).transpose()
    }

    async fn transition(
        &self,
        booking_id: Uuid,
        from: BookingStatus,
        to: BookingStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE bookings
            SET status = $1, updated_at = $2, is_expired = is_expired OR $3
            WHERE id = $4 AND status = $5
            "#,
        )
        .bind(to.as_str())
        .bind(at)
        .bind(to == BookingStatus::Expired)
        .bind(booking_id)
        .bind(from.as_str())
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        Ok(result.rows_affected() == 1)
    }

    async fn query(&self, vehicle_id: Uuid, status: BookingStatus) -> StoreResult<Vec<Booking>> {
        let sql = format!(
            "SELECT {} FROM bookings WHERE vehicle_id = $1 AND status = $2 ORDER BY created_at",
            BOOKING_COLUMNS
        );
        let rows: Vec<BookingRow> = sqlx::query_as(&sql)
            .bind(vehicle_id)
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;

        rows.into_iter().map(Booking::try_from).collect()
    }

    async fn vehicles_with_status(&self, status: BookingStatus) -> StoreResult<Vec<Uuid>> {
        let ids: Vec<(Uuid,)> = sqlx::query_as("SELECT DISTINCT vehicle_id FROM bookings WHERE status = $1")
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;

        Ok(ids.into_iter().map(|(id,)| id).collect())
    }
}
