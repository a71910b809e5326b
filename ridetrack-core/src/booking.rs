use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::location::GeoPoint;

/// Booking status in the lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
    Expired,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Completed => "completed",
            BookingStatus::Expired => "expired",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BookingStatus::Cancelled | BookingStatus::Completed | BookingStatus::Expired
        )
    }

    /// Statuses whose passengers are counted in `online_booked_seats`.
    pub fn holds_seats(&self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::Confirmed)
    }

    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Pending, Cancelled)
                | (Pending, Expired)
                | (Confirmed, Cancelled)
                | (Confirmed, Completed)
        )
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BookingStatus::Pending),
            "confirmed" => Ok(BookingStatus::Confirmed),
            "cancelled" => Ok(BookingStatus::Cancelled),
            "completed" => Ok(BookingStatus::Completed),
            "expired" => Ok(BookingStatus::Expired),
            other => Err(format!("unknown booking status: {}", other)),
        }
    }
}

/// Request to reserve seats on a vehicle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBooking {
    pub vehicle_id: Uuid,
    pub passenger_id: String,
    pub number_of_passengers: u32,
    pub pickup: GeoPoint,
    pub dropoff: GeoPoint,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Booking {
    pub id: Uuid,
    pub vehicle_id: Uuid,
    pub passenger_id: String,
    pub number_of_passengers: u32,
    pub pickup: GeoPoint,
    pub dropoff: GeoPoint,
    pub status: BookingStatus,
    pub fare_cents: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub reservation_expires_at: DateTime<Utc>,
    pub is_expired: bool,
}

impl Booking {
    /// A fresh reservation, pending until confirmed or expired.
    pub fn pending(request: NewBooking, fare_cents: i64, now: DateTime<Utc>, timeout: Duration) -> Self {
        Self {
            id: Uuid::new_v4(),
            vehicle_id: request.vehicle_id,
            passenger_id: request.passenger_id,
            number_of_passengers: request.number_of_passengers,
            pickup: request.pickup,
            dropoff: request.dropoff,
            status: BookingStatus::Pending,
            fare_cents: fare_cents.max(0),
            created_at: now,
            updated_at: now,
            reservation_expires_at: now + timeout,
            is_expired: false,
        }
    }

    /// Pending and past its reservation window at `now`.
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        self.status == BookingStatus::Pending && self.reservation_expires_at < now
    }

    /// Apply a status change locally, mirroring what stores persist.
    pub fn apply_status(&mut self, status: BookingStatus, at: DateTime<Utc>) {
        self.status = status;
        self.updated_at = at;
        if status == BookingStatus::Expired {
            self.is_expired = true;
        }
    }
}
