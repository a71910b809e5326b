use ridetrack_core::{Booking, BookingStatus, CapacityRecord};
use uuid::Uuid;

pub const SEATS_TOPIC: &str = "vehicle.seats";
pub const BOOKINGS_TOPIC: &str = "booking.lifecycle";

/// Seat counters after a committed change, pushed to live dashboards.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
pub struct SeatsChangedEvent {
    pub vehicle_id: Uuid,
    pub capacity: u32,
    pub online_booked_seats: u32,
    pub offline_occupied_seats: u32,
    pub available_seats: u32,
    pub is_active: bool,
    pub changed_at: i64,
}

impl From<&CapacityRecord> for SeatsChangedEvent {
    fn from(record: &CapacityRecord) -> Self {
        Self {
            vehicle_id: record.id,
            capacity: record.capacity,
            online_booked_seats: record.online_booked_seats,
            offline_occupied_seats: record.offline_occupied_seats,
            available_seats: record.available(),
            is_active: record.is_active,
            changed_at: record.last_seat_update.timestamp(),
        }
    }
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
pub struct BookingEvent {
    pub booking_id: Uuid,
    pub vehicle_id: Uuid,
    pub passenger_id: String,
    pub number_of_passengers: u32,
    pub status: BookingStatus,
    pub timestamp: i64,
}

impl From<&Booking> for BookingEvent {
    fn from(booking: &Booking) -> Self {
        Self {
            booking_id: booking.id,
            vehicle_id: booking.vehicle_id,
            passenger_id: booking.passenger_id.clone(),
            number_of_passengers: booking.number_of_passengers,
            status: booking.status,
            timestamp: booking.updated_at.timestamp(),
        }
    }
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RealtimeEvent {
    Seats(SeatsChangedEvent),
    Booking(BookingEvent),
}

impl RealtimeEvent {
    pub fn topic(&self) -> &'static str {
        match self {
            RealtimeEvent::Seats(_) => SEATS_TOPIC,
            RealtimeEvent::Booking(_) => BOOKINGS_TOPIC,
        }
    }

    pub fn vehicle_id(&self) -> Uuid {
        match self {
            RealtimeEvent::Seats(e) => e.vehicle_id,
            RealtimeEvent::Booking(e) => e.vehicle_id,
        }
    }
}
