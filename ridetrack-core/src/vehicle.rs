use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Vehicle class, selects the fare table.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum VehicleType {
    Bus,
    Minibus,
    Van,
}

impl VehicleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleType::Bus => "bus",
            VehicleType::Minibus => "minibus",
            VehicleType::Van => "van",
        }
    }
}

impl fmt::Display for VehicleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VehicleType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bus" => Ok(VehicleType::Bus),
            "minibus" => Ok(VehicleType::Minibus),
            "van" => Ok(VehicleType::Van),
            other => Err(format!("unknown vehicle type: {}", other)),
        }
    }
}

/// Seat counters for one vehicle.
///
/// `version` is the optimistic-concurrency token: stores only accept a write
/// whose expected version matches the stored one, and every committed write
/// carries `version + 1`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CapacityRecord {
    pub id: Uuid,
    pub vehicle_type: VehicleType,
    pub capacity: u32,
    pub online_booked_seats: u32,
    pub offline_occupied_seats: u32,
    pub available_seats: u32,
    pub is_active: bool,
    pub last_seat_update: DateTime<Utc>,
    pub version: u64,
}

impl CapacityRecord {
    pub fn new(id: Uuid, vehicle_type: VehicleType, capacity: u32, now: DateTime<Utc>) -> Self {
        Self {
            id,
            vehicle_type,
            capacity,
            online_booked_seats: 0,
            offline_occupied_seats: 0,
            available_seats: capacity,
            is_active: true,
            last_seat_update: now,
            version: 0,
        }
    }

    /// Seats held by app bookings and walk-ups combined.
    pub fn occupied(&self) -> u32 {
        self.online_booked_seats.saturating_add(self.offline_occupied_seats)
    }

    /// `max(0, capacity - online - offline)`.
    pub fn available(&self) -> u32 {
        self.capacity.saturating_sub(self.occupied())
    }

    pub fn can_accommodate(&self, passengers: u32) -> bool {
        self.available() >= passengers
    }

    pub fn is_full(&self) -> bool {
        self.occupied() >= self.capacity
    }

    /// Copy of this record with new counters, ready to be compare-and-swapped
    /// over `self`. The derived availability, timestamp and version move
    /// together with the counters.
    pub fn next(&self, online: u32, offline: u32, now: DateTime<Utc>) -> Self {
        let mut next = self.clone();
        next.online_booked_seats = online;
        next.offline_occupied_seats = offline;
        next.available_seats = next.available();
        next.last_seat_update = now;
        next.version = self.version + 1;
        next
    }
}
