pub mod booking;
pub mod clock;
pub mod fare;
pub mod location;
pub mod repository;
pub mod retry;
pub mod vehicle;

pub use booking::{Booking, BookingStatus, NewBooking};
pub use clock::{Clock, ManualClock, SystemClock};
pub use fare::{FareRate, FareTable};
pub use location::{GeoPoint, LocationUpdate};
pub use repository::{BookingStore, CapacityStore, StoreError};
pub use retry::RetryPolicy;
pub use vehicle::{CapacityRecord, VehicleType};

use uuid::Uuid;

/// Errors reported to callers of the ledger and the reservation manager.
///
/// Every variant is surfaced to the immediate caller; none are swallowed.
#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("Vehicle {0} is not accepting bookings")]
    VehicleOffline(Uuid),

    #[error("Not enough seats: requested {requested}, available {available}")]
    InsufficientCapacity { requested: u32, available: u32 },

    #[error("Vehicle is full: {occupied} of {capacity} seats occupied")]
    CapacityExceeded { occupied: u32, capacity: u32 },

    #[error("Booking already cancelled: {0}")]
    AlreadyCancelled(Uuid),

    #[error("Booking reservation expired: {0}")]
    BookingExpired(Uuid),

    #[error("Invalid booking transition from {from} to {to}")]
    InvalidTransition { from: BookingStatus, to: BookingStatus },

    #[error("Requester {0} may not modify this booking")]
    NotPermitted(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Concurrent update lost after {attempts} attempts")]
    Conflict { attempts: usize },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl BookingError {
    pub fn vehicle_not_found(id: Uuid) -> Self {
        Self::NotFound { entity: "Vehicle", id }
    }

    pub fn booking_not_found(id: Uuid) -> Self {
        Self::NotFound { entity: "Booking", id }
    }

    /// Stable machine-readable code for API clients.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::VehicleOffline(_) => "vehicle_offline",
            Self::InsufficientCapacity { .. } => "insufficient_capacity",
            Self::CapacityExceeded { .. } => "capacity_exceeded",
            Self::AlreadyCancelled(_) => "already_cancelled",
            Self::BookingExpired(_) => "booking_expired",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::NotPermitted(_) => "not_permitted",
            Self::InvalidRequest(_) => "invalid_request",
            Self::Conflict { .. } => "conflict",
            Self::Store(_) => "store_error",
        }
    }
}

pub type BookingResult<T> = Result<T, BookingError>;
