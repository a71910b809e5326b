pub mod expiry;
pub mod manager;

pub use expiry::SweepSummary;
pub use manager::{ReservationManager, ReservationSettings};
