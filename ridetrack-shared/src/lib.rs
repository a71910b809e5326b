pub mod models;

pub use models::events::{BookingEvent, RealtimeEvent, SeatsChangedEvent};
