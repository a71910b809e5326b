pub mod app_config;
pub mod booking_repo;
pub mod database;
#[cfg(feature = "kafka")]
pub mod events;
pub mod memory;
pub mod redis_repo;

pub use booking_repo::PgBookingStore;
pub use database::DbClient;
#[cfg(feature = "kafka")]
pub use events::EventProducer;
pub use memory::MemoryStore;
pub use redis_repo::{RedisCapacityStore, RedisClient};
