use ridetrack_core::{FareTable, RetryPolicy};
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub kafka: Option<KafkaConfig>,
    pub business_rules: BusinessRules,
    #[serde(default)]
    pub fares: FareTable,
    pub tracking: TrackingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BusinessRules {
    /// Reservation window for pending bookings.
    #[serde(default = "default_reservation_timeout")]
    pub reservation_timeout_seconds: u64,
    pub sweep_interval_seconds: u64,
    /// Sweep a vehicle's stale bookings before admitting a new one.
    #[serde(default = "default_true")]
    pub lazy_expiry: bool,
    #[serde(default)]
    pub retry: RetryPolicy,
}

fn default_reservation_timeout() -> u64 { 600 }

fn default_true() -> bool { true }

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// Everything in process memory; state is lost on restart.
    Memory,
    /// Seat counters in Redis, bookings in Postgres.
    RedisPostgres,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_seconds: u64,
}

fn default_max_connections() -> u32 { 5 }

fn default_acquire_timeout() -> u64 { 3 }

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KafkaConfig {
    pub brokers: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TrackingConfig {
    pub average_speed_kmh: f64,
    pub nearby_radius_km: f64,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            // Start off by merging in the "default" configuration file
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides, optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local overrides, not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // Eg. `RIDETRACK__SERVER__PORT=9000`
            .add_source(config::Environment::with_prefix("RIDETRACK").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFAULTS: &str = include_str!("../../config/default.toml");

    fn from_toml(raw: &str) -> Result<Config, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::from_str(raw, config::FileFormat::Toml))
            .build()?
            .try_deserialize()
    }

    #[test]
    fn test_default_file_deserializes() {
        let config = from_toml(DEFAULTS).unwrap();
        assert_eq!(config.business_rules.reservation_timeout_seconds, 600);
        assert!(config.business_rules.lazy_expiry);
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert!(config.fares.bus.per_km_cents > 0);
    }

    #[test]
    fn test_business_rule_defaults_apply() {
        let raw = r#"
            [server]
            port = 8080
            [storage]
            backend = "redis_postgres"
            [database]
            url = "postgres://localhost/ridetrack"
            [redis]
            url = "redis://127.0.0.1/"
            [business_rules]
            sweep_interval_seconds = 30
            [tracking]
            average_speed_kmh = 20.0
            nearby_radius_km = 1.5
        "#;
        let config = from_toml(raw).unwrap();
        assert_eq!(config.business_rules.reservation_timeout_seconds, 600);
        assert_eq!(config.business_rules.retry.max_attempts, 5);
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.fares, FareTable::default());
        assert!(config.kafka.is_none());
    }
}
