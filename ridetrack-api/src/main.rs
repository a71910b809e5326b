use anyhow::Context;
use ridetrack_api::{app, worker, AppState};
use ridetrack_core::{BookingStore, CapacityStore, SystemClock};
use ridetrack_store::app_config::{Config, StorageBackend};
use ridetrack_store::{DbClient, MemoryStore, PgBookingStore, RedisCapacityStore, RedisClient};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ridetrack_api=debug,ridetrack_booking=info,ridetrack_fleet=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Ridetrack API on port {} ({:?} storage)", config.server.port, config.storage.backend);

    let (capacity, bookings): (Arc<dyn CapacityStore>, Arc<dyn BookingStore>) = match config.storage.backend {
        StorageBackend::Memory => {
            let store = Arc::new(MemoryStore::new());
            (store.clone(), store)
        }
        StorageBackend::RedisPostgres => {
            let redis = RedisClient::new(&config.redis.url)
                .await
                .context("Failed to connect to Redis")?;
            let db = DbClient::new(&config.database)
                .await
                .context("Failed to connect to Postgres")?;
            db.migrate().await.context("Failed to run migrations")?;
            (
                Arc::new(RedisCapacityStore::new(redis)),
                Arc::new(PgBookingStore::new(db.pool.clone())),
            )
        }
    };

    let state = AppState::new(
        capacity,
        bookings,
        Arc::new(SystemClock),
        config.business_rules.clone(),
        config.fares.clone(),
        config.tracking.clone(),
    );

    #[cfg(feature = "kafka")]
    let state = match &config.kafka {
        Some(kafka) => state.with_kafka(
            ridetrack_store::EventProducer::new(&kafka.brokers).context("Failed to create Kafka producer")?,
        ),
        None => state,
    };

    if config.business_rules.sweep_interval_seconds > 0 {
        tokio::spawn(worker::start_expiry_worker(
            state.clone(),
            Duration::from_secs(config.business_rules.sweep_interval_seconds),
        ));
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(state)).await?;
    Ok(())
}
