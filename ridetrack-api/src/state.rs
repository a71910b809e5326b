use chrono::Duration;
use ridetrack_booking::{ReservationManager, ReservationSettings};
use ridetrack_core::{Booking, BookingStore, CapacityRecord, CapacityStore, Clock, FareTable};
use ridetrack_fleet::{CapacityLedger, FareEngine, VehicleTracker};
#[cfg(feature = "kafka")]
use ridetrack_store::EventProducer;
use ridetrack_store::app_config::{BusinessRules, TrackingConfig};
use ridetrack_shared::RealtimeEvent;
use std::sync::Arc;
use tokio::sync::broadcast;

const EVENT_BUFFER: usize = 256;

#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<CapacityLedger>,
    pub reservations: Arc<ReservationManager>,
    pub tracker: Arc<VehicleTracker>,
    pub sse_tx: broadcast::Sender<RealtimeEvent>,
    #[cfg(feature = "kafka")]
    pub kafka: Option<Arc<EventProducer>>,
    pub tracking: TrackingConfig,
}

impl AppState {
    pub fn new(
        capacity: Arc<dyn CapacityStore>,
        bookings: Arc<dyn BookingStore>,
        clock: Arc<dyn Clock>,
        business_rules: BusinessRules,
        fares: FareTable,
        tracking: TrackingConfig,
    ) -> Self {
        let ledger = Arc::new(CapacityLedger::new(capacity, clock.clone(), business_rules.retry.clone()));
        let settings = ReservationSettings {
            reservation_timeout: Duration::seconds(business_rules.reservation_timeout_seconds as i64),
            lazy_expiry: business_rules.lazy_expiry,
            retry: business_rules.retry.clone(),
        };
        let reservations = Arc::new(ReservationManager::new(
            ledger.clone(),
            bookings,
            FareEngine::new(fares),
            clock,
            settings,
        ));
        let (sse_tx, _) = broadcast::channel(EVENT_BUFFER);

        Self {
            ledger,
            reservations,
            tracker: Arc::new(VehicleTracker::new(tracking.average_speed_kmh)),
            sse_tx,
            #[cfg(feature = "kafka")]
            kafka: None,
            tracking,
        }
    }

    #[cfg(feature = "kafka")]
    pub fn with_kafka(mut self, producer: EventProducer) -> Self {
        self.kafka = Some(Arc::new(producer));
        self
    }

    /// Fan an event out to SSE subscribers and, when configured, Kafka.
    pub fn publish(&self, event: RealtimeEvent) {
        // Err only means nobody is listening right now.
        let _ = self.sse_tx.send(event.clone());

        #[cfg(feature = "kafka")]
        if let Some(kafka) = self.kafka.clone() {
            tokio::spawn(async move {
                if let Err(e) = kafka.publish_event(&event).await {
                    tracing::warn!("Kafka publish failed for vehicle {}: {}", event.vehicle_id(), e);
                }
            });
        }
    }

    pub fn publish_seats(&self, record: &CapacityRecord) {
        self.publish(RealtimeEvent::Seats(record.into()));
    }

    pub fn publish_booking(&self, booking: &Booking) {
        self.publish(RealtimeEvent::Booking(booking.into()));
    }
}
