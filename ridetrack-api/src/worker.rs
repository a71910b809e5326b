use ridetrack_booking::SweepSummary;
use ridetrack_core::BookingResult;
use std::time::Duration;
use tracing::{error, info};

use crate::bookings::publish_current_seats;
use crate::state::AppState;

/// Periodic reservation expiry for the whole fleet.
pub async fn start_expiry_worker(state: AppState, every: Duration) {
    info!("Expiry worker started, sweeping every {:?}", every);

    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        if let Err(e) = sweep_once(&state).await {
            error!("Expiry sweep failed: {}", e);
        }
    }
}

pub async fn sweep_once(state: &AppState) -> BookingResult<SweepSummary> {
    let summary = state.reservations.expire_all_stale().await?;
    if summary.expired > 0 {
        info!(
            "Expired {} reservations across {} vehicles",
            summary.expired,
            summary.vehicles.len()
        );
    }
    for vehicle_id in &summary.vehicles {
        publish_current_seats(state, *vehicle_id).await;
    }
    Ok(summary)
}
