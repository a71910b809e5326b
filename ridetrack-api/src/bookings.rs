use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use ridetrack_core::{Booking, NewBooking};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct CancelRequest {
    passenger_id: String,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/bookings", post(create_booking))
        .route("/v1/bookings/{id}", get(get_booking))
        .route("/v1/bookings/{id}/cancel", post(cancel_booking))
        .route("/v1/bookings/{id}/confirm", post(confirm_booking))
        .route("/v1/bookings/{id}/complete", post(complete_booking))
}

async fn create_booking(
    State(state): State<AppState>,
    Json(req): Json<NewBooking>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    info!(
        "Booking request from {} for {} seat(s) on vehicle {}",
        req.passenger_id, req.number_of_passengers, req.vehicle_id
    );
    let booking = state.reservations.create_booking(req).await?;

    state.publish_booking(&booking);
    publish_current_seats(&state, booking.vehicle_id).await;
    Ok((StatusCode::CREATED, Json(booking)))
}

async fn get_booking(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.reservations.get_booking(id).await?))
}

async fn cancel_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<CancelRequest>,
) -> Result<Json<Booking>, AppError> {
    let booking = state.reservations.cancel_booking(id, &req.passenger_id).await?;

    state.publish_booking(&booking);
    publish_current_seats(&state, booking.vehicle_id).await;
    Ok(Json(booking))
}

async fn confirm_booking(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Booking>, AppError> {
    let booking = state.reservations.confirm_booking(id).await?;
    state.publish_booking(&booking);
    Ok(Json(booking))
}

async fn complete_booking(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Booking>, AppError> {
    let booking = state.reservations.complete_booking(id).await?;
    state.publish_booking(&booking);
    Ok(Json(booking))
}

/// Push the vehicle's seat counters after a booking changed them.
pub(crate) async fn publish_current_seats(state: &AppState, vehicle_id: Uuid) {
    match state.ledger.snapshot(vehicle_id).await {
        Ok(record) => state.publish_seats(&record),
        Err(e) => tracing::warn!("Could not read seats for vehicle {} after update: {}", vehicle_id, e),
    }
}
