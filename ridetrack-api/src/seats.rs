//! Driver seat endpoints and the live seat stream.

use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Json, Router,
};
use futures_util::stream::Stream;
use ridetrack_core::CapacityRecord;
use ridetrack_shared::RealtimeEvent;
use serde::Deserialize;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct SetCountRequest {
    count: i64,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/vehicles/{id}/seats", get(get_seats))
        .route(
            "/v1/vehicles/{id}/seats/offline",
            axum::routing::post(add_offline_passenger)
                .delete(remove_offline_passenger)
                .put(set_offline),
        )
        .route("/v1/vehicles/{id}/seats/online", axum::routing::put(set_online))
        .route("/v1/vehicles/{id}/seats/stream", get(seat_stream))
}

async fn get_seats(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<CapacityRecord>, AppError> {
    Ok(Json(state.ledger.snapshot(id).await?))
}

async fn add_offline_passenger(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CapacityRecord>, AppError> {
    let record = state.ledger.add_offline_passenger(id).await?;
    info!("Walk-up boarded vehicle {}: {} seats left", id, record.available_seats);
    state.publish_seats(&record);
    Ok(Json(record))
}

async fn remove_offline_passenger(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CapacityRecord>, AppError> {
    let record = state.ledger.remove_offline_passenger(id).await?;
    state.publish_seats(&record);
    Ok(Json(record))
}

async fn set_offline(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<SetCountRequest>,
) -> Result<Json<CapacityRecord>, AppError> {
    let record = state.ledger.set_offline(id, req.count).await?;
    state.publish_seats(&record);
    Ok(Json(record))
}

/// Manual correction of the app-booked count.
async fn set_online(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<SetCountRequest>,
) -> Result<Json<CapacityRecord>, AppError> {
    let record = state.ledger.set_online(id, req.count).await?;
    state.publish_seats(&record);
    Ok(Json(record))
}

/// Current counters first, then every committed change for this vehicle.
async fn seat_stream(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, AppError> {
    // Subscribe before reading so no change between the two is lost.
    let rx = state.sse_tx.subscribe();
    let current = state.ledger.snapshot(id).await?;

    let initial = tokio_stream::once(seats_event(&RealtimeEvent::Seats((&current).into())));
    let updates = BroadcastStream::new(rx).filter_map(move |result| match result {
        Ok(event @ RealtimeEvent::Seats(_)) if event.vehicle_id() == id => Some(seats_event(&event)),
        _ => None,
    });

    Ok(Sse::new(initial.chain(updates)).keep_alive(KeepAlive::default()))
}

fn seats_event(event: &RealtimeEvent) -> Result<Event, axum::Error> {
    Event::default().event("seats").json_data(event)
}
