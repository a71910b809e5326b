use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use ridetrack_core::{Booking, BookingStatus, CapacityRecord, GeoPoint, LocationUpdate, VehicleType};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct RegisterVehicleRequest {
    id: Option<Uuid>,
    vehicle_type: VehicleType,
    capacity: u32,
}

#[derive(Debug, Deserialize)]
struct StatusRequest {
    active: bool,
}

#[derive(Debug, Deserialize)]
struct LocationRequest {
    lat: f64,
    lng: f64,
    recorded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
struct LocationResponse {
    accepted: bool,
}

#[derive(Debug, Deserialize)]
struct PointQuery {
    lat: f64,
    lng: f64,
    radius_km: Option<f64>,
}

#[derive(Debug, Serialize)]
struct EtaResponse {
    vehicle_id: Uuid,
    distance_km: f64,
    eta_minutes: u32,
    reported_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct NearbyVehicle {
    vehicle_id: Uuid,
    distance_km: f64,
    available_seats: u32,
    is_active: bool,
}

#[derive(Debug, Deserialize)]
struct BookingFilter {
    status: Option<BookingStatus>,
}

#[derive(Debug, Serialize)]
struct SweepResponse {
    vehicle_id: Uuid,
    expired: usize,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/vehicles", post(register_vehicle))
        .route("/v1/vehicles/nearby", get(nearby_vehicles))
        .route("/v1/vehicles/{id}/status", put(set_status))
        .route("/v1/vehicles/{id}/location", post(report_location))
        .route("/v1/vehicles/{id}/eta", get(eta))
        .route("/v1/vehicles/{id}/bookings", get(list_bookings))
        .route("/v1/vehicles/{id}/sweep", post(sweep))
}

async fn register_vehicle(
    State(state): State<AppState>,
    Json(req): Json<RegisterVehicleRequest>,
) -> Result<(StatusCode, Json<CapacityRecord>), AppError> {
    let id = req.id.unwrap_or_else(Uuid::new_v4);
    let record = state.ledger.register(id, req.vehicle_type, req.capacity).await?;
    state.publish_seats(&record);
    Ok((StatusCode::CREATED, Json(record)))
}

async fn set_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<StatusRequest>,
) -> Result<Json<CapacityRecord>, AppError> {
    let record = state.ledger.set_active(id, req.active).await?;
    info!("Vehicle {} is now {}", id, if record.is_active { "online" } else { "offline" });
    state.publish_seats(&record);
    Ok(Json(record))
}

async fn report_location(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<LocationRequest>,
) -> Result<(StatusCode, Json<LocationResponse>), AppError> {
    // Unknown vehicles are not tracked.
    state.ledger.snapshot(id).await?;

    let accepted = state.tracker.record(LocationUpdate {
        vehicle_id: id,
        position: GeoPoint::new(req.lat, req.lng),
        recorded_at: req.recorded_at.unwrap_or_else(Utc::now),
    })?;
    Ok((StatusCode::ACCEPTED, Json(LocationResponse { accepted })))
}

async fn eta(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<PointQuery>,
) -> Result<Json<EtaResponse>, AppError> {
    let target = GeoPoint::new(query.lat, query.lng);
    let eta = state
        .tracker
        .eta_to(id, &target)?
        .ok_or_else(|| AppError::NotFoundError(format!("No location reported for vehicle {}", id)))?;

    Ok(Json(EtaResponse {
        vehicle_id: id,
        distance_km: eta.distance_km,
        eta_minutes: eta.minutes,
        reported_at: eta.reported_at,
    }))
}

/// Tracked vehicles around a point with their free seats, closest first.
async fn nearby_vehicles(
    State(state): State<AppState>,
    Query(query): Query<PointQuery>,
) -> Result<Json<Vec<NearbyVehicle>>, AppError> {
    let point = GeoPoint::new(query.lat, query.lng);
    let radius_km = query.radius_km.unwrap_or(state.tracking.nearby_radius_km);

    let mut found = Vec::new();
    for (vehicle_id, distance_km) in state.tracker.nearby(&point, radius_km)? {
        let seats = match state.ledger.snapshot(vehicle_id).await {
            Ok(seats) => seats,
            Err(e) => {
                warn!("Leaving vehicle {} out of nearby results: {}", vehicle_id, e);
                continue;
            }
        };
        found.push(NearbyVehicle {
            vehicle_id,
            distance_km,
            available_seats: seats.available(),
            is_active: seats.is_active,
        });
    }
    Ok(Json(found))
}

async fn list_bookings(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(filter): Query<BookingFilter>,
) -> Result<Json<Vec<Booking>>, AppError> {
    let status = filter.status.unwrap_or(BookingStatus::Pending);
    Ok(Json(state.reservations.list_bookings(id, status).await?))
}

async fn sweep(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<SweepResponse>, AppError> {
    let expired = state.reservations.expire_stale_bookings(id).await?;
    if expired > 0 {
        crate::bookings::publish_current_seats(&state, id).await;
    }
    Ok(Json(SweepResponse { vehicle_id: id, expired }))
}
