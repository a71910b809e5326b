use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use ridetrack_core::BookingError;
use ridetrack_fleet::GeoError;
use serde_json::json;

#[derive(Debug)]
pub enum AppError {
    Booking(BookingError),
    ValidationError(String),
    NotFoundError(String),
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Booking(err) => {
                let status = match err {
                    BookingError::NotFound { .. } => StatusCode::NOT_FOUND,
                    BookingError::VehicleOffline(_)
                    | BookingError::InsufficientCapacity { .. }
                    | BookingError::CapacityExceeded { .. }
                    | BookingError::AlreadyCancelled(_)
                    | BookingError::BookingExpired(_)
                    | BookingError::InvalidTransition { .. } => StatusCode::CONFLICT,
                    BookingError::Conflict { .. } => StatusCode::SERVICE_UNAVAILABLE,
                    BookingError::NotPermitted(_) => StatusCode::FORBIDDEN,
                    BookingError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
                    BookingError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, err.code(), err.to_string())
            }
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, "invalid_request", msg.clone()),
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("Internal Server Error: {}", message);
            "Internal Server Error".to_string()
        } else {
            message
        };

        let body = if status == StatusCode::SERVICE_UNAVAILABLE {
            json!({ "error": message, "code": code, "retryable": true })
        } else {
            json!({ "error": message, "code": code })
        };

        (status, Json(body)).into_response()
    }
}

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        Self::Booking(err)
    }
}

impl From<GeoError> for AppError {
    fn from(err: GeoError) -> Self {
        Self::ValidationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ridetrack_core::StoreError;
    use uuid::Uuid;

    fn status_of(err: BookingError) -> StatusCode {
        AppError::from(err).into_response().status()
    }

    #[test]
    fn test_booking_errors_map_to_status_codes() {
        let id = Uuid::new_v4();
        assert_eq!(status_of(BookingError::booking_not_found(id)), StatusCode::NOT_FOUND);
        assert_eq!(status_of(BookingError::VehicleOffline(id)), StatusCode::CONFLICT);
        assert_eq!(
            status_of(BookingError::InsufficientCapacity { requested: 2, available: 1 }),
            StatusCode::CONFLICT
        );
        assert_eq!(status_of(BookingError::AlreadyCancelled(id)), StatusCode::CONFLICT);
        assert_eq!(status_of(BookingError::Conflict { attempts: 5 }), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(status_of(BookingError::NotPermitted("p-9".into())), StatusCode::FORBIDDEN);
        assert_eq!(status_of(BookingError::InvalidRequest("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_of(BookingError::Store(StoreError::Backend("down".into()))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    async fn body_of(err: AppError) -> serde_json::Value {
        let bytes = axum::body::to_bytes(err.into_response().into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_store_details_are_hidden() {
        let body = body_of(BookingError::Store(StoreError::Backend("password=hunter2".into())).into()).await;
        assert_eq!(body["error"], "Internal Server Error");
        assert_eq!(body["code"], "store_error");
    }

    #[tokio::test]
    async fn test_conflict_is_marked_retryable() {
        let body = body_of(BookingError::Conflict { attempts: 5 }.into()).await;
        assert_eq!(body["code"], "conflict");
        assert_eq!(body["retryable"], true);

        let body = body_of(BookingError::CapacityExceeded { occupied: 12, capacity: 12 }.into()).await;
        assert_eq!(body["code"], "capacity_exceeded");
        assert!(body.get("retryable").is_none());
    }
}
