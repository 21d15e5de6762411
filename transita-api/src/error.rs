use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use transita_catalog::availability::AvailabilityError;
use transita_catalog::layout::LayoutError;
use transita_order::booking::BookingError;
use transita_order::reservation::ReservationError;

/// API-surface error. Domain errors map onto the taxonomy below;
/// everything unexpected falls through to the `Internal` catch-all.
#[derive(Debug)]
pub enum AppError {
    Validation(String),
    NotFound(String),
    SeatUnavailable(Vec<String>),
    Gone(String),
    Conflict(String),
    Internal(anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
            AppError::SeatUnavailable(seats) => (
                StatusCode::CONFLICT,
                json!({
                    "error": "seat no longer available, please re-select",
                    "seats": seats,
                }),
            ),
            AppError::Gone(msg) => (StatusCode::GONE, json!({ "error": msg })),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, json!({ "error": msg })),
            AppError::Internal(err) => {
                tracing::error!("Internal Server Error: {err:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Internal Server Error" }),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err)
    }
}

impl From<AvailabilityError> for AppError {
    fn from(err: AvailabilityError) -> Self {
        match err {
            AvailabilityError::ScheduleNotFound(_) | AvailabilityError::DateNotScheduled { .. } => {
                AppError::NotFound(err.to_string())
            }
            AvailabilityError::ImmutablePastDate(_) => AppError::Validation(err.to_string()),
            AvailabilityError::SeatUnavailable(seats) => {
                AppError::SeatUnavailable(seats.into_iter().map(|s| s.0).collect())
            }
            AvailabilityError::Validation(msg) => AppError::Validation(msg),
            AvailabilityError::ConcurrencyConflict => AppError::Conflict(err.to_string()),
        }
    }
}

impl From<ReservationError> for AppError {
    fn from(err: ReservationError) -> Self {
        match err {
            ReservationError::SeatUnavailable(seats) => {
                AppError::SeatUnavailable(seats.into_iter().map(|s| s.0).collect())
            }
            ReservationError::NotFound(_) => AppError::NotFound(err.to_string()),
            ReservationError::Expired(_) => {
                AppError::Gone("reservation expired, please restart checkout".to_string())
            }
            ReservationError::Validation(msg) => AppError::Validation(msg),
            ReservationError::Availability(inner) => inner.into(),
        }
    }
}

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        match err {
            BookingError::NotFound(_) | BookingError::UnknownReference(_) => {
                AppError::NotFound(err.to_string())
            }
            BookingError::InvalidTransition { .. } => AppError::Conflict(err.to_string()),
            BookingError::Reservation(inner) => inner.into(),
            BookingError::Payment(inner) => AppError::Internal(inner.into()),
        }
    }
}

impl From<LayoutError> for AppError {
    fn from(err: LayoutError) -> Self {
        AppError::Validation(err.to_string())
    }
}
