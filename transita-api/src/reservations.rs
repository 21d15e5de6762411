use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use transita_catalog::pricing;
use transita_order::models::{PassengerInfo, Reservation, TicketInfo};
use transita_order::reservation::ReservationView;
use transita_shared::models::{Seat, SeatId};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/reservations", post(create_reservation))
        .route(
            "/v1/reservations/{id}",
            get(get_reservation).delete(release_reservation),
        )
        .route("/v1/reservations/{id}/confirm", post(confirm_reservation))
}

#[derive(Debug, Deserialize)]
pub struct CreateReservationRequest {
    pub schedule_id: Uuid,
    pub date: NaiveDate,
    pub seat_ids: Vec<SeatId>,
    /// Optional override of the configured hold TTL.
    pub ttl_seconds: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct CreateReservationResponse {
    pub reservation_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

async fn create_reservation(
    State(state): State<AppState>,
    Json(req): Json<CreateReservationRequest>,
) -> Result<(StatusCode, Json<CreateReservationResponse>), AppError> {
    let ttl = match req.ttl_seconds {
        Some(secs) if secs <= 0 => {
            return Err(AppError::Validation(
                "ttl_seconds must be positive".to_string(),
            ))
        }
        Some(secs) => Some(chrono::Duration::seconds(secs)),
        None => None,
    };
    let reservation =
        state
            .reservations
            .create_reservation(req.schedule_id, req.date, req.seat_ids, ttl)?;
    Ok((
        StatusCode::CREATED,
        Json(CreateReservationResponse {
            reservation_id: reservation.id,
            expires_at: reservation.expires_at,
        }),
    ))
}

async fn get_reservation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ReservationView>, AppError> {
    Ok(Json(state.reservations.view(id)?))
}

async fn release_reservation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.reservations.release_reservation(id)?;
    Ok(StatusCode::OK)
}

#[derive(Debug, Deserialize)]
pub struct BookingDetailsRequest {
    pub passenger: PassengerInfo,
    pub pickup_point: String,
    pub drop_point: String,
}

#[derive(Debug, Serialize)]
pub struct ConfirmReservationResponse {
    pub booking_id: String,
}

/// Pay-later surface: confirms the hold and issues the booking without
/// a gateway session.
async fn confirm_reservation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<BookingDetailsRequest>,
) -> Result<Json<ConfirmReservationResponse>, AppError> {
    let reservation = state
        .reservations
        .get(id)
        .ok_or_else(|| AppError::NotFound(format!("reservation not found: {id}")))?;
    let ticket = build_ticket(&state, &reservation, &req.pickup_point, &req.drop_point)?;
    let booking = state.finalizer.confirm_direct(id, req.passenger, ticket)?;
    Ok(Json(ConfirmReservationResponse {
        booking_id: booking.booking_id,
    }))
}

/// Snapshots route, time, seats and price for the ticket. Taken before
/// confirmation so later route or schedule edits cannot change what the
/// passenger was sold.
pub(crate) fn build_ticket(
    state: &AppState,
    reservation: &Reservation,
    pickup_point: &str,
    drop_point: &str,
) -> Result<TicketInfo, AppError> {
    let schedule = state
        .availability
        .schedule(&reservation.schedule_id)
        .ok_or_else(|| {
            AppError::NotFound(format!("schedule not found: {}", reservation.schedule_id))
        })?;
    let route = state.fleet.route(&schedule.route_id).ok_or_else(|| {
        AppError::NotFound(format!("route not found: {}", schedule.route_id))
    })?;
    let bus = state.fleet.bus(&reservation.bus_id).ok_or_else(|| {
        AppError::NotFound(format!("bus not found: {}", reservation.bus_id))
    })?;

    if !route.pickup_points.iter().any(|p| p == pickup_point) {
        return Err(AppError::Validation(format!(
            "unknown pickup point: {pickup_point}"
        )));
    }
    if !route.drop_points.iter().any(|p| p == drop_point) {
        return Err(AppError::Validation(format!(
            "unknown drop point: {drop_point}"
        )));
    }

    let seats: Vec<&Seat> = reservation
        .seat_ids
        .iter()
        .map(|id| {
            bus.find_seat(id)
                .ok_or_else(|| AppError::Validation(format!("seat {id} not on bus layout")))
        })
        .collect::<Result<_, _>>()?;
    let total_price = pricing::quote(&route, pickup_point, drop_point, &seats);

    Ok(TicketInfo {
        schedule_id: reservation.schedule_id,
        bus_id: reservation.bus_id,
        route_from: route.from.clone(),
        route_to: route.to.clone(),
        pickup_point: pickup_point.to_string(),
        drop_point: drop_point.to_string(),
        travel_date: reservation.date,
        departure_time: schedule.from_time,
        seat_ids: reservation.seat_ids.clone(),
        seat_numbers: seats.iter().map(|s| s.seat_number.clone()).collect(),
        total_price,
    })
}
