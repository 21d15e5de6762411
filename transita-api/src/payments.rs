use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use transita_order::models::{Booking, PassengerInfo};
use transita_order::payment::PaymentOutcome;
use uuid::Uuid;

use crate::error::AppError;
use crate::reservations::build_ticket;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/payments/initiate", post(initiate_payment))
        .route("/v1/payments/callback", post(payment_callback))
        .route("/v1/bookings/{id}", get(get_booking))
        .route("/v1/bookings/{id}/refund", post(refund_booking))
}

#[derive(Debug, Deserialize)]
pub struct InitiatePaymentRequest {
    pub reservation_id: Uuid,
    pub passenger: PassengerInfo,
    pub pickup_point: String,
    pub drop_point: String,
}

#[derive(Debug, Serialize)]
pub struct InitiatePaymentResponse {
    pub booking_id: String,
    pub payment_url: String,
    pub reference: String,
    pub amount: i32,
}

async fn initiate_payment(
    State(state): State<AppState>,
    Json(req): Json<InitiatePaymentRequest>,
) -> Result<Json<InitiatePaymentResponse>, AppError> {
    let reservation = state.reservations.get(req.reservation_id).ok_or_else(|| {
        AppError::NotFound(format!("reservation not found: {}", req.reservation_id))
    })?;
    let ticket = build_ticket(&state, &reservation, &req.pickup_point, &req.drop_point)?;
    let (booking, session) = state
        .finalizer
        .initiate_payment(req.reservation_id, req.passenger, ticket)
        .await?;
    Ok(Json(InitiatePaymentResponse {
        booking_id: booking.booking_id,
        payment_url: session.payment_url,
        reference: session.reference,
        amount: session.amount,
    }))
}

#[derive(Debug, Deserialize)]
pub struct PaymentCallbackRequest {
    pub reference: String,
    pub outcome: PaymentOutcome,
}

/// Gateway webhook. Duplicate deliveries of the same reference resolve
/// to the same booking.
async fn payment_callback(
    State(state): State<AppState>,
    Json(req): Json<PaymentCallbackRequest>,
) -> Result<Json<Booking>, AppError> {
    let booking = state.finalizer.handle_callback(&req.reference, req.outcome)?;
    Ok(Json(booking))
}

async fn get_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    let booking = state
        .finalizer
        .get(id)
        .ok_or_else(|| AppError::NotFound(format!("booking not found: {id}")))?;
    Ok(Json(booking))
}

async fn refund_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    let booking = state.finalizer.refund(id)?;
    Ok(Json(booking))
}
