use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use transita_shared::models::SeatId;
use uuid::Uuid;

/// Reservation lifecycle. Every transition out of `Active` is terminal;
/// exactly one of confirm, release or the expiry sweep wins.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationStatus {
    Active,
    Confirmed,
    Expired,
    Released,
}

impl ReservationStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ReservationStatus::Active)
    }
}

/// A time-boxed exclusive claim on a seat set for one (schedule, date).
/// Terminal reservations are retained for audit and never reused.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Uuid,
    pub schedule_id: Uuid,
    pub date: NaiveDate,
    pub bus_id: Uuid,
    pub seat_ids: Vec<SeatId>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub status: ReservationStatus,
    pub version: u64,
}

impl Reservation {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Server-side countdown; the sole source of truth a client may
    /// display.
    pub fn time_remaining(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_seconds().max(0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentState {
    Pending,
    Paid,
    Refunded,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Canceled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassengerInfo {
    pub name: String,
    pub email: String,
    pub phone: String,
}

/// Snapshot of route, time, seats and price taken at booking time,
/// immune to later route or schedule edits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketInfo {
    pub schedule_id: Uuid,
    pub bus_id: Uuid,
    pub route_from: String,
    pub route_to: String,
    pub pickup_point: String,
    pub drop_point: String,
    pub travel_date: NaiveDate,
    pub departure_time: NaiveTime,
    pub seat_ids: Vec<SeatId>,
    pub seat_numbers: Vec<String>,
    pub total_price: i32,
}

/// A durable booking record tying a reservation to a payment outcome.
/// Created once, then append-only: only status transitions mutate it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    /// Human-readable reference printed on the ticket.
    pub booking_id: String,
    /// Originating reservation, retained for audit even after the
    /// reservation reaches a terminal state.
    pub reservation_id: Uuid,
    pub passenger: PassengerInfo,
    pub ticket: TicketInfo,
    pub payment_status: PaymentState,
    pub status: BookingStatus,
    pub payment_reference: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn new(
        reservation_id: Uuid,
        passenger: PassengerInfo,
        ticket: TicketInfo,
        now: DateTime<Utc>,
    ) -> Self {
        let id = Uuid::new_v4();
        Self {
            id,
            booking_id: format!("TR-{}", &id.simple().to_string()[..8].to_uppercase()),
            reservation_id,
            passenger,
            ticket,
            payment_status: PaymentState::Pending,
            status: BookingStatus::Pending,
            payment_reference: None,
            created_at: now,
            updated_at: now,
        }
    }
}
