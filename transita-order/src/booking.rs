use crate::models::{Booking, BookingStatus, PassengerInfo, PaymentState, ReservationStatus, TicketInfo};
use crate::payment::{PaymentError, PaymentGateway, PaymentOutcome, PaymentSession};
use crate::reservation::{ReservationError, ReservationManager};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use transita_shared::Clock;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("booking not found: {0}")]
    NotFound(Uuid),

    #[error("unknown payment reference: {0}")]
    UnknownReference(String),

    #[error("invalid booking transition from {from:?}")]
    InvalidTransition { from: BookingStatus },

    #[error(transparent)]
    Reservation(#[from] ReservationError),

    #[error(transparent)]
    Payment(#[from] PaymentError),
}

/// Turns a confirmed reservation plus a successful payment callback
/// into a durable booking record.
///
/// A pending booking exists only after a successful gateway initiation
/// that references a still-active reservation; it confirms on the
/// success callback and is reconciled to canceled once its reservation
/// independently expires. Lookups go through the reservation-id index
/// before any creation, so duplicate callbacks never produce a second
/// booking.
pub struct BookingFinalizer {
    reservations: Arc<ReservationManager>,
    gateway: Arc<dyn PaymentGateway>,
    bookings: DashMap<Uuid, Booking>,
    by_reservation: DashMap<Uuid, Uuid>,
    by_reference: DashMap<String, Uuid>,
    clock: Arc<dyn Clock>,
}

impl BookingFinalizer {
    pub fn new(
        reservations: Arc<ReservationManager>,
        gateway: Arc<dyn PaymentGateway>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            reservations,
            gateway,
            bookings: DashMap::new(),
            by_reservation: DashMap::new(),
            by_reference: DashMap::new(),
            clock,
        }
    }

    pub fn get(&self, id: Uuid) -> Option<Booking> {
        self.bookings.get(&id).map(|b| b.clone())
    }

    pub fn booking_for_reservation(&self, reservation_id: Uuid) -> Option<Booking> {
        let id = *self.by_reservation.get(&reservation_id)?;
        self.get(id)
    }

    /// Opens a gateway session for a still-active reservation and
    /// creates the pending booking. Re-initiating for the same
    /// reservation reuses the booking with a fresh session.
    pub async fn initiate_payment(
        &self,
        reservation_id: Uuid,
        passenger: PassengerInfo,
        ticket: TicketInfo,
    ) -> Result<(Booking, PaymentSession), BookingError> {
        let reservation = self
            .reservations
            .get(reservation_id)
            .ok_or(ReservationError::NotFound(reservation_id))?;
        if reservation.status != ReservationStatus::Active
            || reservation.is_expired(self.clock.now())
        {
            return Err(ReservationError::Expired(reservation_id).into());
        }

        let session = self
            .gateway
            .initiate(ticket.total_price, reservation_id)
            .await?;
        let now = self.clock.now();

        let booking = match self.by_reservation.entry(reservation_id) {
            Entry::Occupied(existing) => {
                let id = *existing.get();
                drop(existing);
                let mut booking = self.bookings.get_mut(&id).ok_or(BookingError::NotFound(id))?;
                booking.payment_reference = Some(session.reference.clone());
                booking.updated_at = now;
                booking.clone()
            }
            Entry::Vacant(slot) => {
                let mut booking = Booking::new(reservation_id, passenger, ticket, now);
                booking.payment_reference = Some(session.reference.clone());
                self.bookings.insert(booking.id, booking.clone());
                slot.insert(booking.id);
                tracing::info!(
                    booking_id = %booking.booking_id,
                    %reservation_id,
                    "pending booking created"
                );
                booking
            }
        };
        self.by_reference.insert(session.reference.clone(), booking.id);
        Ok((booking, session))
    }

    /// Gateway webhook entry point: resolves the session reference and
    /// applies the reported outcome.
    pub fn handle_callback(
        &self,
        reference: &str,
        outcome: PaymentOutcome,
    ) -> Result<Booking, BookingError> {
        let booking_id = *self
            .by_reference
            .get(reference)
            .ok_or_else(|| BookingError::UnknownReference(reference.to_string()))?;
        match outcome {
            PaymentOutcome::Succeeded => self.confirm_booking(booking_id),
            PaymentOutcome::Failed => self.cancel_pending(booking_id),
        }
    }

    /// Confirms the booking via its reservation. Idempotent: duplicate
    /// success callbacks return the already-confirmed booking without
    /// re-mutating seat state.
    pub fn confirm_booking(&self, booking_id: Uuid) -> Result<Booking, BookingError> {
        let reservation_id = {
            let booking = self
                .bookings
                .get(&booking_id)
                .ok_or(BookingError::NotFound(booking_id))?;
            match booking.status {
                BookingStatus::Confirmed => return Ok(booking.clone()),
                BookingStatus::Canceled => {
                    return Err(BookingError::InvalidTransition {
                        from: BookingStatus::Canceled,
                    })
                }
                BookingStatus::Pending => booking.reservation_id,
            }
        };

        match self.reservations.confirm_reservation(reservation_id) {
            Ok(_) => {
                let mut booking = self
                    .bookings
                    .get_mut(&booking_id)
                    .ok_or(BookingError::NotFound(booking_id))?;
                booking.status = BookingStatus::Confirmed;
                booking.payment_status = PaymentState::Paid;
                booking.updated_at = self.clock.now();
                tracing::info!(booking_id = %booking.booking_id, "booking confirmed");
                Ok(booking.clone())
            }
            Err(ReservationError::Expired(_)) => {
                // The hold lapsed before the callback arrived.
                if let Some(mut booking) = self.bookings.get_mut(&booking_id) {
                    if booking.status == BookingStatus::Pending {
                        booking.status = BookingStatus::Canceled;
                        booking.updated_at = self.clock.now();
                    }
                }
                Err(ReservationError::Expired(reservation_id).into())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Direct confirmation surface: creates the booking on the spot if
    /// payment initiation never went through this finalizer. The
    /// reservation-id index is consulted first, so repeats return the
    /// same booking.
    pub fn confirm_direct(
        &self,
        reservation_id: Uuid,
        passenger: PassengerInfo,
        ticket: TicketInfo,
    ) -> Result<Booking, BookingError> {
        if let Some(id) = self.by_reservation.get(&reservation_id).map(|e| *e) {
            return self.confirm_booking(id);
        }
        self.reservations.confirm_reservation(reservation_id)?;

        let now = self.clock.now();
        let mut booking = Booking::new(reservation_id, passenger, ticket, now);
        booking.status = BookingStatus::Confirmed;
        booking.payment_status = PaymentState::Paid;
        match self.by_reservation.entry(reservation_id) {
            Entry::Occupied(existing) => {
                // Lost the creation race; the winner's record stands.
                let id = *existing.get();
                drop(existing);
                self.get(id).ok_or(BookingError::NotFound(id))
            }
            Entry::Vacant(slot) => {
                self.bookings.insert(booking.id, booking.clone());
                slot.insert(booking.id);
                tracing::info!(booking_id = %booking.booking_id, %reservation_id, "booking confirmed directly");
                Ok(booking)
            }
        }
    }

    fn cancel_pending(&self, booking_id: Uuid) -> Result<Booking, BookingError> {
        let mut booking = self
            .bookings
            .get_mut(&booking_id)
            .ok_or(BookingError::NotFound(booking_id))?;
        if booking.status == BookingStatus::Pending {
            booking.status = BookingStatus::Canceled;
            booking.updated_at = self.clock.now();
        }
        let (reservation_id, snapshot) = (booking.reservation_id, booking.clone());
        drop(booking);
        self.reservations.release_reservation(reservation_id)?;
        tracing::info!(booking_id = %snapshot.booking_id, "booking canceled after failed payment");
        Ok(snapshot)
    }

    /// Reconciles pending bookings whose reservation reached a terminal
    /// non-confirmed state (the abandoned-checkout path). Returns the
    /// number canceled.
    pub fn reconcile_expired(&self) -> usize {
        let pending: Vec<Uuid> = self
            .bookings
            .iter()
            .filter(|b| b.status == BookingStatus::Pending)
            .map(|b| b.id)
            .collect();

        let mut canceled = 0;
        for id in pending {
            let Some(mut booking) = self.bookings.get_mut(&id) else {
                continue;
            };
            if booking.status != BookingStatus::Pending {
                continue;
            }
            let lapsed = self
                .reservations
                .get(booking.reservation_id)
                .map(|r| {
                    matches!(
                        r.status,
                        ReservationStatus::Expired | ReservationStatus::Released
                    )
                })
                .unwrap_or(false);
            if lapsed {
                booking.status = BookingStatus::Canceled;
                booking.updated_at = self.clock.now();
                tracing::info!(booking_id = %booking.booking_id, "pending booking reconciled to canceled");
                canceled += 1;
            }
        }
        canceled
    }

    /// Refund path: Confirmed -> Canceled, returning the booked seats
    /// to `available`.
    pub fn refund(&self, booking_id: Uuid) -> Result<Booking, BookingError> {
        let mut booking = self
            .bookings
            .get_mut(&booking_id)
            .ok_or(BookingError::NotFound(booking_id))?;
        if booking.status != BookingStatus::Confirmed {
            return Err(BookingError::InvalidTransition {
                from: booking.status,
            });
        }
        booking.status = BookingStatus::Canceled;
        booking.payment_status = PaymentState::Refunded;
        booking.updated_at = self.clock.now();
        let snapshot = booking.clone();
        drop(booking);
        self.reservations
            .availability()
            .release_booked(
                snapshot.ticket.schedule_id,
                snapshot.ticket.travel_date,
                &snapshot.ticket.seat_ids,
            )
            .map_err(ReservationError::Availability)?;
        tracing::info!(booking_id = %snapshot.booking_id, "booking refunded");
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payment::SandboxGateway;
    use crate::reservation::DEFAULT_TTL_SECS;
    use chrono::{Duration, NaiveDate, TimeZone, Utc};
    use transita_catalog::availability::AvailabilityManager;
    use transita_catalog::fleet::FleetRegistry;
    use transita_catalog::layout::SeatLayoutBuilder;
    use transita_shared::models::{LayoutKind, Schedule, SeatId, SeatType};
    use transita_shared::ManualClock;

    struct Fixture {
        finalizer: Arc<BookingFinalizer>,
        reservations: Arc<ReservationManager>,
        clock: Arc<ManualClock>,
        schedule_id: Uuid,
        bus_id: Uuid,
    }

    fn travel_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 15).unwrap()
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap(),
        ));
        let fleet = Arc::new(FleetRegistry::new());
        let mut builder = SeatLayoutBuilder::new();
        builder
            .generate_layout(2, LayoutKind::TwoByTwo, SeatType::Seater)
            .unwrap();
        let bus_id = fleet.register_bus(builder.into_bus("Night Liner", "TR-7"));

        let availability = Arc::new(AvailabilityManager::new(fleet, clock.clone()));
        let schedule = Schedule {
            id: Uuid::new_v4(),
            bus_id,
            route_id: Uuid::new_v4(),
            dates: [travel_date()].into(),
            from_time: chrono::NaiveTime::from_hms_opt(21, 0, 0).unwrap(),
            to_time: chrono::NaiveTime::from_hms_opt(6, 30, 0).unwrap(),
            pickup_times: vec![],
            drop_times: vec![],
        };
        let schedule_id = schedule.id;
        availability.create_schedule(schedule).unwrap();
        let reservations = Arc::new(ReservationManager::new(availability, clock.clone()));
        let finalizer = Arc::new(BookingFinalizer::new(
            reservations.clone(),
            Arc::new(SandboxGateway::new("https://pay.example")),
            clock.clone(),
        ));
        Fixture {
            finalizer,
            reservations,
            clock,
            schedule_id,
            bus_id,
        }
    }

    fn passenger() -> PassengerInfo {
        PassengerInfo {
            name: "Ada Chen".to_string(),
            email: "ada@example.com".to_string(),
            phone: "+1-555-0100".to_string(),
        }
    }

    fn ticket(fx: &Fixture, seat_ids: &[SeatId]) -> TicketInfo {
        TicketInfo {
            schedule_id: fx.schedule_id,
            bus_id: fx.bus_id,
            route_from: "Hilltown".to_string(),
            route_to: "Baytown".to_string(),
            pickup_point: "Hilltown Central".to_string(),
            drop_point: "Baytown Central".to_string(),
            travel_date: travel_date(),
            departure_time: chrono::NaiveTime::from_hms_opt(21, 0, 0).unwrap(),
            seat_ids: seat_ids.to_vec(),
            seat_numbers: vec!["01".to_string()],
            total_price: 700,
        }
    }

    fn hold(fx: &Fixture, ids: &[&str]) -> crate::models::Reservation {
        fx.reservations
            .create_reservation(
                fx.schedule_id,
                travel_date(),
                ids.iter().map(|s| SeatId::from(*s)).collect(),
                None,
            )
            .unwrap()
    }

    #[tokio::test]
    async fn success_callback_confirms_booking_and_seats() {
        let fx = fixture();
        let reservation = hold(&fx, &["1-1"]);
        let (booking, session) = fx
            .finalizer
            .initiate_payment(reservation.id, passenger(), ticket(&fx, &reservation.seat_ids))
            .await
            .unwrap();
        assert_eq!(booking.status, BookingStatus::Pending);
        assert!(session.payment_url.contains(&session.reference));

        let confirmed = fx
            .finalizer
            .handle_callback(&session.reference, PaymentOutcome::Succeeded)
            .unwrap();
        assert_eq!(confirmed.status, BookingStatus::Confirmed);
        assert_eq!(confirmed.payment_status, PaymentState::Paid);

        let entry = fx
            .reservations
            .availability()
            .availability(fx.schedule_id, travel_date())
            .unwrap();
        assert!(entry.booked.contains(&SeatId::from("1-1")));
    }

    #[tokio::test]
    async fn duplicate_success_callbacks_are_idempotent() {
        let fx = fixture();
        let reservation = hold(&fx, &["1-1", "1-2"]);
        let (_, session) = fx
            .finalizer
            .initiate_payment(reservation.id, passenger(), ticket(&fx, &reservation.seat_ids))
            .await
            .unwrap();

        let first = fx
            .finalizer
            .handle_callback(&session.reference, PaymentOutcome::Succeeded)
            .unwrap();
        let booked_before = fx
            .reservations
            .availability()
            .availability(fx.schedule_id, travel_date())
            .unwrap()
            .booked;

        let second = fx
            .finalizer
            .handle_callback(&session.reference, PaymentOutcome::Succeeded)
            .unwrap();
        assert_eq!(first.booking_id, second.booking_id);
        assert_eq!(first.id, second.id);

        let booked_after = fx
            .reservations
            .availability()
            .availability(fx.schedule_id, travel_date())
            .unwrap()
            .booked;
        assert_eq!(booked_before, booked_after);
    }

    #[tokio::test]
    async fn abandoned_checkout_reconciles_to_canceled() {
        let fx = fixture();
        let reservation = hold(&fx, &["2-1"]);
        let (booking, _) = fx
            .finalizer
            .initiate_payment(reservation.id, passenger(), ticket(&fx, &reservation.seat_ids))
            .await
            .unwrap();

        // No callback arrives; the hold lapses and the sweep reclaims it.
        fx.clock.advance(Duration::seconds(DEFAULT_TTL_SECS + 1));
        assert_eq!(fx.reservations.sweep_expired(), 1);
        assert_eq!(fx.finalizer.reconcile_expired(), 1);

        let booking = fx.finalizer.get(booking.id).unwrap();
        assert_eq!(booking.status, BookingStatus::Canceled);
        assert_eq!(booking.payment_status, PaymentState::Pending);

        let entry = fx
            .reservations
            .availability()
            .availability(fx.schedule_id, travel_date())
            .unwrap();
        assert!(entry.available.contains(&SeatId::from("2-1")));
    }

    #[tokio::test]
    async fn late_success_callback_after_expiry_cancels() {
        let fx = fixture();
        let reservation = hold(&fx, &["2-2"]);
        let (booking, session) = fx
            .finalizer
            .initiate_payment(reservation.id, passenger(), ticket(&fx, &reservation.seat_ids))
            .await
            .unwrap();

        fx.clock.advance(Duration::seconds(DEFAULT_TTL_SECS + 1));
        fx.reservations.sweep_expired();

        let err = fx
            .finalizer
            .handle_callback(&session.reference, PaymentOutcome::Succeeded)
            .unwrap_err();
        assert!(matches!(
            err,
            BookingError::Reservation(ReservationError::Expired(_))
        ));
        assert_eq!(fx.finalizer.get(booking.id).unwrap().status, BookingStatus::Canceled);
    }

    #[tokio::test]
    async fn failed_callback_cancels_and_releases_seats() {
        let fx = fixture();
        let reservation = hold(&fx, &["1-3"]);
        let (booking, session) = fx
            .finalizer
            .initiate_payment(reservation.id, passenger(), ticket(&fx, &reservation.seat_ids))
            .await
            .unwrap();

        let canceled = fx
            .finalizer
            .handle_callback(&session.reference, PaymentOutcome::Failed)
            .unwrap();
        assert_eq!(canceled.id, booking.id);
        assert_eq!(canceled.status, BookingStatus::Canceled);

        let entry = fx
            .reservations
            .availability()
            .availability(fx.schedule_id, travel_date())
            .unwrap();
        assert!(entry.available.contains(&SeatId::from("1-3")));
    }

    #[tokio::test]
    async fn refund_returns_booked_seats() {
        let fx = fixture();
        let reservation = hold(&fx, &["1-4"]);
        let booking = fx
            .finalizer
            .confirm_direct(reservation.id, passenger(), ticket(&fx, &reservation.seat_ids))
            .unwrap();
        assert_eq!(booking.status, BookingStatus::Confirmed);

        let refunded = fx.finalizer.refund(booking.id).unwrap();
        assert_eq!(refunded.status, BookingStatus::Canceled);
        assert_eq!(refunded.payment_status, PaymentState::Refunded);

        let entry = fx
            .reservations
            .availability()
            .availability(fx.schedule_id, travel_date())
            .unwrap();
        assert!(entry.available.contains(&SeatId::from("1-4")));
        assert!(!entry.booked.contains(&SeatId::from("1-4")));

        // A second refund is an invalid transition.
        assert!(matches!(
            fx.finalizer.refund(booking.id),
            Err(BookingError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn confirm_direct_is_idempotent_by_reservation() {
        let fx = fixture();
        let reservation = hold(&fx, &["2-3"]);
        let first = fx
            .finalizer
            .confirm_direct(reservation.id, passenger(), ticket(&fx, &reservation.seat_ids))
            .unwrap();
        let second = fx
            .finalizer
            .confirm_direct(reservation.id, passenger(), ticket(&fx, &reservation.seat_ids))
            .unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.booking_id, second.booking_id);
    }

    #[tokio::test]
    async fn initiate_rejects_expired_reservation() {
        let fx = fixture();
        let reservation = hold(&fx, &["2-4"]);
        fx.clock.advance(Duration::seconds(DEFAULT_TTL_SECS + 1));

        let err = fx
            .finalizer
            .initiate_payment(reservation.id, passenger(), ticket(&fx, &reservation.seat_ids))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BookingError::Reservation(ReservationError::Expired(_))
        ));
    }
}
