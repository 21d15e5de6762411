use crate::models::{Reservation, ReservationStatus};
use chrono::{Duration, NaiveDate};
use dashmap::DashMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use transita_catalog::availability::{AvailabilityError, AvailabilityManager};
use transita_shared::models::SeatId;
use transita_shared::Clock;
use uuid::Uuid;

/// Default hold TTL: ten minutes of checkout time.
pub const DEFAULT_TTL_SECS: i64 = 600;

#[derive(Debug, thiserror::Error)]
pub enum ReservationError {
    #[error("seats no longer available: {}", .0.iter().map(|s| s.0.as_str()).collect::<Vec<_>>().join(", "))]
    SeatUnavailable(Vec<SeatId>),

    #[error("reservation not found: {0}")]
    NotFound(Uuid),

    #[error("reservation expired: {0}")]
    Expired(Uuid),

    #[error("invalid reservation request: {0}")]
    Validation(String),

    #[error(transparent)]
    Availability(#[from] AvailabilityError),
}

/// Status plus the server-side countdown returned to clients. Any
/// client-local timer is advisory and must reconcile against this.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ReservationView {
    pub status: ReservationStatus,
    pub time_remaining: i64,
}

/// Creates, confirms, releases and expires time-boxed exclusive seat
/// holds.
///
/// Seat allocation is first-committer-wins: the availability entry
/// guard makes check-and-take one atomic step, so of any set of
/// concurrent overlapping create calls exactly one succeeds and the
/// rest fail cleanly with nothing held. Transitions out of `Active`
/// are compare-and-set under the reservation's own entry guard, so of
/// confirm, release and the sweep exactly one wins per reservation.
pub struct ReservationManager {
    availability: Arc<AvailabilityManager>,
    reservations: DashMap<Uuid, Reservation>,
    clock: Arc<dyn Clock>,
    default_ttl: Duration,
}

impl ReservationManager {
    pub fn new(availability: Arc<AvailabilityManager>, clock: Arc<dyn Clock>) -> Self {
        Self::with_ttl(availability, clock, Duration::seconds(DEFAULT_TTL_SECS))
    }

    pub fn with_ttl(
        availability: Arc<AvailabilityManager>,
        clock: Arc<dyn Clock>,
        default_ttl: Duration,
    ) -> Self {
        Self {
            availability,
            reservations: DashMap::new(),
            clock,
            default_ttl,
        }
    }

    pub fn availability(&self) -> &AvailabilityManager {
        &self.availability
    }

    /// Atomically claims `seat_ids` for (schedule, date). All-or-
    /// nothing: if any requested seat is unavailable the whole call
    /// fails and no partial hold is created.
    pub fn create_reservation(
        &self,
        schedule_id: Uuid,
        date: NaiveDate,
        seat_ids: Vec<SeatId>,
        ttl: Option<Duration>,
    ) -> Result<Reservation, ReservationError> {
        if seat_ids.is_empty() {
            return Err(ReservationError::Validation(
                "seat set must not be empty".to_string(),
            ));
        }
        let unique: BTreeSet<&SeatId> = seat_ids.iter().collect();
        if unique.len() != seat_ids.len() {
            return Err(ReservationError::Validation(
                "seat set contains duplicates".to_string(),
            ));
        }

        let schedule = self
            .availability
            .schedule(&schedule_id)
            .ok_or(AvailabilityError::ScheduleNotFound(schedule_id))?;
        if date < self.clock.today() {
            return Err(ReservationError::Validation(
                "cannot reserve seats for a past date".to_string(),
            ));
        }
        let universe = self
            .availability
            .fleet()
            .seat_universe(&schedule.bus_id)
            .ok_or_else(|| ReservationError::Validation("unknown bus".to_string()))?;
        if let Some(outside) = seat_ids.iter().find(|s| !universe.contains(*s)) {
            return Err(ReservationError::Validation(format!(
                "seat {outside} is not part of the bus layout"
            )));
        }

        match self.availability.take_seats(schedule_id, date, &seat_ids) {
            Ok(_) => {}
            Err(AvailabilityError::SeatUnavailable(contested)) => {
                return Err(ReservationError::SeatUnavailable(contested))
            }
            Err(e) => return Err(e.into()),
        }

        let now = self.clock.now();
        let reservation = Reservation {
            id: Uuid::new_v4(),
            schedule_id,
            date,
            bus_id: schedule.bus_id,
            seat_ids,
            created_at: now,
            expires_at: now + ttl.unwrap_or(self.default_ttl),
            status: ReservationStatus::Active,
            version: 1,
        };
        // The seats are already out of `available`, so the window
        // between take and insert is invisible to other callers.
        self.reservations.insert(reservation.id, reservation.clone());
        tracing::info!(
            reservation_id = %reservation.id,
            %schedule_id,
            %date,
            seats = reservation.seat_ids.len(),
            expires_at = %reservation.expires_at,
            "reservation created"
        );
        Ok(reservation)
    }

    pub fn get(&self, id: Uuid) -> Option<Reservation> {
        self.reservations.get(&id).map(|r| r.clone())
    }

    pub fn view(&self, id: Uuid) -> Result<ReservationView, ReservationError> {
        let reservation = self
            .reservations
            .get(&id)
            .ok_or(ReservationError::NotFound(id))?;
        Ok(ReservationView {
            status: reservation.status,
            time_remaining: reservation.time_remaining(self.clock.now()),
        })
    }

    /// Moves an active hold's seats into `booked` and marks it
    /// confirmed. Idempotent: confirming an already-confirmed
    /// reservation returns the prior result without re-mutating state.
    /// A hold found past its TTL is opportunistically expired.
    pub fn confirm_reservation(&self, id: Uuid) -> Result<Reservation, ReservationError> {
        let now = self.clock.now();
        let mut entry = self
            .reservations
            .get_mut(&id)
            .ok_or(ReservationError::NotFound(id))?;
        match entry.status {
            ReservationStatus::Confirmed => return Ok(entry.clone()),
            ReservationStatus::Expired | ReservationStatus::Released => {
                return Err(ReservationError::Expired(id))
            }
            ReservationStatus::Active => {}
        }
        if entry.is_expired(now) {
            entry.status = ReservationStatus::Expired;
            entry.version += 1;
            let (schedule_id, date, seats) = (entry.schedule_id, entry.date, entry.seat_ids.clone());
            drop(entry);
            if let Err(e) = self.availability.restore_seats(schedule_id, date, &seats) {
                tracing::warn!(reservation_id = %id, error = %e, "failed to restore seats of expired hold");
            }
            return Err(ReservationError::Expired(id));
        }

        entry.status = ReservationStatus::Confirmed;
        entry.version += 1;
        let snapshot = entry.clone();
        drop(entry);
        self.availability
            .commit_seats(snapshot.schedule_id, snapshot.date, &snapshot.seat_ids)?;
        tracing::info!(reservation_id = %id, "reservation confirmed");
        Ok(snapshot)
    }

    /// Returns an active hold's seats to `available`. Idempotent:
    /// unknown ids and already-terminal reservations are no-op
    /// successes.
    pub fn release_reservation(&self, id: Uuid) -> Result<(), ReservationError> {
        let Some(mut entry) = self.reservations.get_mut(&id) else {
            return Ok(());
        };
        if entry.status != ReservationStatus::Active {
            return Ok(());
        }
        entry.status = ReservationStatus::Released;
        entry.version += 1;
        let (schedule_id, date, seats) = (entry.schedule_id, entry.date, entry.seat_ids.clone());
        drop(entry);
        self.availability.restore_seats(schedule_id, date, &seats)?;
        tracing::info!(reservation_id = %id, "reservation released");
        Ok(())
    }

    /// Transitions every active hold past its TTL to `Expired` and
    /// returns its seats. Safe to run concurrently with confirm and
    /// release racing on the same ids; the entry-guard compare-and-set
    /// lets exactly one caller win each. Returns the number expired.
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let due: Vec<Uuid> = self
            .reservations
            .iter()
            .filter(|r| r.status == ReservationStatus::Active && r.is_expired(now))
            .map(|r| r.id)
            .collect();

        let mut expired = 0;
        for id in due {
            let Some(mut entry) = self.reservations.get_mut(&id) else {
                continue;
            };
            // Re-check under the guard: confirm or release may have won.
            if entry.status != ReservationStatus::Active || !entry.is_expired(now) {
                continue;
            }
            entry.status = ReservationStatus::Expired;
            entry.version += 1;
            let (schedule_id, date, seats) = (entry.schedule_id, entry.date, entry.seat_ids.clone());
            drop(entry);
            if let Err(e) = self.availability.restore_seats(schedule_id, date, &seats) {
                tracing::warn!(reservation_id = %id, error = %e, "failed to restore seats of expired hold");
            }
            tracing::debug!(reservation_id = %id, "hold expired by sweep");
            expired += 1;
        }
        expired
    }
}
