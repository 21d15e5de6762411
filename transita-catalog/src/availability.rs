use chrono::{DateTime, NaiveDate, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use transita_shared::models::{Schedule, SeatId};
use transita_shared::Clock;
use uuid::Uuid;

/// How many times a draft commit re-checks for outstanding holds before
/// surfacing a conflict.
const COMMIT_RETRIES: usize = 3;

#[derive(Debug, thiserror::Error)]
pub enum AvailabilityError {
    #[error("schedule not found: {0}")]
    ScheduleNotFound(Uuid),

    #[error("schedule {schedule_id} does not run on {date}")]
    DateNotScheduled { schedule_id: Uuid, date: NaiveDate },

    #[error("availability for past date {0} is immutable")]
    ImmutablePastDate(NaiveDate),

    #[error("seats not available: {}", format_seats(.0))]
    SeatUnavailable(Vec<SeatId>),

    #[error("invalid seat set: {0}")]
    Validation(String),

    #[error("availability changed concurrently, retries exhausted")]
    ConcurrencyConflict,
}

fn format_seats(seats: &[SeatId]) -> String {
    seats
        .iter()
        .map(|s| s.0.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Whether one availability template applies to every future date or
/// each date carries an independently supplied set.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AvailabilityMode {
    Global,
    PerDate,
}

/// The available/booked partition for one (schedule, date).
///
/// `booked` is always derived as universe minus available at write
/// time; seats under an active hold appear in neither set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeatAvailability {
    pub available: BTreeSet<SeatId>,
    pub booked: BTreeSet<SeatId>,
    pub version: u64,
}

impl SeatAvailability {
    fn full(universe: BTreeSet<SeatId>) -> Self {
        Self {
            available: universe,
            booked: BTreeSet::new(),
            version: 1,
        }
    }
}

/// A staged availability edit. Has no effect on the committed entry
/// (and therefore on reservations) until explicitly committed.
#[derive(Debug, Clone)]
struct AvailabilityDraft {
    available: BTreeSet<SeatId>,
    based_on_version: u64,
    staged_at: DateTime<Utc>,
}

/// Outcome of deleting a schedule that may carry historical dates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeleteOutcome {
    /// No past dates remained; the schedule was removed outright.
    Deleted,
    /// Future dates were removed; past dates and their splits are kept.
    PastRetained,
}

/// Maintains, per schedule and per calendar date, which seats are
/// available vs. booked, with two-phase (draft then commit) operator
/// edits and immutable past dates.
///
/// Entries live in a concurrent map keyed by (schedule id, date); each
/// write takes that one entry's guard, so writers are serialised per
/// key and unrelated schedules never contend.
pub struct AvailabilityManager {
    fleet: Arc<crate::fleet::FleetRegistry>,
    schedules: DashMap<Uuid, Schedule>,
    entries: DashMap<(Uuid, NaiveDate), SeatAvailability>,
    drafts: DashMap<(Uuid, NaiveDate), AvailabilityDraft>,
    clock: Arc<dyn Clock>,
}

impl AvailabilityManager {
    pub fn new(fleet: Arc<crate::fleet::FleetRegistry>, clock: Arc<dyn Clock>) -> Self {
        Self {
            fleet,
            schedules: DashMap::new(),
            entries: DashMap::new(),
            drafts: DashMap::new(),
            clock,
        }
    }

    pub fn fleet(&self) -> &crate::fleet::FleetRegistry {
        &self.fleet
    }

    /// Registers a schedule and seeds a full-universe availability
    /// entry for every date.
    pub fn create_schedule(&self, schedule: Schedule) -> Result<(), AvailabilityError> {
        let universe = self
            .fleet
            .seat_universe(&schedule.bus_id)
            .ok_or_else(|| AvailabilityError::Validation("unknown bus".to_string()))?;
        let today = self.clock.today();
        if let Some(past) = schedule.dates.iter().find(|d| **d < today) {
            return Err(AvailabilityError::ImmutablePastDate(*past));
        }
        for date in &schedule.dates {
            self.entries
                .insert((schedule.id, *date), SeatAvailability::full(universe.clone()));
        }
        tracing::info!(schedule_id = %schedule.id, dates = schedule.dates.len(), "schedule created");
        self.schedules.insert(schedule.id, schedule);
        Ok(())
    }

    pub fn schedule(&self, id: &Uuid) -> Option<Schedule> {
        self.schedules.get(id).map(|s| s.clone())
    }

    /// Replaces the schedule's date list. Past dates can be neither
    /// removed nor added; a date whose seats are under an active hold
    /// cannot be removed; a re-added future date resets to the default
    /// full-universe availability.
    pub fn set_schedule_dates(
        &self,
        schedule_id: Uuid,
        dates: BTreeSet<NaiveDate>,
    ) -> Result<(), AvailabilityError> {
        let today = self.clock.today();
        let mut schedule = self
            .schedules
            .get_mut(&schedule_id)
            .ok_or(AvailabilityError::ScheduleNotFound(schedule_id))?;

        let removed: Vec<NaiveDate> = schedule.dates.difference(&dates).copied().collect();
        let added: Vec<NaiveDate> = dates.difference(&schedule.dates).copied().collect();
        if let Some(past) = removed.iter().chain(added.iter()).find(|d| **d < today) {
            return Err(AvailabilityError::ImmutablePastDate(*past));
        }

        let universe = self
            .fleet
            .seat_universe(&schedule.bus_id)
            .ok_or_else(|| AvailabilityError::Validation("unknown bus".to_string()))?;
        for date in &removed {
            self.ensure_no_outstanding_holds(schedule_id, *date, universe.len())?;
        }

        for date in &removed {
            self.entries.remove(&(schedule_id, *date));
            self.drafts.remove(&(schedule_id, *date));
        }
        for date in &added {
            self.entries
                .insert((schedule_id, *date), SeatAvailability::full(universe.clone()));
        }
        schedule.dates = dates;
        Ok(())
    }

    /// Stages an availability edit for one date. Drafts are invisible
    /// to reservations until committed.
    pub fn stage(
        &self,
        schedule_id: Uuid,
        date: NaiveDate,
        available: BTreeSet<SeatId>,
    ) -> Result<(), AvailabilityError> {
        let schedule = self
            .schedules
            .get(&schedule_id)
            .ok_or(AvailabilityError::ScheduleNotFound(schedule_id))?;
        if !schedule.dates.contains(&date) {
            return Err(AvailabilityError::DateNotScheduled { schedule_id, date });
        }
        if date < self.clock.today() {
            return Err(AvailabilityError::ImmutablePastDate(date));
        }
        let universe = self
            .fleet
            .seat_universe(&schedule.bus_id)
            .ok_or_else(|| AvailabilityError::Validation("unknown bus".to_string()))?;
        if !available.is_subset(&universe) {
            return Err(AvailabilityError::Validation(
                "available set contains seats outside the bus layout".to_string(),
            ));
        }
        let based_on_version = self
            .entries
            .get(&(schedule_id, date))
            .map(|e| e.version)
            .unwrap_or(0);
        self.drafts.insert(
            (schedule_id, date),
            AvailabilityDraft {
                available,
                based_on_version,
                staged_at: self.clock.now(),
            },
        );
        Ok(())
    }

    /// Stages one template identically for every future date of the
    /// schedule (global mode).
    pub fn stage_global(
        &self,
        schedule_id: Uuid,
        available: BTreeSet<SeatId>,
    ) -> Result<usize, AvailabilityError> {
        let today = self.clock.today();
        let dates: Vec<NaiveDate> = self
            .schedules
            .get(&schedule_id)
            .ok_or(AvailabilityError::ScheduleNotFound(schedule_id))?
            .dates
            .iter()
            .copied()
            .filter(|d| *d >= today)
            .collect();
        for date in &dates {
            self.stage(schedule_id, *date, available.clone())?;
        }
        Ok(dates.len())
    }

    /// Commits the staged draft for one date. `booked` is derived as
    /// universe minus available at write time. Fails with
    /// `ConcurrencyConflict` if seats of that date remain under an
    /// active hold after a bounded number of re-checks; a committed
    /// rewrite never frees or books over a live hold.
    pub fn commit(&self, schedule_id: Uuid, date: NaiveDate) -> Result<u64, AvailabilityError> {
        let key = (schedule_id, date);
        let draft = self
            .drafts
            .get(&key)
            .map(|d| d.clone())
            .ok_or_else(|| AvailabilityError::Validation("no draft staged for this date".to_string()))?;
        let bus_id = self
            .schedules
            .get(&schedule_id)
            .ok_or(AvailabilityError::ScheduleNotFound(schedule_id))?
            .bus_id;
        let universe = self
            .fleet
            .seat_universe(&bus_id)
            .ok_or_else(|| AvailabilityError::Validation("unknown bus".to_string()))?;

        for attempt in 0.. {
            let mut entry = self
                .entries
                .get_mut(&key)
                .ok_or(AvailabilityError::DateNotScheduled { schedule_id, date })?;
            // Seats under an active hold are in neither set.
            let settled = entry.available.len() + entry.booked.len() == universe.len();
            if !settled {
                drop(entry);
                if attempt + 1 >= COMMIT_RETRIES {
                    tracing::warn!(
                        schedule_id = %schedule_id,
                        %date,
                        staged_at = %draft.staged_at,
                        "availability commit rejected, active holds outstanding"
                    );
                    return Err(AvailabilityError::ConcurrencyConflict);
                }
                std::thread::yield_now();
                continue;
            }
            if entry.version != draft.based_on_version {
                tracing::debug!(
                    schedule_id = %schedule_id,
                    %date,
                    staged_on = draft.based_on_version,
                    current = entry.version,
                    "committing over a newer availability version"
                );
            }
            entry.available = draft.available.clone();
            entry.booked = universe.difference(&draft.available).cloned().collect();
            entry.version += 1;
            let version = entry.version;
            drop(entry);
            self.drafts.remove(&key);
            return Ok(version);
        }
        unreachable!()
    }

    /// Commits every staged draft of the schedule, stopping at the
    /// first failure.
    pub fn commit_all(&self, schedule_id: Uuid) -> Result<usize, AvailabilityError> {
        let staged: Vec<NaiveDate> = self
            .drafts
            .iter()
            .filter(|e| e.key().0 == schedule_id)
            .map(|e| e.key().1)
            .collect();
        for date in &staged {
            self.commit(schedule_id, *date)?;
        }
        Ok(staged.len())
    }

    pub fn availability(
        &self,
        schedule_id: Uuid,
        date: NaiveDate,
    ) -> Result<SeatAvailability, AvailabilityError> {
        self.entries
            .get(&(schedule_id, date))
            .map(|e| e.clone())
            .ok_or(AvailabilityError::DateNotScheduled { schedule_id, date })
    }

    /// Deletes a schedule. Future dates and their availability are
    /// removed (refused while any of their seats is under an active
    /// hold); past dates are preserved for audit, and only when none
    /// remain is the schedule removed outright.
    pub fn delete_schedule(&self, schedule_id: Uuid) -> Result<DeleteOutcome, AvailabilityError> {
        let today = self.clock.today();
        let mut schedule = self
            .schedules
            .get_mut(&schedule_id)
            .ok_or(AvailabilityError::ScheduleNotFound(schedule_id))?;

        let (past, future): (BTreeSet<NaiveDate>, BTreeSet<NaiveDate>) =
            schedule.dates.iter().copied().partition(|d| *d < today);
        let universe_len = self
            .fleet
            .seat_universe(&schedule.bus_id)
            .map(|u| u.len())
            .ok_or_else(|| AvailabilityError::Validation("unknown bus".to_string()))?;
        for date in &future {
            self.ensure_no_outstanding_holds(schedule_id, *date, universe_len)?;
        }
        for date in &future {
            self.entries.remove(&(schedule_id, *date));
            self.drafts.remove(&(schedule_id, *date));
        }
        if past.is_empty() {
            drop(schedule);
            self.schedules.remove(&schedule_id);
            tracing::info!(%schedule_id, "schedule deleted");
            return Ok(DeleteOutcome::Deleted);
        }
        schedule.dates = past;
        tracing::info!(%schedule_id, "schedule rewritten to past dates only");
        Ok(DeleteOutcome::PastRetained)
    }

    /// Hold detection shared by commit and date removal: a held seat is
    /// in neither `available` nor `booked`, so a settled entry accounts
    /// for the whole universe. Re-checks a bounded number of times to
    /// let in-flight holds resolve.
    fn ensure_no_outstanding_holds(
        &self,
        schedule_id: Uuid,
        date: NaiveDate,
        universe_len: usize,
    ) -> Result<(), AvailabilityError> {
        for attempt in 0..COMMIT_RETRIES {
            let Some(entry) = self.entries.get(&(schedule_id, date)) else {
                return Ok(());
            };
            if entry.available.len() + entry.booked.len() == universe_len {
                return Ok(());
            }
            drop(entry);
            if attempt + 1 < COMMIT_RETRIES {
                std::thread::yield_now();
            }
        }
        tracing::warn!(
            %schedule_id,
            %date,
            "date removal rejected, active holds outstanding"
        );
        Err(AvailabilityError::ConcurrencyConflict)
    }

    // ------------------------------------------------------------------
    // Seat primitives used by the reservation core. Each takes the one
    // entry guard, checks, and mutates: atomic per (schedule, date).
    // ------------------------------------------------------------------

    /// All-or-nothing removal from `available`. If any requested seat
    /// is not available the whole call fails and nothing is taken.
    pub fn take_seats(
        &self,
        schedule_id: Uuid,
        date: NaiveDate,
        seats: &[SeatId],
    ) -> Result<u64, AvailabilityError> {
        let mut entry = self
            .entries
            .get_mut(&(schedule_id, date))
            .ok_or(AvailabilityError::DateNotScheduled { schedule_id, date })?;
        let contested: Vec<SeatId> = seats
            .iter()
            .filter(|s| !entry.available.contains(*s))
            .cloned()
            .collect();
        if !contested.is_empty() {
            return Err(AvailabilityError::SeatUnavailable(contested));
        }
        for seat in seats {
            entry.available.remove(seat);
        }
        entry.version += 1;
        Ok(entry.version)
    }

    /// Returns held seats to `available` (release or expiry).
    pub fn restore_seats(
        &self,
        schedule_id: Uuid,
        date: NaiveDate,
        seats: &[SeatId],
    ) -> Result<u64, AvailabilityError> {
        let mut entry = self
            .entries
            .get_mut(&(schedule_id, date))
            .ok_or(AvailabilityError::DateNotScheduled { schedule_id, date })?;
        for seat in seats {
            if !entry.booked.contains(seat) {
                entry.available.insert(seat.clone());
            }
        }
        entry.version += 1;
        Ok(entry.version)
    }

    /// Moves held seats into `booked` (confirmed sale).
    pub fn commit_seats(
        &self,
        schedule_id: Uuid,
        date: NaiveDate,
        seats: &[SeatId],
    ) -> Result<u64, AvailabilityError> {
        let mut entry = self
            .entries
            .get_mut(&(schedule_id, date))
            .ok_or(AvailabilityError::DateNotScheduled { schedule_id, date })?;
        for seat in seats {
            entry.available.remove(seat);
            entry.booked.insert(seat.clone());
        }
        entry.version += 1;
        Ok(entry.version)
    }

    /// Returns booked seats to `available` (refund path).
    pub fn release_booked(
        &self,
        schedule_id: Uuid,
        date: NaiveDate,
        seats: &[SeatId],
    ) -> Result<u64, AvailabilityError> {
        let mut entry = self
            .entries
            .get_mut(&(schedule_id, date))
            .ok_or(AvailabilityError::DateNotScheduled { schedule_id, date })?;
        for seat in seats {
            if entry.booked.remove(seat) {
                entry.available.insert(seat.clone());
            }
        }
        entry.version += 1;
        Ok(entry.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::SeatLayoutBuilder;
    use chrono::{Duration, TimeZone};
    use transita_shared::models::{LayoutKind, SeatType};
    use transita_shared::ManualClock;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn setup(dates: &[NaiveDate]) -> (Arc<AvailabilityManager>, Arc<ManualClock>, Uuid, Uuid) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap(),
        ));
        let fleet = Arc::new(crate::fleet::FleetRegistry::new());
        let mut builder = SeatLayoutBuilder::new();
        builder
            .generate_layout(2, LayoutKind::TwoByTwo, SeatType::Seater)
            .unwrap();
        let bus_id = fleet.register_bus(builder.into_bus("Night Liner", "TR-7"));

        let manager = Arc::new(AvailabilityManager::new(fleet, clock.clone()));
        let schedule = Schedule {
            id: Uuid::new_v4(),
            bus_id,
            route_id: Uuid::new_v4(),
            dates: dates.iter().copied().collect(),
            from_time: chrono::NaiveTime::from_hms_opt(21, 0, 0).unwrap(),
            to_time: chrono::NaiveTime::from_hms_opt(6, 30, 0).unwrap(),
            pickup_times: vec![],
            drop_times: vec![],
        };
        let schedule_id = schedule.id;
        manager.create_schedule(schedule).unwrap();
        (manager, clock, schedule_id, bus_id)
    }

    #[test]
    fn create_schedule_seeds_full_universe() {
        let d = date(2026, 3, 15);
        let (manager, _, schedule_id, _) = setup(&[d]);
        let entry = manager.availability(schedule_id, d).unwrap();
        assert_eq!(entry.available.len(), 8);
        assert!(entry.booked.is_empty());
    }

    #[test]
    fn draft_is_invisible_until_commit() {
        let d = date(2026, 3, 15);
        let (manager, _, schedule_id, _) = setup(&[d]);

        let keep: BTreeSet<SeatId> = [SeatId::from("1-1"), SeatId::from("1-2")].into();
        manager.stage(schedule_id, d, keep.clone()).unwrap();
        assert_eq!(manager.availability(schedule_id, d).unwrap().available.len(), 8);

        manager.commit(schedule_id, d).unwrap();
        let entry = manager.availability(schedule_id, d).unwrap();
        assert_eq!(entry.available, keep);
        // booked is derived as universe minus available.
        assert_eq!(entry.booked.len(), 6);
        assert!(entry.booked.contains(&SeatId::from("2-4")));
    }

    #[test]
    fn past_date_writes_are_rejected() {
        let d = date(2026, 3, 11);
        let (manager, clock, schedule_id, _) = setup(&[d]);
        clock.advance(Duration::days(5));

        let err = manager.stage(schedule_id, d, BTreeSet::new()).unwrap_err();
        assert!(matches!(err, AvailabilityError::ImmutablePastDate(_)));
    }

    #[test]
    fn stage_rejects_seats_outside_universe() {
        let d = date(2026, 3, 15);
        let (manager, _, schedule_id, _) = setup(&[d]);
        let err = manager
            .stage(schedule_id, d, [SeatId::from("9-9")].into())
            .unwrap_err();
        assert!(matches!(err, AvailabilityError::Validation(_)));
    }

    #[test]
    fn commit_conflicts_while_seats_are_held() {
        let d = date(2026, 3, 15);
        let (manager, _, schedule_id, _) = setup(&[d]);

        manager.stage(schedule_id, d, [SeatId::from("1-1")].into()).unwrap();
        // A hold takes seats out of both sets until it resolves.
        manager
            .take_seats(schedule_id, d, &[SeatId::from("1-3")])
            .unwrap();

        let err = manager.commit(schedule_id, d).unwrap_err();
        assert!(matches!(err, AvailabilityError::ConcurrencyConflict));
        // The hold resolves; the retained draft now commits.
        manager
            .restore_seats(schedule_id, d, &[SeatId::from("1-3")])
            .unwrap();
        manager.commit(schedule_id, d).unwrap();
    }

    #[test]
    fn global_mode_stages_every_future_date() {
        let d1 = date(2026, 3, 15);
        let d2 = date(2026, 3, 16);
        let (manager, _, schedule_id, _) = setup(&[d1, d2]);

        let keep: BTreeSet<SeatId> = [SeatId::from("1-1")].into();
        assert_eq!(manager.stage_global(schedule_id, keep.clone()).unwrap(), 2);
        assert_eq!(manager.commit_all(schedule_id).unwrap(), 2);
        assert_eq!(manager.availability(schedule_id, d2).unwrap().available, keep);
    }

    #[test]
    fn delete_preserves_past_dates() {
        let past = date(2026, 3, 12);
        let future = date(2026, 3, 20);
        let (manager, clock, schedule_id, _) = setup(&[past, future]);
        // Book a seat on the first date, then let it become history.
        manager.take_seats(schedule_id, past, &[SeatId::from("1-1")]).unwrap();
        manager.commit_seats(schedule_id, past, &[SeatId::from("1-1")]).unwrap();
        clock.advance(Duration::days(3));

        assert_eq!(
            manager.delete_schedule(schedule_id).unwrap(),
            DeleteOutcome::PastRetained
        );
        let kept = manager.availability(schedule_id, past).unwrap();
        assert!(kept.booked.contains(&SeatId::from("1-1")));
        assert!(manager.availability(schedule_id, future).is_err());

        // Once every date is history, deleting again still keeps the
        // audit record: past splits never leave the store.
        clock.advance(Duration::days(30));
        assert_eq!(
            manager.delete_schedule(schedule_id).unwrap(),
            DeleteOutcome::PastRetained
        );
        assert!(manager.schedule(&schedule_id).is_some());
        assert!(manager
            .availability(schedule_id, past)
            .unwrap()
            .booked
            .contains(&SeatId::from("1-1")));
    }

    #[test]
    fn date_removal_is_blocked_by_active_holds() {
        let d1 = date(2026, 3, 15);
        let d2 = date(2026, 3, 16);
        let (manager, _, schedule_id, _) = setup(&[d1, d2]);

        manager.take_seats(schedule_id, d2, &[SeatId::from("1-1")]).unwrap();
        let err = manager
            .set_schedule_dates(schedule_id, [d1].into())
            .unwrap_err();
        assert!(matches!(err, AvailabilityError::ConcurrencyConflict));

        // The rejected edit left the held date's entry untouched, so the
        // held seat still cannot be claimed twice.
        let entry = manager.availability(schedule_id, d2).unwrap();
        assert_eq!(entry.available.len(), 7);
        assert!(matches!(
            manager.take_seats(schedule_id, d2, &[SeatId::from("1-1")]),
            Err(AvailabilityError::SeatUnavailable(_))
        ));

        // Once the hold resolves the removal goes through.
        manager
            .restore_seats(schedule_id, d2, &[SeatId::from("1-1")])
            .unwrap();
        manager.set_schedule_dates(schedule_id, [d1].into()).unwrap();
        assert!(manager.availability(schedule_id, d2).is_err());
    }

    #[test]
    fn delete_is_blocked_by_active_holds() {
        let d = date(2026, 3, 15);
        let (manager, _, schedule_id, _) = setup(&[d]);

        manager.take_seats(schedule_id, d, &[SeatId::from("2-2")]).unwrap();
        assert!(matches!(
            manager.delete_schedule(schedule_id),
            Err(AvailabilityError::ConcurrencyConflict)
        ));
        assert!(manager.schedule(&schedule_id).is_some());

        manager
            .restore_seats(schedule_id, d, &[SeatId::from("2-2")])
            .unwrap();
        assert_eq!(
            manager.delete_schedule(schedule_id).unwrap(),
            DeleteOutcome::Deleted
        );
    }

    #[test]
    fn readded_date_resets_to_default() {
        let d1 = date(2026, 3, 15);
        let d2 = date(2026, 3, 16);
        let (manager, _, schedule_id, _) = setup(&[d1, d2]);

        manager.stage(schedule_id, d2, [SeatId::from("1-1")].into()).unwrap();
        manager.commit(schedule_id, d2).unwrap();

        // Remove d2, then add it back.
        manager
            .set_schedule_dates(schedule_id, [d1].into())
            .unwrap();
        manager
            .set_schedule_dates(schedule_id, [d1, d2].into())
            .unwrap();

        let entry = manager.availability(schedule_id, d2).unwrap();
        assert_eq!(entry.available.len(), 8);
    }
}
