use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Boarding or alighting time at a named point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointTime {
    pub point: String,
    pub time: NaiveTime,
}

/// A bus running a route on a set of calendar dates.
///
/// The per-date available/booked partition is owned by the availability
/// manager, keyed by (schedule id, date); the schedule only carries the
/// date list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub id: Uuid,
    pub bus_id: Uuid,
    pub route_id: Uuid,
    pub dates: BTreeSet<NaiveDate>,
    pub from_time: NaiveTime,
    pub to_time: NaiveTime,
    #[serde(default)]
    pub pickup_times: Vec<PointTime>,
    #[serde(default)]
    pub drop_times: Vec<PointTime>,
}
