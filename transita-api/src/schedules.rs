use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use transita_catalog::availability::{AvailabilityMode, DeleteOutcome, SeatAvailability};
use transita_shared::models::{PointTime, Schedule, SeatId};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/schedules", post(create_schedule))
        .route("/v1/schedules/{id}", put(update_schedule).delete(delete_schedule))
        .route("/v1/schedules/{id}/availability", get(get_availability))
}

#[derive(Debug, Deserialize)]
pub struct CreateScheduleRequest {
    pub bus_id: Uuid,
    pub route_id: Uuid,
    pub dates: BTreeSet<NaiveDate>,
    pub from_time: chrono::NaiveTime,
    pub to_time: chrono::NaiveTime,
    #[serde(default)]
    pub pickup_times: Vec<PointTime>,
    #[serde(default)]
    pub drop_times: Vec<PointTime>,
}

#[derive(Debug, Serialize)]
pub struct ScheduleResponse {
    pub schedule_id: Uuid,
}

async fn create_schedule(
    State(state): State<AppState>,
    Json(req): Json<CreateScheduleRequest>,
) -> Result<(StatusCode, Json<ScheduleResponse>), AppError> {
    if state.fleet.bus(&req.bus_id).is_none() {
        return Err(AppError::NotFound(format!("bus not found: {}", req.bus_id)));
    }
    if state.fleet.route(&req.route_id).is_none() {
        return Err(AppError::NotFound(format!(
            "route not found: {}",
            req.route_id
        )));
    }
    if req.dates.is_empty() {
        return Err(AppError::Validation(
            "schedule needs at least one date".to_string(),
        ));
    }
    let schedule = Schedule {
        id: Uuid::new_v4(),
        bus_id: req.bus_id,
        route_id: req.route_id,
        dates: req.dates,
        from_time: req.from_time,
        to_time: req.to_time,
        pickup_times: req.pickup_times,
        drop_times: req.drop_times,
    };
    let schedule_id = schedule.id;
    state.availability.create_schedule(schedule)?;
    Ok((StatusCode::CREATED, Json(ScheduleResponse { schedule_id })))
}

/// One date's staged seat set. `booked` is accepted for symmetry with
/// the availability read shape but ignored: the committed partition is
/// always derived server-side.
#[derive(Debug, Deserialize)]
pub struct DateSeatsRequest {
    pub available: BTreeSet<SeatId>,
    #[serde(default)]
    #[allow(dead_code)]
    pub booked: Option<BTreeSet<SeatId>>,
}

#[derive(Debug, Deserialize)]
pub struct SeatConfigRequest {
    pub mode: AvailabilityMode,
    /// Global mode: one template for every future date.
    pub available: Option<BTreeSet<SeatId>>,
    /// Per-date mode: an independent set per date.
    pub dates: Option<BTreeMap<NaiveDate, DateSeatsRequest>>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateScheduleRequest {
    pub schedule_dates: Option<BTreeSet<NaiveDate>>,
    pub seats: Option<SeatConfigRequest>,
}

#[derive(Debug, Serialize)]
pub struct UpdateScheduleResponse {
    pub schedule_id: Uuid,
    pub committed_dates: usize,
}

/// Two-phase schedule edit: every seat change in the request is staged
/// first, then committed in one pass, so a rejected date leaves the
/// live availability untouched.
async fn update_schedule(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateScheduleRequest>,
) -> Result<Json<UpdateScheduleResponse>, AppError> {
    if let Some(dates) = req.schedule_dates {
        state.availability.set_schedule_dates(id, dates)?;
    }

    let mut committed_dates = 0;
    if let Some(seats) = req.seats {
        match seats.mode {
            AvailabilityMode::Global => {
                let available = seats.available.ok_or_else(|| {
                    AppError::Validation("global mode requires an `available` set".to_string())
                })?;
                state.availability.stage_global(id, available)?;
            }
            AvailabilityMode::PerDate => {
                let dates = seats.dates.ok_or_else(|| {
                    AppError::Validation("per-date mode requires a `dates` map".to_string())
                })?;
                for (date, config) in dates {
                    state.availability.stage(id, date, config.available)?;
                }
            }
        }
        committed_dates = state.availability.commit_all(id)?;
    }

    Ok(Json(UpdateScheduleResponse {
        schedule_id: id,
        committed_dates,
    }))
}

#[derive(Debug, Serialize)]
pub struct DeleteScheduleResponse {
    pub outcome: DeleteOutcome,
}

async fn delete_schedule(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeleteScheduleResponse>, AppError> {
    let outcome = state.availability.delete_schedule(id)?;
    Ok(Json(DeleteScheduleResponse { outcome }))
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub date: NaiveDate,
}

async fn get_availability(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<SeatAvailability>, AppError> {
    let entry = state.availability.availability(id, query.date)?;
    Ok(Json(entry))
}
