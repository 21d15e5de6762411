use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use transita_catalog::layout::SeatLayoutBuilder;
use transita_shared::models::{FareOverride, LayoutKind, Route, Seat, SeatType};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/admin/buses", post(create_bus))
        .route("/v1/admin/routes", post(create_route))
}

#[derive(Debug, Deserialize)]
pub struct CreateBusRequest {
    pub name: String,
    pub number: String,
    pub rows: usize,
    pub layout: LayoutKind,
    pub seat_type: SeatType,
}

#[derive(Debug, Serialize)]
pub struct BusResponse {
    pub id: Uuid,
    pub name: String,
    pub number: String,
    pub seat_count: usize,
    pub rows: Vec<Vec<Seat>>,
}

async fn create_bus(
    State(state): State<AppState>,
    Json(req): Json<CreateBusRequest>,
) -> Result<(StatusCode, Json<BusResponse>), AppError> {
    let mut builder = SeatLayoutBuilder::new();
    builder.generate_layout(req.rows, req.layout, req.seat_type)?;
    let bus = builder.into_bus(req.name, req.number);
    let seat_count = bus.seat_count();
    let response = BusResponse {
        id: bus.id,
        name: bus.name.clone(),
        number: bus.number.clone(),
        seat_count,
        rows: bus.rows.clone(),
    };
    state.fleet.register_bus(bus);
    tracing::info!(bus_id = %response.id, seats = seat_count, "bus registered");
    Ok((StatusCode::CREATED, Json(response)))
}

#[derive(Debug, Deserialize)]
pub struct CreateRouteRequest {
    pub bus_id: Uuid,
    pub from: String,
    pub to: String,
    pub base_price: i32,
    pub pickup_points: Vec<String>,
    pub drop_points: Vec<String>,
    #[serde(default)]
    pub price_overrides: Vec<FareOverride>,
}

#[derive(Debug, Serialize)]
pub struct RouteResponse {
    pub id: Uuid,
}

async fn create_route(
    State(state): State<AppState>,
    Json(req): Json<CreateRouteRequest>,
) -> Result<(StatusCode, Json<RouteResponse>), AppError> {
    if state.fleet.bus(&req.bus_id).is_none() {
        return Err(AppError::NotFound(format!("bus not found: {}", req.bus_id)));
    }
    if req.pickup_points.is_empty() || req.drop_points.is_empty() {
        return Err(AppError::Validation(
            "route needs at least one pickup and one drop point".to_string(),
        ));
    }
    let route = Route {
        id: Uuid::new_v4(),
        bus_id: req.bus_id,
        from: req.from,
        to: req.to,
        base_price: req.base_price,
        pickup_points: req.pickup_points,
        drop_points: req.drop_points,
        price_overrides: req.price_overrides,
    };
    let id = state.fleet.register_route(route);
    Ok((StatusCode::CREATED, Json(RouteResponse { id })))
}
