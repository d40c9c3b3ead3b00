//! Gate valve HTTP handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use shared::GateValve;
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::valve::{AddValveInput, SetStatusInput, UpdateValveInput};
use crate::services::ValveService;
use crate::AppState;

fn valve_service(state: &AppState) -> ValveService {
    ValveService::new(state.db.clone(), state.events.clone())
}

/// List the valves of a farm
pub async fn list_valves(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(farm_id): Path<Uuid>,
) -> AppResult<Json<Vec<GateValve>>> {
    let valves = valve_service(&state)
        .list_valves(current_user.id(), farm_id)
        .await?;
    Ok(Json(valves))
}

/// Place a new valve on the farm map
pub async fn add_valve(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(farm_id): Path<Uuid>,
    Json(input): Json<AddValveInput>,
) -> AppResult<(StatusCode, Json<GateValve>)> {
    let valve = valve_service(&state)
        .add_valve(current_user.id(), farm_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(valve)))
}

/// Rename or move a valve
pub async fn update_valve(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path((farm_id, valve_id)): Path<(Uuid, Uuid)>,
    Json(input): Json<UpdateValveInput>,
) -> AppResult<Json<GateValve>> {
    let valve = valve_service(&state)
        .update_valve(current_user.id(), farm_id, valve_id, input)
        .await?;
    Ok(Json(valve))
}

/// Flip a valve between open and closed
pub async fn toggle_valve(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path((farm_id, valve_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<GateValve>> {
    let valve = valve_service(&state)
        .toggle_valve(current_user.id(), farm_id, valve_id)
        .await?;
    Ok(Json(valve))
}

/// Set a valve's status
pub async fn set_valve_status(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path((farm_id, valve_id)): Path<(Uuid, Uuid)>,
    Json(input): Json<SetStatusInput>,
) -> AppResult<Json<GateValve>> {
    let valve = valve_service(&state)
        .set_valve_status(current_user.id(), farm_id, valve_id, input.status)
        .await?;
    Ok(Json(valve))
}

/// Remove a valve
pub async fn delete_valve(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path((farm_id, valve_id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    valve_service(&state)
        .delete_valve(current_user.id(), farm_id, valve_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
