//! Farm management HTTP handlers

use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::CurrentUser;
use crate::services::farm::{CreateFarmInput, UpdateFarmInput};
use crate::services::FarmService;
use crate::AppState;

fn farm_service(state: &AppState) -> FarmService {
    FarmService::new(state.db.clone(), state.events.clone())
}

/// List all farms of the current user
pub async fn list_farms(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> impl IntoResponse {
    match farm_service(&state).list_farms(current_user.id()).await {
        Ok(farms) => (StatusCode::OK, Json(serde_json::json!({ "farms": farms }))).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Get a specific farm with its valves
pub async fn get_farm(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(farm_id): Path<Uuid>,
) -> impl IntoResponse {
    match farm_service(&state).get_farm(current_user.id(), farm_id).await {
        Ok(farm) => (StatusCode::OK, Json(farm)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Create a new farm
pub async fn create_farm(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateFarmInput>,
) -> impl IntoResponse {
    match farm_service(&state).create_farm(current_user.id(), input).await {
        Ok(farm) => (StatusCode::CREATED, Json(farm)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Rename a farm
pub async fn update_farm(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(farm_id): Path<Uuid>,
    Json(input): Json<UpdateFarmInput>,
) -> impl IntoResponse {
    match farm_service(&state)
        .update_farm(current_user.id(), farm_id, input)
        .await
    {
        Ok(farm) => (StatusCode::OK, Json(farm)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Delete a farm
pub async fn delete_farm(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(farm_id): Path<Uuid>,
) -> impl IntoResponse {
    match farm_service(&state).delete_farm(current_user.id(), farm_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => e.into_response(),
    }
}

fn upload_error(e: axum::extract::multipart::MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(e.body_text())
    } else {
        AppError::validation("file", format!("Invalid upload: {}", e.body_text()))
    }
}

/// Upload or replace the farm map image (multipart field `file`)
pub async fn upload_map_image(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(farm_id): Path<Uuid>,
    mut multipart: Multipart,
) -> AppResult<impl IntoResponse> {
    while let Some(field) = multipart.next_field().await.map_err(upload_error)? {
        if field.name() != Some("file") {
            continue;
        }

        let content_type = field
            .content_type()
            .map(str::to_string)
            .ok_or_else(|| AppError::UnsupportedMediaType("Missing content type".to_string()))?;
        let data = field.bytes().await.map_err(upload_error)?;

        let farm = farm_service(&state)
            .put_map_image(
                current_user.id(),
                farm_id,
                &content_type,
                data.to_vec(),
                state.config.uploads.max_map_image_bytes,
            )
            .await?;

        return Ok(Json(farm));
    }

    Err(AppError::validation(
        "file",
        "Attach the map image as the \"file\" field",
    ))
}

/// Download the farm map image
pub async fn get_map_image(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(farm_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let image = farm_service(&state)
        .get_map_image(current_user.id(), farm_id)
        .await?;

    Ok((
        [
            (header::CONTENT_TYPE, image.content_type),
            (header::CACHE_CONTROL, "private, no-cache".to_string()),
        ],
        image.data,
    ))
}

/// Remove the farm map image
pub async fn delete_map_image(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(farm_id): Path<Uuid>,
) -> impl IntoResponse {
    match farm_service(&state)
        .delete_map_image(current_user.id(), farm_id)
        .await
    {
        Ok(farm) => (StatusCode::OK, Json(farm)).into_response(),
        Err(e) => e.into_response(),
    }
}
