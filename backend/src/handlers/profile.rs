//! Profile handlers

use axum::{extract::State, Json};
use shared::UserProfile;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::profile::UpsertProfileInput;
use crate::services::ProfileService;
use crate::AppState;

/// Get the current user's profile
pub async fn get_profile(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<UserProfile>> {
    let profile = ProfileService::new(state.db.clone())
        .get_profile(current_user.id())
        .await?;
    Ok(Json(profile))
}

/// Update the current user's profile
pub async fn upsert_profile(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<UpsertProfileInput>,
) -> AppResult<Json<UserProfile>> {
    let profile = ProfileService::new(state.db.clone())
        .upsert_profile(current_user.id(), input)
        .await?;
    Ok(Json(profile))
}
