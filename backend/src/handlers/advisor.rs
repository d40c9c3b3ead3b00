//! Weather and crop advice handlers

use axum::{body::Bytes, extract::State, Json};
use shared::{CropRecommendation, WeatherReport};

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::advisor::WeatherInput;
use crate::services::AdvisorService;
use crate::AppState;

fn advisor_service(state: &AppState) -> AdvisorService {
    AdvisorService::new(
        state.db.clone(),
        state.events.clone(),
        state.gemini.clone(),
        state.config.advisor.clone(),
    )
}

/// Forecast for a farm or the profile location
pub async fn weather_forecast(
    State(state): State<AppState>,
    current_user: CurrentUser,
    body: Bytes,
) -> AppResult<Json<WeatherReport>> {
    let input = WeatherInput::from_body(&body)?;
    let report = advisor_service(&state)
        .weather_forecast(current_user.id(), input)
        .await?;
    Ok(Json(report))
}

/// Crops suited to the grower's profile
pub async fn crop_recommendations(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<Vec<CropRecommendation>>> {
    let crops = advisor_service(&state)
        .crop_recommendations(current_user.id())
        .await?;
    Ok(Json(crops))
}
