//! AI weather and crop advice

use chrono::Utc;
use serde::Deserialize;
use shared::prompt::{crop_prompt, weather_prompt, weather_response_schema};
use shared::{parse_crop_csv, parse_weather_report, CropRecommendation, LatLng, WeatherReport};
use sqlx::PgPool;
use uuid::Uuid;

use crate::config::AdvisorConfig;
use crate::error::{AppError, AppResult};
use crate::external::gemini::GenerateRequest;
use crate::external::GeminiClient;
use crate::services::events::FarmEventBus;
use crate::services::profile::{require_complete, ProfileService};
use crate::services::valve::ValveService;

/// Longest forecast the advisor asks for
pub const MAX_FORECAST_DAYS: u32 = 7;

/// Advisor service
#[derive(Clone)]
pub struct AdvisorService {
    gemini: GeminiClient,
    profiles: ProfileService,
    valves: ValveService,
    config: AdvisorConfig,
}

/// Weather forecast request
#[derive(Debug, Default, Deserialize)]
pub struct WeatherInput {
    pub farm_id: Option<Uuid>,
    pub days: Option<u32>,
}

impl WeatherInput {
    /// Parse a request body; an empty body means the defaults
    pub fn from_body(body: &[u8]) -> AppResult<Self> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(body).map_err(|e| AppError::validation("body", e.to_string()))
    }
}

fn resolve_days(requested: Option<u32>, default: u32) -> AppResult<u32> {
    let days = requested.unwrap_or(default);
    if !(1..=MAX_FORECAST_DAYS).contains(&days) {
        return Err(AppError::validation(
            "days",
            format!("Forecast length must be between 1 and {} days", MAX_FORECAST_DAYS),
        ));
    }
    Ok(days)
}

fn resolve_location(valve: Option<LatLng>, profile: Option<LatLng>) -> AppResult<LatLng> {
    valve.or(profile).ok_or_else(|| {
        AppError::validation(
            "location",
            "Place a gate valve on the farm or set a location in your profile",
        )
    })
}

impl AdvisorService {
    /// Create a new AdvisorService instance
    pub fn new(db: PgPool, events: FarmEventBus, gemini: GeminiClient, config: AdvisorConfig) -> Self {
        Self {
            gemini,
            profiles: ProfileService::new(db.clone()),
            valves: ValveService::new(db, events),
            config,
        }
    }

    /// Day-by-day forecast with irrigation advice
    pub async fn weather_forecast(&self, user_id: Uuid, input: WeatherInput) -> AppResult<WeatherReport> {
        let days = resolve_days(input.days, self.config.forecast_days)?;
        let profile = require_complete(&self.profiles.get_profile(user_id).await?)?;

        let valve_position = match input.farm_id {
            Some(farm_id) => self.valves.first_position(user_id, farm_id).await?,
            None => None,
        };
        let location = resolve_location(valve_position, profile.location)?;

        let request = GenerateRequest::prompt(weather_prompt(
            &profile,
            location,
            days,
            Utc::now().date_naive(),
        ))
        .json(weather_response_schema());

        let raw = self.gemini.generate(&request).await?;
        let report = parse_weather_report(&raw, days as usize).map_err(|e| {
            tracing::warn!(model = %self.gemini.model(), error = %e, "Unreadable weather answer");
            e
        })?;

        tracing::info!(user_id = %user_id, days = report.days.len(), "Generated weather forecast");
        Ok(report)
    }

    /// Crops suited to the grower's profile
    pub async fn crop_recommendations(&self, user_id: Uuid) -> AppResult<Vec<CropRecommendation>> {
        let profile = self.profiles.complete_profile(user_id).await?;
        let max = self.config.max_crop_recommendations;

        let raw = self
            .gemini
            .generate(&GenerateRequest::prompt(crop_prompt(&profile, max)))
            .await?;

        let crops = parse_crop_csv(&raw, max).map_err(|e| {
            tracing::warn!(model = %self.gemini.model(), error = %e, "Unreadable crop answer");
            e
        })?;

        tracing::info!(user_id = %user_id, crops = crops.len(), "Generated crop recommendations");
        Ok(crops)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_weather_input_from_body() {
        let input = WeatherInput::from_body(b"").unwrap();
        assert!(input.farm_id.is_none() && input.days.is_none());
        assert!(WeatherInput::from_body(b"  \n").unwrap().days.is_none());
        assert_eq!(WeatherInput::from_body(br#"{"days": 3}"#).unwrap().days, Some(3));

        assert!(matches!(
            WeatherInput::from_body(br#"{"days": "three"}"#),
            Err(AppError::Validation { ref field, .. }) if field == "body"
        ));
        assert!(WeatherInput::from_body(b"{not json").is_err());
    }

    #[test]
    fn test_resolve_days() {
        assert_eq!(resolve_days(None, 7).unwrap(), 7);
        assert_eq!(resolve_days(Some(3), 7).unwrap(), 3);
        assert!(resolve_days(Some(0), 7).is_err());
        assert!(resolve_days(Some(8), 7).is_err());
    }

    #[test]
    fn test_resolve_location_prefers_valve() {
        let valve = LatLng::new(Decimal::new(1375, 2), Decimal::new(10050, 2));
        let home = LatLng::new(Decimal::new(1852, 2), Decimal::new(7385, 2));

        assert_eq!(resolve_location(Some(valve), Some(home)).unwrap(), valve);
        assert_eq!(resolve_location(None, Some(home)).unwrap(), home);
        match resolve_location(None, None) {
            Err(AppError::Validation { field, .. }) => assert_eq!(field, "location"),
            other => panic!("Expected validation error, got {:?}", other),
        }
    }
}
