//! Grower profile service

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::{CompleteProfile, IrrigationType, LandUnit, LatLng, SoilType, UserProfile, WaterLevel};
use sqlx::PgPool;
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};

/// Profile service
#[derive(Clone)]
pub struct ProfileService {
    db: PgPool,
}

/// Profile fields to set; omitted fields keep their stored value
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpsertProfileInput {
    pub irrigation_type: Option<IrrigationType>,
    pub water_level: Option<WaterLevel>,
    pub soil_type: Option<SoilType>,
    #[validate(custom = "crate::validation::land_size")]
    pub land_size: Option<Decimal>,
    pub land_unit: Option<LandUnit>,
    #[validate(custom = "crate::validation::position")]
    pub location: Option<LatLng>,
}

#[derive(Debug, sqlx::FromRow)]
struct ProfileRow {
    user_id: Uuid,
    irrigation_type: Option<String>,
    water_level: Option<String>,
    soil_type: Option<String>,
    land_size: Option<Decimal>,
    land_unit: String,
    latitude: Option<Decimal>,
    longitude: Option<Decimal>,
    updated_at: DateTime<Utc>,
}

fn parse_column<T: FromStr<Err = String>>(value: Option<String>) -> AppResult<Option<T>> {
    value
        .map(|v| v.parse::<T>())
        .transpose()
        .map_err(AppError::Internal)
}

impl TryFrom<ProfileRow> for UserProfile {
    type Error = AppError;

    fn try_from(row: ProfileRow) -> AppResult<Self> {
        let location = match (row.latitude, row.longitude) {
            (Some(lat), Some(lng)) => Some(LatLng::new(lat, lng)),
            _ => None,
        };

        Ok(UserProfile {
            user_id: row.user_id,
            irrigation_type: parse_column(row.irrigation_type)?,
            water_level: parse_column(row.water_level)?,
            soil_type: parse_column(row.soil_type)?,
            land_size: row.land_size,
            land_unit: row.land_unit.parse().map_err(AppError::Internal)?,
            location,
            updated_at: Some(row.updated_at),
        })
    }
}

/// Complete view of a profile, or a validation error naming the first gap
pub fn require_complete(profile: &UserProfile) -> AppResult<CompleteProfile> {
    profile.complete().map_err(|field| {
        AppError::validation(
            field,
            format!("Complete your profile first: {} is missing", field),
        )
    })
}

const PROFILE_COLUMNS: &str = "user_id, irrigation_type, water_level, soil_type, land_size, \
                               land_unit, latitude, longitude, updated_at";

impl ProfileService {
    /// Create a new ProfileService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Get a user's profile; users without a stored row get an empty one
    pub async fn get_profile(&self, user_id: Uuid) -> AppResult<UserProfile> {
        let row = sqlx::query_as::<_, ProfileRow>(&format!(
            "SELECT {} FROM profiles WHERE user_id = $1",
            PROFILE_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;

        match row {
            Some(row) => UserProfile::try_from(row),
            None => Ok(UserProfile {
                user_id,
                ..UserProfile::default()
            }),
        }
    }

    /// Create or update a user's profile
    pub async fn upsert_profile(
        &self,
        user_id: Uuid,
        input: UpsertProfileInput,
    ) -> AppResult<UserProfile> {
        input.validate()?;

        let row = sqlx::query_as::<_, ProfileRow>(&format!(
            r#"
            INSERT INTO profiles (user_id, irrigation_type, water_level, soil_type,
                                  land_size, land_unit, latitude, longitude)
            VALUES ($1, $2, $3, $4, $5, COALESCE($6, 'acres'), $7, $8)
            ON CONFLICT (user_id) DO UPDATE
            SET irrigation_type = COALESCE($2, profiles.irrigation_type),
                water_level = COALESCE($3, profiles.water_level),
                soil_type = COALESCE($4, profiles.soil_type),
                land_size = COALESCE($5, profiles.land_size),
                land_unit = COALESCE($6, profiles.land_unit),
                latitude = COALESCE($7, profiles.latitude),
                longitude = COALESCE($8, profiles.longitude),
                updated_at = NOW()
            RETURNING {}
            "#,
            PROFILE_COLUMNS
        ))
        .bind(user_id)
        .bind(input.irrigation_type.map(|v| v.as_str()))
        .bind(input.water_level.map(|v| v.as_str()))
        .bind(input.soil_type.map(|v| v.as_str()))
        .bind(input.land_size)
        .bind(input.land_unit.map(|v| v.as_str()))
        .bind(input.location.map(|l| l.lat))
        .bind(input.location.map(|l| l.lng))
        .fetch_one(&self.db)
        .await?;

        tracing::info!(user_id = %user_id, "Updated profile");
        UserProfile::try_from(row)
    }

    /// Profile fields the advisor needs
    pub async fn complete_profile(&self, user_id: Uuid) -> AppResult<CompleteProfile> {
        require_complete(&self.get_profile(user_id).await?)
    }
}
