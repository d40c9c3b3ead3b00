//! Farm management service

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use shared::prompt::FarmSummary;
use shared::{validate_valve_set, Farm, GateValve, MapImageRef, ValveState};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::services::events::{FarmEvent, FarmEventBus};
use crate::services::valve::{group_by_farm, insert_valve, select_valves, AddValveInput, ValveRow};

const DUPLICATE_FARM: &str = "You already have a farm with this name";

/// Content types accepted for farm map images
pub const MAP_IMAGE_TYPES: &[&str] = &["image/png", "image/jpeg", "image/webp"];

/// Farm service for managing farms and their map images
#[derive(Clone)]
pub struct FarmService {
    db: PgPool,
    events: FarmEventBus,
}

/// Input for creating a farm
#[derive(Debug, Deserialize, Validate)]
pub struct CreateFarmInput {
    #[validate(custom = "crate::validation::farm_name")]
    pub name: String,
    #[serde(default)]
    pub gate_valves: Vec<AddValveInput>,
}

/// Input for updating a farm
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateFarmInput {
    #[validate(custom = "crate::validation::farm_name")]
    pub name: Option<String>,
}

/// Stored map image bytes
#[derive(Debug, sqlx::FromRow)]
pub struct MapImage {
    pub content_type: String,
    pub data: Vec<u8>,
}

#[derive(Debug, sqlx::FromRow)]
struct FarmRow {
    id: Uuid,
    owner_id: Uuid,
    name: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    map_content_type: Option<String>,
    map_size_bytes: Option<i64>,
    map_updated_at: Option<DateTime<Utc>>,
}

impl FarmRow {
    fn into_farm(self, gate_valves: Vec<GateValve>) -> Farm {
        let map_image = match (self.map_content_type, self.map_size_bytes, self.map_updated_at) {
            (Some(content_type), Some(size_bytes), Some(updated_at)) => Some(MapImageRef {
                url: map_image_url(self.id),
                content_type,
                size_bytes,
                updated_at,
            }),
            _ => None,
        };

        Farm {
            id: self.id,
            owner_id: self.owner_id,
            name: self.name,
            map_image,
            gate_valves,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

fn map_image_url(farm_id: Uuid) -> String {
    format!("/api/v1/farms/{}/map-image", farm_id)
}

/// Check an upload against the accepted types and the size limit
pub fn check_map_image(content_type: &str, size: usize, max_bytes: usize) -> AppResult<()> {
    if !MAP_IMAGE_TYPES.contains(&content_type) {
        return Err(AppError::UnsupportedMediaType(format!(
            "Map images must be PNG, JPEG or WebP, got {}",
            content_type
        )));
    }
    if size == 0 {
        return Err(AppError::validation("file", "Map image is empty"));
    }
    if size > max_bytes {
        return Err(AppError::PayloadTooLarge(format!(
            "Map image is {} bytes, the limit is {} bytes",
            size, max_bytes
        )));
    }
    Ok(())
}

/// Reject initial valve lists that repeat a name or leave no valve open
fn check_initial_valves(valves: &[AddValveInput]) -> AppResult<Vec<ValveState>> {
    let mut names = HashSet::new();
    for valve in valves {
        valve.validate()?;
        if !names.insert(valve.name.trim().to_lowercase()) {
            return Err(AppError::Conflict {
                resource: "gate_valves".to_string(),
                message: format!("Gate valve name \"{}\" is used twice", valve.name.trim()),
            });
        }
    }

    let states: Vec<ValveState> = valves
        .iter()
        .map(|v| ValveState {
            id: Uuid::new_v4(),
            status: v.status.unwrap_or_default(),
        })
        .collect();
    validate_valve_set(&states)?;

    Ok(states)
}

impl FarmService {
    /// Create a new FarmService instance
    pub fn new(db: PgPool, events: FarmEventBus) -> Self {
        Self { db, events }
    }

    /// Get all farms of an owner, ordered by name
    pub async fn list_farms(&self, owner_id: Uuid) -> AppResult<Vec<Farm>> {
        self.fetch_farms(owner_id, None).await
    }

    /// Get a single farm with its valves
    pub async fn get_farm(&self, owner_id: Uuid, farm_id: Uuid) -> AppResult<Farm> {
        self.fetch_farms(owner_id, Some(farm_id))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::NotFound("Farm".to_string()))
    }

    async fn fetch_farms(&self, owner_id: Uuid, farm_id: Option<Uuid>) -> AppResult<Vec<Farm>> {
        let rows = sqlx::query_as::<_, FarmRow>(
            r#"
            SELECT f.id, f.owner_id, f.name, f.created_at, f.updated_at,
                   m.content_type AS map_content_type,
                   m.size_bytes AS map_size_bytes,
                   m.updated_at AS map_updated_at
            FROM farms f
            LEFT JOIN farm_map_images m ON m.farm_id = f.id
            WHERE f.owner_id = $1 AND ($2::uuid IS NULL OR f.id = $2)
            ORDER BY LOWER(f.name) ASC
            "#,
        )
        .bind(owner_id)
        .bind(farm_id)
        .fetch_all(&self.db)
        .await?;

        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let valve_rows = sqlx::query_as::<_, ValveRow>(&select_valves("farm_id = ANY($1)"))
            .bind(&ids)
            .fetch_all(&self.db)
            .await?;

        let mut by_farm = group_by_farm(valve_rows)?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let valves = by_farm.remove(&row.id).unwrap_or_default();
                row.into_farm(valves)
            })
            .collect())
    }

    /// Create a farm, optionally with its first gate valves
    pub async fn create_farm(&self, owner_id: Uuid, input: CreateFarmInput) -> AppResult<Farm> {
        input.validate()?;
        let states = check_initial_valves(&input.gate_valves)?;

        let mut tx = self.db.begin().await?;

        let row = sqlx::query_as::<_, FarmRow>(
            r#"
            INSERT INTO farms (owner_id, name)
            VALUES ($1, $2)
            RETURNING id, owner_id, name, created_at, updated_at,
                      NULL::text AS map_content_type,
                      NULL::bigint AS map_size_bytes,
                      NULL::timestamptz AS map_updated_at
            "#,
        )
        .bind(owner_id)
        .bind(input.name.trim())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::from_unique_violation(e, "name", DUPLICATE_FARM))?;

        let mut valves = Vec::with_capacity(input.gate_valves.len());
        for (valve, state) in input.gate_valves.iter().zip(&states) {
            valves.push(
                insert_valve(&mut tx, row.id, state.id, &valve.name, state.status, valve.position)
                    .await?,
            );
        }

        tx.commit().await?;

        let farm = row.into_farm(valves);
        tracing::info!(farm_id = %farm.id, valves = farm.gate_valves.len(), "Created farm");
        self.events.publish(FarmEvent::FarmCreated {
            owner_id,
            farm: farm.clone(),
        });

        Ok(farm)
    }

    /// Rename a farm
    pub async fn update_farm(
        &self,
        owner_id: Uuid,
        farm_id: Uuid,
        input: UpdateFarmInput,
    ) -> AppResult<Farm> {
        input.validate()?;

        let updated = sqlx::query(
            r#"
            UPDATE farms
            SET name = COALESCE($1, name), updated_at = NOW()
            WHERE id = $2 AND owner_id = $3
            "#,
        )
        .bind(input.name.as_deref().map(str::trim))
        .bind(farm_id)
        .bind(owner_id)
        .execute(&self.db)
        .await
        .map_err(|e| AppError::from_unique_violation(e, "name", DUPLICATE_FARM))?;

        if updated.rows_affected() == 0 {
            return Err(AppError::NotFound("Farm".to_string()));
        }

        self.publish_updated(owner_id, farm_id).await
    }

    /// Delete a farm with its valves and map image
    pub async fn delete_farm(&self, owner_id: Uuid, farm_id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM farms WHERE id = $1 AND owner_id = $2")
            .bind(farm_id)
            .bind(owner_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Farm".to_string()));
        }

        tracing::info!(farm_id = %farm_id, "Deleted farm");
        self.events
            .publish(FarmEvent::FarmDeleted { owner_id, farm_id });

        Ok(())
    }

    /// Store or replace a farm's map image
    pub async fn put_map_image(
        &self,
        owner_id: Uuid,
        farm_id: Uuid,
        content_type: &str,
        data: Vec<u8>,
        max_bytes: usize,
    ) -> AppResult<Farm> {
        check_map_image(content_type, data.len(), max_bytes)?;

        let mut tx = self.db.begin().await?;

        let touched = sqlx::query(
            "UPDATE farms SET updated_at = NOW() WHERE id = $1 AND owner_id = $2",
        )
        .bind(farm_id)
        .bind(owner_id)
        .execute(&mut *tx)
        .await?;

        if touched.rows_affected() == 0 {
            return Err(AppError::NotFound("Farm".to_string()));
        }

        sqlx::query(
            r#"
            INSERT INTO farm_map_images (farm_id, content_type, data, size_bytes)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (farm_id) DO UPDATE
            SET content_type = EXCLUDED.content_type,
                data = EXCLUDED.data,
                size_bytes = EXCLUDED.size_bytes,
                updated_at = NOW()
            "#,
        )
        .bind(farm_id)
        .bind(content_type)
        .bind(&data)
        .bind(data.len() as i64)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(farm_id = %farm_id, bytes = data.len(), "Stored farm map image");
        self.publish_updated(owner_id, farm_id).await
    }

    /// Fetch the bytes of a farm's map image
    pub async fn get_map_image(&self, owner_id: Uuid, farm_id: Uuid) -> AppResult<MapImage> {
        sqlx::query_as::<_, MapImage>(
            r#"
            SELECT m.content_type, m.data
            FROM farm_map_images m
            JOIN farms f ON f.id = m.farm_id
            WHERE m.farm_id = $1 AND f.owner_id = $2
            "#,
        )
        .bind(farm_id)
        .bind(owner_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Map image".to_string()))
    }

    /// Remove a farm's map image
    pub async fn delete_map_image(&self, owner_id: Uuid, farm_id: Uuid) -> AppResult<Farm> {
        let result = sqlx::query(
            r#"
            DELETE FROM farm_map_images m
            USING farms f
            WHERE m.farm_id = f.id AND f.id = $1 AND f.owner_id = $2
            "#,
        )
        .bind(farm_id)
        .bind(owner_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Map image".to_string()));
        }

        self.publish_updated(owner_id, farm_id).await
    }

    /// Short description of each farm for the chat advisor
    pub async fn summaries(&self, owner_id: Uuid) -> AppResult<Vec<FarmSummary>> {
        Ok(self
            .list_farms(owner_id)
            .await?
            .iter()
            .map(|farm| FarmSummary {
                name: farm.name.clone(),
                valve_count: farm.gate_valves.len(),
                open_valves: farm.open_valve_count(),
            })
            .collect())
    }

    async fn publish_updated(&self, owner_id: Uuid, farm_id: Uuid) -> AppResult<Farm> {
        let farm = self.get_farm(owner_id, farm_id).await?;
        self.events.publish(FarmEvent::FarmUpdated {
            owner_id,
            farm: farm.clone(),
        });
        Ok(farm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use shared::{LatLng, ValveStatus};

    fn valve(name: &str, status: Option<ValveStatus>) -> AddValveInput {
        AddValveInput {
            name: name.to_string(),
            position: LatLng::new(Decimal::new(1375, 2), Decimal::new(10050, 2)),
            status,
        }
    }

    #[test]
    fn test_check_map_image() {
        assert!(check_map_image("image/png", 1024, 4096).is_ok());
        assert!(matches!(
            check_map_image("image/gif", 1024, 4096),
            Err(AppError::UnsupportedMediaType(_))
        ));
        assert!(matches!(
            check_map_image("image/jpeg", 4097, 4096),
            Err(AppError::PayloadTooLarge(_))
        ));
        assert!(matches!(
            check_map_image("image/webp", 0, 4096),
            Err(AppError::Validation { .. })
        ));
    }

    #[test]
    fn test_initial_valves_need_one_open() {
        let valves = vec![
            valve("Gate 1", Some(ValveStatus::Closed)),
            valve("Gate 2", Some(ValveStatus::Closed)),
        ];
        assert!(matches!(
            check_initial_valves(&valves),
            Err(AppError::LastOpenValve)
        ));

        let valves = vec![valve("Gate 1", Some(ValveStatus::Closed)), valve("Gate 2", None)];
        let states = check_initial_valves(&valves).unwrap();
        assert_eq!(states[1].status, ValveStatus::Open);
    }

    #[test]
    fn test_initial_valves_reject_duplicate_names() {
        let valves = vec![valve("Gate 1", None), valve(" gate 1 ", None)];
        assert!(matches!(
            check_initial_valves(&valves),
            Err(AppError::Conflict { .. })
        ));
    }

    #[test]
    fn test_empty_initial_valves_are_fine() {
        assert!(check_initial_valves(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_map_row_without_image() {
        let row = FarmRow {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            name: "Riverside".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            map_content_type: None,
            map_size_bytes: None,
            map_updated_at: None,
        };
        let farm = row.into_farm(Vec::new());
        assert!(farm.map_image.is_none());
    }

    #[test]
    fn test_map_row_with_image_points_at_download_route() {
        let id = Uuid::new_v4();
        let row = FarmRow {
            id,
            owner_id: Uuid::new_v4(),
            name: "Riverside".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            map_content_type: Some("image/png".to_string()),
            map_size_bytes: Some(2048),
            map_updated_at: Some(Utc::now()),
        };
        let image = row.into_farm(Vec::new()).map_image.unwrap();
        assert_eq!(image.url, format!("/api/v1/farms/{}/map-image", id));
        assert_eq!(image.size_bytes, 2048);
    }
}
