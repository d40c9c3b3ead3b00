//! Gate valve service
//!
//! Status changes run inside a transaction that first locks the owning farm
//! row, so two concurrent requests cannot each close one of the last two open
//! valves.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::{check_valve_change, GateValve, LatLng, ValveChange, ValveState, ValveStatus};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::services::events::{FarmEvent, FarmEventBus};

pub(crate) const VALVE_COLUMNS: &str =
    "id, farm_id, name, status, latitude, longitude, created_at, updated_at";

/// Valve select in placement order, filtered by `filter`
pub(crate) fn select_valves(filter: &str) -> String {
    format!(
        "SELECT {} FROM gate_valves WHERE {} ORDER BY seq",
        VALVE_COLUMNS, filter
    )
}

/// Group ordered valve rows by farm, keeping placement order within each farm
pub(crate) fn group_by_farm(rows: Vec<ValveRow>) -> AppResult<HashMap<Uuid, Vec<GateValve>>> {
    let mut by_farm: HashMap<Uuid, Vec<GateValve>> = HashMap::new();
    for row in rows {
        let farm_id = row.farm_id;
        by_farm
            .entry(farm_id)
            .or_default()
            .push(GateValve::try_from(row)?);
    }
    Ok(by_farm)
}

const DUPLICATE_VALVE: &str = "A gate valve with this name already exists on this farm";

/// Gate valve service
#[derive(Clone)]
pub struct ValveService {
    db: PgPool,
    events: FarmEventBus,
}

/// Input for adding a valve to a farm
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AddValveInput {
    #[validate(custom = "crate::validation::valve_name")]
    pub name: String,
    #[validate(custom = "crate::validation::position")]
    pub position: LatLng,
    #[serde(default)]
    pub status: Option<ValveStatus>,
}

/// Input for renaming or moving a valve
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateValveInput {
    #[validate(custom = "crate::validation::valve_name")]
    pub name: Option<String>,
    #[validate(custom = "crate::validation::position")]
    pub position: Option<LatLng>,
}

#[derive(Debug, Deserialize)]
pub struct SetStatusInput {
    pub status: ValveStatus,
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ValveRow {
    id: Uuid,
    pub(crate) farm_id: Uuid,
    name: String,
    status: String,
    latitude: Decimal,
    longitude: Decimal,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ValveRow> for GateValve {
    type Error = AppError;

    fn try_from(row: ValveRow) -> AppResult<Self> {
        let status = row
            .status
            .parse::<ValveStatus>()
            .map_err(AppError::Internal)?;

        Ok(GateValve {
            id: row.id,
            farm_id: row.farm_id,
            name: row.name,
            status,
            position: LatLng::new(row.latitude, row.longitude),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl ValveService {
    /// Create a new ValveService instance
    pub fn new(db: PgPool, events: FarmEventBus) -> Self {
        Self { db, events }
    }

    /// List the valves of a farm in placement order
    pub async fn list_valves(&self, owner_id: Uuid, farm_id: Uuid) -> AppResult<Vec<GateValve>> {
        let owned = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM farms WHERE id = $1 AND owner_id = $2)",
        )
        .bind(farm_id)
        .bind(owner_id)
        .fetch_one(&self.db)
        .await?;

        if !owned {
            return Err(AppError::NotFound("Farm".to_string()));
        }

        let rows = sqlx::query_as::<_, ValveRow>(&select_valves("farm_id = $1"))
            .bind(farm_id)
            .fetch_all(&self.db)
            .await?;

        rows.into_iter().map(GateValve::try_from).collect()
    }

    /// Position of the first valve placed on a farm
    pub async fn first_position(&self, owner_id: Uuid, farm_id: Uuid) -> AppResult<Option<LatLng>> {
        Ok(self
            .list_valves(owner_id, farm_id)
            .await?
            .first()
            .map(|v| v.position))
    }

    /// Add a valve to a farm
    pub async fn add_valve(
        &self,
        owner_id: Uuid,
        farm_id: Uuid,
        input: AddValveInput,
    ) -> AppResult<GateValve> {
        input.validate()?;

        let mut tx = self.db.begin().await?;
        lock_farm(&mut tx, owner_id, farm_id).await?;

        let id = Uuid::new_v4();
        let status = input.status.unwrap_or_default();
        let current = valve_states(&mut tx, farm_id).await?;
        check_valve_change(&current, ValveChange::Add { id, status })?;

        if name_taken(&mut tx, farm_id, &input.name, None).await? {
            return Err(AppError::Conflict {
                resource: "name".to_string(),
                message: DUPLICATE_VALVE.to_string(),
            });
        }

        let valve = insert_valve(&mut tx, farm_id, id, &input.name, status, input.position).await?;
        tx.commit().await?;

        tracing::info!(farm_id = %farm_id, valve_id = %valve.id, "Added gate valve");
        self.events.publish(FarmEvent::ValveAdded {
            owner_id,
            valve: valve.clone(),
        });

        Ok(valve)
    }

    /// Flip a valve between open and closed
    pub async fn toggle_valve(
        &self,
        owner_id: Uuid,
        farm_id: Uuid,
        valve_id: Uuid,
    ) -> AppResult<GateValve> {
        self.change_status(owner_id, farm_id, valve_id, ValveChange::Toggle { valve_id })
            .await
    }

    /// Set a valve's status; setting the current status is a no-op
    pub async fn set_valve_status(
        &self,
        owner_id: Uuid,
        farm_id: Uuid,
        valve_id: Uuid,
        status: ValveStatus,
    ) -> AppResult<GateValve> {
        self.change_status(
            owner_id,
            farm_id,
            valve_id,
            ValveChange::SetStatus { valve_id, status },
        )
        .await
    }

    async fn change_status(
        &self,
        owner_id: Uuid,
        farm_id: Uuid,
        valve_id: Uuid,
        change: ValveChange,
    ) -> AppResult<GateValve> {
        let mut tx = self.db.begin().await?;
        lock_farm(&mut tx, owner_id, farm_id).await?;

        let current = valve_states(&mut tx, farm_id).await?;
        let status = check_valve_change(&current, change)?
            .ok_or_else(|| AppError::Internal("Valve missing after status change".to_string()))?;

        let row = sqlx::query_as::<_, ValveRow>(&format!(
            r#"
            UPDATE gate_valves
            SET status = $1, updated_at = NOW()
            WHERE id = $2 AND farm_id = $3
            RETURNING {}
            "#,
            VALVE_COLUMNS
        ))
        .bind(status.as_str())
        .bind(valve_id)
        .bind(farm_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        let valve = GateValve::try_from(row)?;
        tracing::info!(valve_id = %valve.id, status = %valve.status, "Changed gate valve status");
        self.events.publish(FarmEvent::ValveUpdated {
            owner_id,
            valve: valve.clone(),
        });

        Ok(valve)
    }

    /// Rename a valve or move it on the map
    pub async fn update_valve(
        &self,
        owner_id: Uuid,
        farm_id: Uuid,
        valve_id: Uuid,
        input: UpdateValveInput,
    ) -> AppResult<GateValve> {
        input.validate()?;

        let mut tx = self.db.begin().await?;
        lock_farm(&mut tx, owner_id, farm_id).await?;

        if let Some(name) = &input.name {
            if name_taken(&mut tx, farm_id, name, Some(valve_id)).await? {
                return Err(AppError::Conflict {
                    resource: "name".to_string(),
                    message: DUPLICATE_VALVE.to_string(),
                });
            }
        }

        let row = sqlx::query_as::<_, ValveRow>(&format!(
            r#"
            UPDATE gate_valves
            SET name = COALESCE($1, name),
                latitude = COALESCE($2, latitude),
                longitude = COALESCE($3, longitude),
                updated_at = NOW()
            WHERE id = $4 AND farm_id = $5
            RETURNING {}
            "#,
            VALVE_COLUMNS
        ))
        .bind(input.name.as_deref().map(str::trim))
        .bind(input.position.map(|p| p.lat))
        .bind(input.position.map(|p| p.lng))
        .bind(valve_id)
        .bind(farm_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Gate valve".to_string()))?;

        tx.commit().await?;

        let valve = GateValve::try_from(row)?;
        self.events.publish(FarmEvent::ValveUpdated {
            owner_id,
            valve: valve.clone(),
        });

        Ok(valve)
    }

    /// Remove a valve from a farm
    pub async fn delete_valve(&self, owner_id: Uuid, farm_id: Uuid, valve_id: Uuid) -> AppResult<()> {
        let mut tx = self.db.begin().await?;
        lock_farm(&mut tx, owner_id, farm_id).await?;

        let current = valve_states(&mut tx, farm_id).await?;
        check_valve_change(&current, ValveChange::Remove { valve_id })?;

        sqlx::query("DELETE FROM gate_valves WHERE id = $1 AND farm_id = $2")
            .bind(valve_id)
            .bind(farm_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(farm_id = %farm_id, valve_id = %valve_id, "Deleted gate valve");
        self.events.publish(FarmEvent::ValveRemoved {
            owner_id,
            farm_id,
            valve_id,
        });

        Ok(())
    }
}

/// Lock the farm row for the rest of the transaction
async fn lock_farm(
    tx: &mut Transaction<'_, Postgres>,
    owner_id: Uuid,
    farm_id: Uuid,
) -> AppResult<()> {
    sqlx::query_scalar::<_, Uuid>("SELECT id FROM farms WHERE id = $1 AND owner_id = $2 FOR UPDATE")
        .bind(farm_id)
        .bind(owner_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Farm".to_string()))?;

    Ok(())
}

async fn valve_states(
    tx: &mut Transaction<'_, Postgres>,
    farm_id: Uuid,
) -> AppResult<Vec<ValveState>> {
    let rows = sqlx::query_as::<_, (Uuid, String)>(
        "SELECT id, status FROM gate_valves WHERE farm_id = $1 ORDER BY seq",
    )
    .bind(farm_id)
    .fetch_all(&mut **tx)
    .await?;

    rows.into_iter()
        .map(|(id, status)| {
            let status = status.parse::<ValveStatus>().map_err(AppError::Internal)?;
            Ok(ValveState { id, status })
        })
        .collect()
}

async fn name_taken(
    tx: &mut Transaction<'_, Postgres>,
    farm_id: Uuid,
    name: &str,
    exclude: Option<Uuid>,
) -> AppResult<bool> {
    let taken = sqlx::query_scalar::<_, bool>(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM gate_valves
            WHERE farm_id = $1
              AND LOWER(name) = LOWER($2)
              AND ($3::uuid IS NULL OR id <> $3)
        )
        "#,
    )
    .bind(farm_id)
    .bind(name.trim())
    .bind(exclude)
    .fetch_one(&mut **tx)
    .await?;

    Ok(taken)
}

/// Insert a valve row; used by valve creation and farm creation
pub(crate) async fn insert_valve(
    tx: &mut Transaction<'_, Postgres>,
    farm_id: Uuid,
    id: Uuid,
    name: &str,
    status: ValveStatus,
    position: LatLng,
) -> AppResult<GateValve> {
    let row = sqlx::query_as::<_, ValveRow>(&format!(
        r#"
        INSERT INTO gate_valves (id, farm_id, name, status, latitude, longitude)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING {}
        "#,
        VALVE_COLUMNS
    ))
    .bind(id)
    .bind(farm_id)
    .bind(name.trim())
    .bind(status.as_str())
    .bind(position.lat)
    .bind(position.lng)
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| AppError::from_unique_violation(e, "name", DUPLICATE_VALVE))?;

    GateValve::try_from(row)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(status: &str) -> ValveRow {
        named_row(Uuid::new_v4(), "North gate", status)
    }

    fn named_row(farm_id: Uuid, name: &str, status: &str) -> ValveRow {
        ValveRow {
            id: Uuid::new_v4(),
            farm_id,
            name: name.to_string(),
            status: status.to_string(),
            latitude: Decimal::new(137563, 4),
            longitude: Decimal::new(1005018, 4),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_valves_are_selected_in_placement_order() {
        let schema = include_str!("../../migrations/20241001000000_initial_schema.sql");
        assert!(schema.contains("seq         BIGINT GENERATED ALWAYS AS IDENTITY"));
        assert!(select_valves("farm_id = $1").ends_with("WHERE farm_id = $1 ORDER BY seq"));
    }

    #[test]
    fn test_grouping_keeps_placement_order() {
        let north = Uuid::new_v4();
        let south = Uuid::new_v4();
        let rows = vec![
            named_row(north, "First", "open"),
            named_row(south, "Pump", "closed"),
            named_row(north, "Second", "closed"),
            named_row(north, "Third", "open"),
        ];

        let mut by_farm = group_by_farm(rows).unwrap();
        let names: Vec<String> = by_farm
            .remove(&north)
            .unwrap()
            .into_iter()
            .map(|v| v.name)
            .collect();
        assert_eq!(names, ["First", "Second", "Third"]);
        assert_eq!(by_farm[&south].len(), 1);
    }

    #[test]
    fn test_row_conversion() {
        let valve = GateValve::try_from(row("closed")).unwrap();
        assert_eq!(valve.status, ValveStatus::Closed);
        assert_eq!(valve.position, LatLng::new(Decimal::new(137563, 4), Decimal::new(1005018, 4)));
    }

    #[test]
    fn test_row_with_unknown_status_is_internal_error() {
        assert!(matches!(
            GateValve::try_from(row("ajar")),
            Err(AppError::Internal(_))
        ));
    }

    #[test]
    fn test_add_valve_input_defaults_to_open() {
        let input: AddValveInput = serde_json::from_value(serde_json::json!({
            "name": "Gate 1",
            "position": { "lat": "13.75", "lng": "100.50" }
        }))
        .unwrap();
        assert!(input.validate().is_ok());
        assert_eq!(input.status.unwrap_or_default(), ValveStatus::Open);
    }

    #[test]
    fn test_add_valve_input_rejects_out_of_range_position() {
        let input = AddValveInput {
            name: "Gate 1".to_string(),
            position: LatLng::new(Decimal::from(91), Decimal::ZERO),
            status: None,
        };
        match AppError::from(input.validate().unwrap_err()) {
            AppError::Validation { field, .. } => assert_eq!(field, "position"),
            other => panic!("Expected validation error, got {:?}", other),
        }
    }
}
