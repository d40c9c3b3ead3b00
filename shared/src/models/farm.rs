//! Farm models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::GateValve;

/// A user-owned collection of valve devices and map metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Farm {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub map_image: Option<MapImageRef>,
    pub gate_valves: Vec<GateValve>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Farm {
    /// Number of valves currently open
    pub fn open_valve_count(&self) -> usize {
        self.gate_valves.iter().filter(|v| v.status.is_open()).count()
    }
}

/// Reference to the uploaded map image of a farm
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapImageRef {
    pub url: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub updated_at: DateTime<Utc>,
}
