//! Gate valve models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::LatLng;

/// A binary-state irrigation control point placed on the farm map
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateValve {
    pub id: Uuid,
    pub farm_id: Uuid,
    pub name: String,
    pub status: ValveStatus,
    pub position: LatLng,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Valve state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum ValveStatus {
    #[default]
    Open,
    Closed,
}

impl ValveStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValveStatus::Open => "open",
            ValveStatus::Closed => "closed",
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, ValveStatus::Open)
    }

    pub fn toggled(&self) -> Self {
        match self {
            ValveStatus::Open => ValveStatus::Closed,
            ValveStatus::Closed => ValveStatus::Open,
        }
    }
}

impl std::fmt::Display for ValveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ValveStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "open" => Ok(ValveStatus::Open),
            "closed" => Ok(ValveStatus::Closed),
            other => Err(format!("Unknown valve status: {}", other)),
        }
    }
}
