//! Crop recommendation models

use serde::{Deserialize, Serialize};

/// A crop suggested by the generative model for the grower's conditions
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CropRecommendation {
    pub crop: String,
    pub suitability: Suitability,
    pub season: String,
    pub water_requirement: String,
    pub expected_yield: String,
    pub notes: String,
}

/// How well a crop suits the grower's profile
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Suitability {
    High,
    Medium,
    Low,
    Unknown,
}

impl Suitability {
    /// Interpret a suitability cell: a word or a 0-10 / 0-100 score
    pub fn parse_loose(cell: &str) -> Self {
        let text = cell.trim().trim_end_matches('%').trim().to_lowercase();
        match text.as_str() {
            "high" | "very high" | "excellent" => return Suitability::High,
            "medium" | "moderate" | "fair" => return Suitability::Medium,
            "low" | "poor" => return Suitability::Low,
            _ => {}
        }

        let Ok(score) = text.parse::<f64>() else {
            return Suitability::Unknown;
        };
        let percent = match score {
            s if !(0.0..=100.0).contains(&s) => return Suitability::Unknown,
            s if s <= 10.0 => s * 10.0,
            s => s,
        };
        if percent >= 70.0 {
            Suitability::High
        } else if percent >= 40.0 {
            Suitability::Medium
        } else {
            Suitability::Low
        }
    }
}
