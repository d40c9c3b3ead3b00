//! Grower profile models used to personalise advice

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::LatLng;

/// Agronomic profile of a user
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UserProfile {
    pub user_id: Uuid,
    pub irrigation_type: Option<IrrigationType>,
    pub water_level: Option<WaterLevel>,
    pub soil_type: Option<SoilType>,
    pub land_size: Option<Decimal>,
    #[serde(default)]
    pub land_unit: LandUnit,
    pub location: Option<LatLng>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// A profile with every field the advisor needs
#[derive(Debug, Clone, Serialize)]
pub struct CompleteProfile {
    pub irrigation_type: IrrigationType,
    pub water_level: WaterLevel,
    pub soil_type: SoilType,
    pub land_size: Decimal,
    pub land_unit: LandUnit,
    pub location: Option<LatLng>,
}

impl UserProfile {
    /// Returns the complete view, or the name of the first missing field
    pub fn complete(&self) -> Result<CompleteProfile, &'static str> {
        Ok(CompleteProfile {
            irrigation_type: self.irrigation_type.ok_or("irrigation_type")?,
            water_level: self.water_level.ok_or("water_level")?,
            soil_type: self.soil_type.ok_or("soil_type")?,
            land_size: self.land_size.ok_or("land_size")?,
            land_unit: self.land_unit,
            location: self.location,
        })
    }
}

macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let wanted = s.trim().to_lowercase();
                $name::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str() == wanted)
                    .ok_or_else(|| format!("Unknown {}: {}", stringify!($name), s))
            }
        }
    };
}

/// How water reaches the field
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum IrrigationType {
    Drip,
    Sprinkler,
    Surface,
    Furrow,
    Manual,
    Rainfed,
}

text_enum!(IrrigationType {
    Drip => "drip",
    Sprinkler => "sprinkler",
    Surface => "surface",
    Furrow => "furrow",
    Manual => "manual",
    Rainfed => "rainfed",
});

/// Available water supply
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum WaterLevel {
    Low,
    Medium,
    High,
}

text_enum!(WaterLevel {
    Low => "low",
    Medium => "medium",
    High => "high",
});

/// Dominant soil texture
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SoilType {
    Clay,
    Sandy,
    Loamy,
    Silty,
    Peaty,
    Chalky,
}

text_enum!(SoilType {
    Clay => "clay",
    Sandy => "sandy",
    Loamy => "loamy",
    Silty => "silty",
    Peaty => "peaty",
    Chalky => "chalky",
});

/// Unit of `land_size`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum LandUnit {
    #[default]
    Acres,
    Hectares,
}

text_enum!(LandUnit {
    Acres => "acres",
    Hectares => "hectares",
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_reports_first_missing_field() {
        let mut profile = UserProfile::default();
        assert_eq!(profile.complete().unwrap_err(), "irrigation_type");

        profile.irrigation_type = Some(IrrigationType::Drip);
        profile.water_level = Some(WaterLevel::Medium);
        assert_eq!(profile.complete().unwrap_err(), "soil_type");

        profile.soil_type = Some(SoilType::Loamy);
        profile.land_size = Some(Decimal::from(12));
        let complete = profile.complete().unwrap();
        assert_eq!(complete.soil_type, SoilType::Loamy);
        assert_eq!(complete.land_unit, LandUnit::Acres);
    }

    #[test]
    fn test_enum_parsing_is_case_insensitive() {
        assert_eq!("Drip".parse::<IrrigationType>(), Ok(IrrigationType::Drip));
        assert_eq!("HIGH".parse::<WaterLevel>(), Ok(WaterLevel::High));
        assert_eq!("silty".parse::<SoilType>(), Ok(SoilType::Silty));
        assert!("marsh".parse::<SoilType>().is_err());
    }
}
