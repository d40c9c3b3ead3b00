//! Prompt templates sent to the generative-language model

use chrono::NaiveDate;
use serde_json::json;

use crate::ai_output::CROP_CSV_HEADER;
use crate::models::CompleteProfile;
use crate::types::LatLng;

/// Compact view of a farm for the chat system instruction
#[derive(Debug, Clone)]
pub struct FarmSummary {
    pub name: String,
    pub valve_count: usize,
    pub open_valves: usize,
}

/// One-line description of the grower's conditions
pub fn describe_profile(profile: &CompleteProfile) -> String {
    let mut out = format!(
        "irrigation={} water_level={} soil={} land={} {}",
        profile.irrigation_type,
        profile.water_level,
        profile.soil_type,
        profile.land_size.normalize(),
        profile.land_unit,
    );
    if let Some(location) = &profile.location {
        out.push_str(" location=");
        out.push_str(&location.to_string());
    }
    out
}

/// Prompt asking for a day-by-day weather outlook as JSON
pub fn weather_prompt(
    profile: &CompleteProfile,
    location: LatLng,
    days: u32,
    today: NaiveDate,
) -> String {
    format!(
        "You are an agricultural weather assistant.\n\
         Forecast the weather for the {days} days starting {today} at latitude {lat}, longitude {lng}.\n\
         Grower: {grower}.\n\
         Return one JSON object with: location (nearest place name), summary (two sentences), \
         days (one entry per day with date as YYYY-MM-DD, condition, temp_min_c, temp_max_c, \
         humidity_percent 0-100, precipitation_chance_percent 0-100, wind_kph) and \
         irrigation_advice (what to do with the valves this week given the forecast).\n\
         Return only the JSON object.",
        days = days,
        today = today.format("%Y-%m-%d"),
        lat = location.lat,
        lng = location.lng,
        grower = describe_profile(profile),
    )
}

/// Response schema matching `WeatherReport`
pub fn weather_response_schema() -> serde_json::Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "location": { "type": "STRING" },
            "summary": { "type": "STRING" },
            "days": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "date": { "type": "STRING" },
                        "condition": { "type": "STRING" },
                        "temp_min_c": { "type": "NUMBER" },
                        "temp_max_c": { "type": "NUMBER" },
                        "humidity_percent": { "type": "NUMBER" },
                        "precipitation_chance_percent": { "type": "NUMBER" },
                        "wind_kph": { "type": "NUMBER" }
                    },
                    "required": [
                        "date", "condition", "temp_min_c", "temp_max_c",
                        "humidity_percent", "precipitation_chance_percent"
                    ]
                }
            },
            "irrigation_advice": { "type": "STRING" }
        },
        "required": ["location", "days"]
    })
}

/// Prompt asking for crop recommendations as CSV
pub fn crop_prompt(profile: &CompleteProfile, max: usize) -> String {
    format!(
        "You are an agronomist.\n\
         Recommend up to {max} crops for this grower: {grower}.\n\
         Answer as CSV with exactly this header row:\n{header}\n\
         Suitability is High, Medium or Low. Quote any field containing a comma. \
         Do not add any text before or after the CSV.",
        max = max,
        grower = describe_profile(profile),
        header = CROP_CSV_HEADER,
    )
}

/// System instruction for the advisor chat
pub fn chat_system_instruction(profile: Option<&CompleteProfile>, farms: &[FarmSummary]) -> String {
    let mut out = String::with_capacity(512);
    out.push_str(
        "You are a friendly farm advisor helping a grower manage irrigation and crops. \
         Keep answers short and practical. If a question is unrelated to farming, say so briefly.\n",
    );

    match profile {
        Some(profile) => {
            out.push_str("GROWER: ");
            out.push_str(&describe_profile(profile));
            out.push('\n');
        }
        None => out.push_str("GROWER: profile not filled in yet\n"),
    }

    if farms.is_empty() {
        out.push_str("FARMS: none registered\n");
    } else {
        out.push_str("FARMS:\n");
        for farm in farms {
            out.push_str(&format!(
                "- \"{}\": {} gate valves, {} open\n",
                farm.name, farm.valve_count, farm.open_valves
            ));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{IrrigationType, LandUnit, SoilType, WaterLevel};
    use rust_decimal::Decimal;

    fn profile() -> CompleteProfile {
        CompleteProfile {
            irrigation_type: IrrigationType::Drip,
            water_level: WaterLevel::Low,
            soil_type: SoilType::Sandy,
            land_size: Decimal::new(250, 2),
            land_unit: LandUnit::Hectares,
            location: None,
        }
    }

    #[test]
    fn test_describe_profile() {
        assert_eq!(
            describe_profile(&profile()),
            "irrigation=drip water_level=low soil=sandy land=2.5 hectares"
        );
    }

    #[test]
    fn test_weather_prompt_mentions_location_and_days() {
        let location = LatLng::new(Decimal::new(1852, 2), Decimal::new(7385, 2));
        let today = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        let prompt = weather_prompt(&profile(), location, 5, today);
        assert!(prompt.contains("5 days starting 2026-10-19"));
        assert!(prompt.contains("latitude 18.52, longitude 73.85"));
    }

    #[test]
    fn test_crop_prompt_carries_header() {
        let prompt = crop_prompt(&profile(), 6);
        assert!(prompt.contains(CROP_CSV_HEADER));
        assert!(prompt.contains("up to 6 crops"));
    }

    #[test]
    fn test_chat_system_instruction_lists_farms() {
        let farms = vec![FarmSummary {
            name: "River Plot".to_string(),
            valve_count: 3,
            open_valves: 1,
        }];
        let text = chat_system_instruction(None, &farms);
        assert!(text.contains("profile not filled in yet"));
        assert!(text.contains("\"River Plot\": 3 gate valves, 1 open"));
        assert!(chat_system_instruction(Some(&profile()), &[]).contains("FARMS: none registered"));
    }
}
