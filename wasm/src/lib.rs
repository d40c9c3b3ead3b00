//! WebAssembly module for the Farm Management Platform
//!
//! Lets the web client run the same checks as the server before a request
//! is sent:
//! - Farm name and valve position validation
//! - The open-valve rule for toggles
//! - Parsing of crop recommendation CSV

use serde::Deserialize;
use uuid::Uuid;
use wasm_bindgen::prelude::*;

use shared::{
    check_valve_change, parse_crop_csv, validate_farm_name as farm_name_rule, validate_position,
    ValveChange, ValveRuleViolation, ValveState, ValveStatus,
};

/// Upper bound on rows returned to the client
const MAX_CLIENT_CROPS: usize = 20;

/// Initialize the WASM module
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(target_arch = "wasm32")]
    web_sys::console::debug_1(&JsValue::from_str("farm-management-wasm loaded"));
}

/// The valve fields the client sends; other fields are ignored
#[derive(Debug, Deserialize)]
struct ClientValve {
    id: Uuid,
    status: ValveStatus,
}

fn can_change(valves_json: &str, valve_id: &str, status: &str) -> Result<bool, String> {
    let valves: Vec<ClientValve> =
        serde_json::from_str(valves_json).map_err(|e| format!("Invalid valves JSON: {}", e))?;
    let valve_id = Uuid::parse_str(valve_id).map_err(|e| format!("Invalid valve id: {}", e))?;
    let status: ValveStatus = status.parse()?;

    let current: Vec<ValveState> = valves
        .iter()
        .map(|v| ValveState {
            id: v.id,
            status: v.status,
        })
        .collect();

    match check_valve_change(&current, ValveChange::SetStatus { valve_id, status }) {
        Ok(_) => Ok(true),
        Err(ValveRuleViolation::LastOpenValve) => Ok(false),
        Err(e) => Err(e.to_string()),
    }
}

fn parse_crops(raw: &str) -> Result<String, String> {
    let crops = parse_crop_csv(raw, MAX_CLIENT_CROPS).map_err(|e| e.to_string())?;
    serde_json::to_string(&crops).map_err(|e| e.to_string())
}

/// Farm names are 3 to 50 characters after trimming
#[wasm_bindgen]
pub fn validate_farm_name(name: &str) -> bool {
    farm_name_rule(name).is_ok()
}

/// Message to show under the farm name field, if any
#[wasm_bindgen]
pub fn farm_name_error(name: &str) -> Option<String> {
    farm_name_rule(name).err().map(str::to_string)
}

/// Whether setting `valve_id` to `status` keeps at least one valve open
#[wasm_bindgen]
pub fn can_change_valve(valves_json: &str, valve_id: &str, status: &str) -> Result<bool, JsValue> {
    can_change(valves_json, valve_id, status).map_err(|e| JsValue::from_str(&e))
}

/// Parse crop CSV from the model into a JSON array of recommendations
#[wasm_bindgen]
pub fn parse_crop_recommendations(raw: &str) -> Result<String, JsValue> {
    parse_crops(raw).map_err(|e| JsValue::from_str(&e))
}

/// Latitude in [-90, 90] and longitude in [-180, 180]
#[wasm_bindgen]
pub fn valve_position_valid(lat: f64, lng: f64) -> bool {
    match (
        rust_decimal::Decimal::from_f64_retain(lat),
        rust_decimal::Decimal::from_f64_retain(lng),
    ) {
        (Some(lat), Some(lng)) => validate_position(lat, lng).is_ok(),
        _ => false,
    }
}

/// Content types accepted for map uploads
#[wasm_bindgen]
pub fn map_image_types() -> js_sys::Array {
    ["image/png", "image/jpeg", "image/webp"]
        .iter()
        .map(|t| JsValue::from_str(t))
        .collect()
}
