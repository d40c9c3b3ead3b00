//! Parsers for loosely-structured generative-model output
//!
//! The model is asked for JSON (weather) or CSV (crop recommendations) but
//! routinely wraps answers in markdown fences, adds a sentence of prose or
//! renames columns. These parsers accept that drift within fixed bounds and
//! report a typed error when nothing usable remains.

use thiserror::Error;

use crate::models::{CropRecommendation, DailyWeather, Suitability, WeatherReport};

/// Errors produced while reading model output
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AiOutputError {
    #[error("Model output is malformed: {0}")]
    Malformed(String),

    #[error("Model output contained no usable rows")]
    Empty,
}

/// Header expected from the crop prompt
pub const CROP_CSV_HEADER: &str = "Crop,Suitability,Season,Water Requirement,Expected Yield,Notes";

/// Remove a surrounding markdown code fence (```csv ... ```), if any
pub fn strip_code_fences(raw: &str) -> &str {
    let mut text = raw.trim();
    if text.starts_with("```") {
        text = match text.find('\n') {
            Some(newline) => &text[newline + 1..],
            None => "",
        };
    }
    if let Some(stripped) = text.trim_end().strip_suffix("```") {
        text = stripped;
    }
    text.trim()
}

/// Extract the outermost JSON object from raw model output
pub fn extract_json_object(raw: &str) -> Option<&str> {
    let text = strip_code_fences(raw);
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(&text[start..=end])
}

// ============================================================================
// Crop CSV
// ============================================================================

/// Column positions of each crop field within a CSV row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ColumnMap {
    crop: usize,
    suitability: usize,
    season: usize,
    water_requirement: usize,
    expected_yield: usize,
    notes: usize,
}

impl ColumnMap {
    /// Positions used when the header is missing or lacks a column
    const STATIC: ColumnMap = ColumnMap {
        crop: 0,
        suitability: 1,
        season: 2,
        water_requirement: 3,
        expected_yield: 4,
        notes: 5,
    };

    const CROP_ALIASES: &'static [&'static str] = &["crop", "cropname", "name", "cropvariety"];
    const SUITABILITY_ALIASES: &'static [&'static str] =
        &["suitability", "suitabilityscore", "score", "rating"];
    const SEASON_ALIASES: &'static [&'static str] =
        &["season", "plantingseason", "bestseason", "sowingseason"];
    const WATER_ALIASES: &'static [&'static str] =
        &["waterrequirement", "waterrequirements", "water", "waterneeds", "waterneed"];
    const YIELD_ALIASES: &'static [&'static str] =
        &["expectedyield", "yield", "estimatedyield", "yieldestimate"];
    const NOTES_ALIASES: &'static [&'static str] = &["notes", "note", "reason", "remarks", "tips"];

    /// Build a map from a header row, or `None` if no cell is a known header
    fn from_header(cells: &[String]) -> Option<ColumnMap> {
        let normalized: Vec<String> = cells.iter().map(|c| normalize_header(c)).collect();
        let position = |aliases: &[&str]| normalized.iter().position(|h| aliases.contains(&h.as_str()));

        let crop = position(Self::CROP_ALIASES);
        let suitability = position(Self::SUITABILITY_ALIASES);
        let season = position(Self::SEASON_ALIASES);
        let water_requirement = position(Self::WATER_ALIASES);
        let expected_yield = position(Self::YIELD_ALIASES);
        let notes = position(Self::NOTES_ALIASES);

        let found = [crop, suitability, season, water_requirement, expected_yield, notes];
        if found.iter().all(Option::is_none) {
            return None;
        }

        Some(ColumnMap {
            crop: crop.unwrap_or(Self::STATIC.crop),
            suitability: suitability.unwrap_or(Self::STATIC.suitability),
            season: season.unwrap_or(Self::STATIC.season),
            water_requirement: water_requirement.unwrap_or(Self::STATIC.water_requirement),
            expected_yield: expected_yield.unwrap_or(Self::STATIC.expected_yield),
            notes: notes.unwrap_or(Self::STATIC.notes),
        })
    }
}

/// Lower-case and keep alphanumerics only ("Water Requirement" -> "waterrequirement")
fn normalize_header(cell: &str) -> String {
    cell.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

fn cell(row: &[String], index: usize) -> String {
    row.get(index).cloned().unwrap_or_default()
}

fn clean_cell(cell: &str) -> String {
    cell.trim().trim_matches(|c| c == '*' || c == '`').trim().to_string()
}

/// Parse crop recommendations from CSV-like model output.
///
/// The header is the first row naming a known column; rows above it are
/// dropped, as are repeated headers, blank rows, single-cell prose lines and
/// rows without a crop name. At most `max` recommendations are returned.
pub fn parse_crop_csv(raw: &str, max: usize) -> Result<Vec<CropRecommendation>, AiOutputError> {
    let body = strip_code_fences(raw);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());

    let mut rows: Vec<Vec<String>> = Vec::new();
    for record in reader.records() {
        let Ok(record) = record else {
            continue;
        };
        let cells: Vec<String> = record.iter().map(clean_cell).collect();
        let filled = cells.iter().filter(|c| !c.is_empty()).count();
        if filled < 2 {
            continue;
        }
        rows.push(cells);
    }

    // Anything above the header row is preamble from the model.
    let header = rows
        .iter()
        .enumerate()
        .find_map(|(index, row)| ColumnMap::from_header(row).map(|map| (index, map)));
    let (columns, data) = match header {
        Some((index, map)) => (map, &rows[index + 1..]),
        None => (ColumnMap::STATIC, rows.as_slice()),
    };

    let recommendations: Vec<CropRecommendation> = data
        .iter()
        .filter(|row| ColumnMap::from_header(row).is_none())
        .filter(|row| !cell(row, columns.crop).is_empty())
        .take(max)
        .map(|row| CropRecommendation {
            crop: cell(row, columns.crop),
            suitability: Suitability::parse_loose(&cell(row, columns.suitability)),
            season: cell(row, columns.season),
            water_requirement: cell(row, columns.water_requirement),
            expected_yield: cell(row, columns.expected_yield),
            notes: cell(row, columns.notes),
        })
        .collect();

    if recommendations.is_empty() {
        return Err(AiOutputError::Empty);
    }
    Ok(recommendations)
}

// ============================================================================
// Weather JSON
// ============================================================================

/// Parse a weather report from JSON model output.
///
/// Days with out-of-range percentages or non-finite temperatures are dropped,
/// swapped min/max temperatures are reordered and the result is truncated to
/// `max_days`.
pub fn parse_weather_report(raw: &str, max_days: usize) -> Result<WeatherReport, AiOutputError> {
    let json = extract_json_object(raw)
        .ok_or_else(|| AiOutputError::Malformed("no JSON object found".to_string()))?;

    let mut report: WeatherReport =
        serde_json::from_str(json).map_err(|e| AiOutputError::Malformed(e.to_string()))?;

    report.days = report
        .days
        .into_iter()
        .filter_map(sanitize_day)
        .take(max_days)
        .collect();

    if report.days.is_empty() {
        return Err(AiOutputError::Empty);
    }
    Ok(report)
}

fn sanitize_day(mut day: DailyWeather) -> Option<DailyWeather> {
    let percent = 0.0..=100.0;
    if !percent.contains(&day.humidity_percent) || !percent.contains(&day.precipitation_chance_percent) {
        return None;
    }
    if !day.temp_min_c.is_finite() || !day.temp_max_c.is_finite() || !day.wind_kph.is_finite() {
        return None;
    }
    if day.temp_min_c > day.temp_max_c {
        std::mem::swap(&mut day.temp_min_c, &mut day.temp_max_c);
    }
    day.wind_kph = day.wind_kph.max(0.0);
    Some(day)
}
