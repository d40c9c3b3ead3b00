//! AI-generated weather models

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Weather outlook produced by the generative model
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeatherReport {
    pub location: String,
    #[serde(default)]
    pub summary: String,
    pub days: Vec<DailyWeather>,
    #[serde(default)]
    pub irrigation_advice: String,
}

/// One forecast day
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DailyWeather {
    pub date: NaiveDate,
    pub condition: String,
    pub temp_min_c: f64,
    pub temp_max_c: f64,
    pub humidity_percent: f64,
    pub precipitation_chance_percent: f64,
    #[serde(default)]
    pub wind_kph: f64,
}

impl DailyWeather {
    /// Rain is more likely than not
    pub fn is_rain_likely(&self) -> bool {
        self.precipitation_chance_percent >= 50.0
    }
}
