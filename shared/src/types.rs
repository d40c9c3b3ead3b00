//! Common types used across the platform

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A map position as a latitude/longitude pair
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct LatLng {
    pub lat: Decimal,
    pub lng: Decimal,
}

impl LatLng {
    pub fn new(lat: Decimal, lng: Decimal) -> Self {
        Self { lat, lng }
    }

    /// Both coordinates are inside the WGS84 ranges
    pub fn is_valid(&self) -> bool {
        crate::validation::validate_position(self.lat, self.lng).is_ok()
    }
}

impl std::fmt::Display for LatLng {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}, {}", self.lat, self.lng)
    }
}

/// Limit parameter for list endpoints
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Limit {
    pub limit: Option<u32>,
}

impl Limit {
    /// Resolve the requested limit against a default and a hard maximum
    pub fn resolve(&self, default: u32, max: u32) -> u32 {
        self.limit.unwrap_or(default).clamp(1, max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_resolve() {
        assert_eq!(Limit { limit: None }.resolve(50, 200), 50);
        assert_eq!(Limit { limit: Some(0) }.resolve(50, 200), 1);
        assert_eq!(Limit { limit: Some(500) }.resolve(50, 200), 200);
        assert_eq!(Limit { limit: Some(10) }.resolve(50, 200), 10);
    }

    #[test]
    fn test_lat_lng_display() {
        let pos = LatLng::new(Decimal::new(187883, 4), Decimal::new(989853, 4));
        assert_eq!(pos.to_string(), "18.7883, 98.9853");
    }
}
