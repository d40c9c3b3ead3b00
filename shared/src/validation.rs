//! Validation utilities for the Farm Management Platform
//!
//! These rules back both the server-side checks and the form checks the UI
//! runs through the WASM bindings.

use rust_decimal::Decimal;

/// Shortest accepted farm name
pub const FARM_NAME_MIN_CHARS: usize = 3;
/// Longest accepted farm name
pub const FARM_NAME_MAX_CHARS: usize = 50;
/// Longest accepted valve name
pub const VALVE_NAME_MAX_CHARS: usize = 50;
/// Longest accepted chat message
pub const CHAT_MESSAGE_MAX_CHARS: usize = 4000;
/// Largest accepted land size, in the profile's unit
pub const LAND_SIZE_MAX: i64 = 1_000_000;

// ============================================================================
// Farm and Valve Validations
// ============================================================================

/// Validate a farm name (trimmed, 3-50 characters)
pub fn validate_farm_name(name: &str) -> Result<(), &'static str> {
    let len = name.trim().chars().count();
    if len < FARM_NAME_MIN_CHARS {
        return Err("Farm name must be at least 3 characters");
    }
    if len > FARM_NAME_MAX_CHARS {
        return Err("Farm name must be at most 50 characters");
    }
    Ok(())
}

/// Validate a valve name (trimmed, 1-50 characters)
pub fn validate_valve_name(name: &str) -> Result<(), &'static str> {
    let len = name.trim().chars().count();
    if len == 0 {
        return Err("Valve name cannot be empty");
    }
    if len > VALVE_NAME_MAX_CHARS {
        return Err("Valve name must be at most 50 characters");
    }
    Ok(())
}

/// Validate a map position (WGS84 ranges)
pub fn validate_position(lat: Decimal, lng: Decimal) -> Result<(), &'static str> {
    if lat < Decimal::from(-90) || lat > Decimal::from(90) {
        return Err("Latitude must be between -90 and 90");
    }
    if lng < Decimal::from(-180) || lng > Decimal::from(180) {
        return Err("Longitude must be between -180 and 180");
    }
    Ok(())
}

// ============================================================================
// Profile Validations
// ============================================================================

/// Validate land size is positive and plausible
pub fn validate_land_size(size: Decimal) -> Result<(), &'static str> {
    if size <= Decimal::ZERO {
        return Err("Land size must be greater than 0");
    }
    if size > Decimal::from(LAND_SIZE_MAX) {
        return Err("Land size must be at most 1,000,000");
    }
    Ok(())
}

// ============================================================================
// General Validations
// ============================================================================

/// Validate email format (basic check)
pub fn validate_email(email: &str) -> Result<(), &'static str> {
    let email = email.trim();
    let Some((local, domain)) = email.split_once('@') else {
        return Err("Invalid email format");
    };
    if email.len() >= 5 && !local.is_empty() && domain.contains('.') && !domain.starts_with('.') {
        Ok(())
    } else {
        Err("Invalid email format")
    }
}

/// Validate password strength
pub fn validate_password(password: &str) -> Result<(), &'static str> {
    if password.chars().count() < 8 {
        return Err("Password must be at least 8 characters");
    }
    Ok(())
}

/// Validate a display name (trimmed, 1-80 characters)
pub fn validate_display_name(name: &str) -> Result<(), &'static str> {
    let len = name.trim().chars().count();
    if len == 0 {
        return Err("Display name cannot be empty");
    }
    if len > 80 {
        return Err("Display name must be at most 80 characters");
    }
    Ok(())
}

/// Validate a chat message (trimmed, 1-4000 characters)
pub fn validate_chat_message(text: &str) -> Result<(), &'static str> {
    let len = text.trim().chars().count();
    if len == 0 {
        return Err("Message cannot be empty");
    }
    if len > CHAT_MESSAGE_MAX_CHARS {
        return Err("Message must be at most 4000 characters");
    }
    Ok(())
}
