//! Adapters exposing the shared validation rules to `validator` derives

use std::borrow::Cow;

use shared::LatLng;
use validator::ValidationError;

fn adapt(code: &'static str, result: Result<(), &'static str>) -> Result<(), ValidationError> {
    result.map_err(|message| {
        let mut error = ValidationError::new(code);
        error.message = Some(Cow::Borrowed(message));
        error
    })
}

pub fn farm_name(name: &str) -> Result<(), ValidationError> {
    adapt("farm_name", shared::validate_farm_name(name))
}

pub fn valve_name(name: &str) -> Result<(), ValidationError> {
    adapt("valve_name", shared::validate_valve_name(name))
}

pub fn position(position: &LatLng) -> Result<(), ValidationError> {
    adapt(
        "position",
        shared::validate_position(position.lat, position.lng),
    )
}

pub fn email(email: &str) -> Result<(), ValidationError> {
    adapt("email", shared::validate_email(email))
}

pub fn password(password: &str) -> Result<(), ValidationError> {
    adapt("password", shared::validate_password(password))
}

pub fn display_name(name: &str) -> Result<(), ValidationError> {
    adapt("display_name", shared::validate_display_name(name))
}

pub fn land_size(size: &rust_decimal::Decimal) -> Result<(), ValidationError> {
    adapt("land_size", shared::validate_land_size(*size))
}

pub fn chat_message(text: &str) -> Result<(), ValidationError> {
    adapt("message", shared::validate_chat_message(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adapter_keeps_shared_message() {
        let error = farm_name("ab").unwrap_err();
        assert_eq!(error.code, "farm_name");
        assert_eq!(
            error.message.as_deref(),
            Some("Farm name must be at least 3 characters")
        );
        assert!(farm_name("Orchard").is_ok());
    }
}
