//! Home and device name validation
//!
//! Applied at the request boundary, before a request reaches the registry.

use thiserror::Error;

const MIN_NAME_LEN: usize = 3;
const RESERVED_PREFIX: char = '$';

/// Rejected request
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Invalid home name: {0:?}")]
    InvalidHome(String),

    #[error("Invalid device id: {0:?}")]
    InvalidDevice(String),

    #[error("A home needs at least one device")]
    NoDevices,
}

/// Home names: at least three characters, no leading `$`, no whitespace
pub fn is_valid_name(name: &str) -> bool {
    name.chars().count() >= MIN_NAME_LEN
        && !name.starts_with(RESERVED_PREFIX)
        && !name.chars().any(char::is_whitespace)
}

/// Device ids only need to be addressable: non-empty, no whitespace
pub fn is_valid_device_id(device: &str) -> bool {
    !device.is_empty() && !device.chars().any(char::is_whitespace)
}

pub fn validate_home(home: &str) -> Result<(), ValidationError> {
    if is_valid_name(home) {
        Ok(())
    } else {
        Err(ValidationError::InvalidHome(home.to_string()))
    }
}

pub fn validate_device(device: &str) -> Result<(), ValidationError> {
    if is_valid_device_id(device) {
        Ok(())
    } else {
        Err(ValidationError::InvalidDevice(device.to_string()))
    }
}

/// A new home needs a valid name and at least one device, all addressable
pub fn validate_new_home(home: &str, devices: &[String]) -> Result<(), ValidationError> {
    validate_home(home)?;
    if devices.is_empty() {
        return Err(ValidationError::NoDevices);
    }
    devices.iter().try_for_each(|device| validate_device(device))
}
