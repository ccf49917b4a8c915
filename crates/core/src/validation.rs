//! Input validation for rotation-token requests.
//!
//! Returns [`CoreError::Validation`] with a human-readable message; callers
//! decide how that maps onto their own error taxonomy.

use crate::device::DeviceInfo;
use crate::error::CoreError;

/// Maximum accepted length of a raw rotation token.
pub const MAX_RAW_TOKEN_LENGTH: usize = 512;

/// Maximum accepted length of a device agent string.
pub const MAX_AGENT_STRING_LENGTH: usize = 512;

/// Maximum accepted length of a stable device id.
pub const MAX_DEVICE_ID_LENGTH: usize = 128;

/// Reject empty, oversized, or whitespace-padded raw tokens.
pub fn validate_raw_token(raw_token: &str) -> Result<(), CoreError> {
    if raw_token.is_empty() {
        return Err(CoreError::Validation("Rotation token must not be empty".into()));
    }
    if raw_token.len() > MAX_RAW_TOKEN_LENGTH {
        return Err(CoreError::Validation(format!(
            "Rotation token must be at most {MAX_RAW_TOKEN_LENGTH} bytes"
        )));
    }
    if raw_token.trim() != raw_token {
        return Err(CoreError::Validation(
            "Rotation token must not contain leading or trailing whitespace".into(),
        ));
    }
    Ok(())
}

/// Bound the size of client-supplied device metadata.
pub fn validate_device_info(device: &DeviceInfo) -> Result<(), CoreError> {
    if device.agent_string.len() > MAX_AGENT_STRING_LENGTH {
        return Err(CoreError::Validation(format!(
            "agent_string must be at most {MAX_AGENT_STRING_LENGTH} bytes"
        )));
    }
    if device.stable_device_id.len() > MAX_DEVICE_ID_LENGTH {
        return Err(CoreError::Validation(format!(
            "stable_device_id must be at most {MAX_DEVICE_ID_LENGTH} bytes"
        )));
    }
    Ok(())
}
