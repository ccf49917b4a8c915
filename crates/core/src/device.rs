//! Descriptive device metadata attached to every rotation token.
//!
//! Device information is forensic only. It is shown in the sessions list and
//! recorded on each ledger row, but it is never treated as a secret and never
//! participates in token validation.

use serde::{Deserialize, Serialize};

/// Device metadata embedded in a rotation-token record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Free-form client agent string (browser UA, app name/version).
    pub agent_string: String,
    /// Identifier generated once per client installation.
    pub stable_device_id: String,
}

impl DeviceInfo {
    pub fn new(agent_string: impl Into<String>, stable_device_id: impl Into<String>) -> Self {
        Self {
            agent_string: agent_string.into(),
            stable_device_id: stable_device_id.into(),
        }
    }
}
