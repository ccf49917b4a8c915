//! Wire types shared by the rotation service, the HTTP API and the client.

use serde::{Deserialize, Serialize};

use crate::device::DeviceInfo;
use crate::types::{DbId, Timestamp};

/// Identity of the user a credential pair was minted for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: DbId,
    pub role: String,
}

/// Result of a successful rotation: a fresh access credential plus the
/// rotation token that replaces the one just presented.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotatedCredentials {
    pub access_token: String,
    pub rotation_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
    /// When the new rotation token stops being accepted.
    pub expires_at: Timestamp,
    pub user: SessionUser,
}

/// Read-only projection of one active session, for a sessions screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: DbId,
    pub device_info: DeviceInfo,
    pub issued_at: Timestamp,
    pub last_used_at: Option<Timestamp>,
}
