//! Stable per-installation device identity.

use std::sync::Arc;

use sentinel_core::device::DeviceInfo;
use uuid::Uuid;

use crate::storage::{SecretStore, StoreError, KEY_DEVICE_ID};

/// This client's identity as reported to the rotation backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub device_id: String,
    pub user_agent: String,
}

/// Generates a device id once and persists it in the secret store.
#[derive(Clone)]
pub struct DeviceIdentityHelper {
    store: Arc<dyn SecretStore>,
    user_agent: String,
}

impl DeviceIdentityHelper {
    pub fn new(store: Arc<dyn SecretStore>, user_agent: impl Into<String>) -> Self {
        Self {
            store,
            user_agent: user_agent.into(),
        }
    }

    /// Return the persisted device id, generating and storing one first if
    /// none exists yet.
    pub fn get_or_create_device_id(&self) -> Result<String, StoreError> {
        match self.store.retrieve_string(KEY_DEVICE_ID) {
            Ok(Some(id)) if !id.is_empty() => return Ok(id),
            Ok(_) => {}
            Err(StoreError::Corrupt(_)) => {
                tracing::warn!("Stored device id is unreadable; generating a new one");
            }
            Err(e) => return Err(e),
        }

        let id = Uuid::new_v4().to_string();
        self.store.store(KEY_DEVICE_ID, id.as_bytes())?;
        tracing::debug!(device_id = %id, "Generated device id");
        Ok(id)
    }

    pub fn identity(&self) -> Result<DeviceIdentity, StoreError> {
        Ok(DeviceIdentity {
            device_id: self.get_or_create_device_id()?,
            user_agent: self.user_agent.clone(),
        })
    }

    /// The identity in the shape stored on ledger records.
    pub fn device_info(&self) -> Result<DeviceInfo, StoreError> {
        let identity = self.identity()?;
        Ok(DeviceInfo::new(identity.user_agent, identity.device_id))
    }

    /// Drop the persisted device id; the next call generates a fresh one.
    pub fn forget(&self) -> Result<(), StoreError> {
        self.store.remove(KEY_DEVICE_ID)
    }
}
