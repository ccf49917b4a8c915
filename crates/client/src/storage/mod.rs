//! Local secret storage for the client.
//!
//! Holds the current raw rotation token and the device id. Raw tokens never
//! leave this store except to be presented to the rotation backend.

pub mod file_store;
pub mod memory_store;

use thiserror::Error;

/// Key-value store for client secrets.
pub trait SecretStore: Send + Sync {
    /// Store a secret, replacing any previous value.
    fn store(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;

    /// Retrieve a secret.
    fn retrieve(&self, key: &str) -> Result<Vec<u8>, StoreError>;

    /// Delete a secret.
    fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Check if a key exists.
    fn exists(&self, key: &str) -> bool;

    /// Retrieve a UTF-8 secret, mapping a missing key to `None`.
    fn retrieve_string(&self, key: &str) -> Result<Option<String>, StoreError> {
        match self.retrieve(key) {
            Ok(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|_| StoreError::Corrupt(key.to_string())),
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Delete a secret, treating a missing key as success.
    fn remove(&self, key: &str) -> Result<(), StoreError> {
        match self.delete(key) {
            Ok(()) | Err(StoreError::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Key not found: {0}")]
    NotFound(String),
    #[error("Stored value for {0} is not valid UTF-8")]
    Corrupt(String),
    #[error("Storage backend error: {0}")]
    Backend(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub use file_store::FileSecretStore;
pub use memory_store::MemorySecretStore;

/// Storage keys.
pub const KEY_ROTATION_TOKEN: &str = "sentinel-rotation-token";
pub const KEY_DEVICE_ID: &str = "sentinel-device-id";
