//! In-memory secret store for tests and ephemeral clients.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use crate::storage::{SecretStore, StoreError};

#[derive(Debug, Default)]
pub struct MemorySecretStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SecretStore for MemorySecretStore {
    fn store(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.entries().insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn retrieve(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        self.entries()
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries()
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    fn exists(&self, key: &str) -> bool {
        self.entries().contains_key(key)
    }
}
