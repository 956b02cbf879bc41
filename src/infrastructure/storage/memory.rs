use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::domain::models::Storage;
use crate::domain::models::StorageError;

/// Slots held in memory. Clones share the same slots.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    slots: Arc<DashMap<String, String>>,
}

impl MemoryStorage {
    pub fn with_slot(key: &str, payload: &str) -> MemoryStorage {
        let storage = MemoryStorage::default();
        storage.slots.insert(key.to_string(), payload.to_string());
        return storage;
    }

    pub fn slots(&self) -> Arc<DashMap<String, String>> {
        return self.slots.clone();
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    #[allow(clippy::implicit_return)]
    async fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        return Ok(self.slots.get(key).map(|payload| return payload.to_string()));
    }

    #[allow(clippy::implicit_return)]
    async fn save(&self, key: &str, payload: &str) -> Result<(), StorageError> {
        self.slots.insert(key.to_string(), payload.to_string());
        return Ok(());
    }
}
