use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("failed to access storage slot: {0}")]
    Io(#[from] std::io::Error),
    #[error("stored conversation could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Durable key-value slots holding serialized conversations.
#[async_trait]
pub trait Storage {
    /// Returns `None` when nothing was ever saved under `key`.
    async fn load(&self, key: &str) -> Result<Option<String>, StorageError>;

    async fn save(&self, key: &str, payload: &str) -> Result<(), StorageError>;
}

pub type StorageBox = Box<dyn Storage + Send + Sync>;
