#[cfg(test)]
#[path = "file_test.rs"]
mod tests;

use std::io;
use std::path;

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::Storage;
use crate::domain::models::StorageError;

/// One JSON file per slot, named after the key.
pub struct FileStorage {
    pub dir: path::PathBuf,
}

impl Default for FileStorage {
    fn default() -> FileStorage {
        return FileStorage::new(path::PathBuf::from(Config::get(ConfigKey::StorageDir)));
    }
}

impl FileStorage {
    pub fn new(dir: path::PathBuf) -> FileStorage {
        return FileStorage { dir };
    }

    /// Keys are reduced to characters that are safe in a file name.
    pub fn slot_path(&self, key: &str) -> path::PathBuf {
        let name = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    return c;
                }
                return '_';
            })
            .collect::<String>();

        return self.dir.join(format!("{name}.json"));
    }
}

#[async_trait]
impl Storage for FileStorage {
    #[allow(clippy::implicit_return)]
    async fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.slot_path(key)).await {
            Ok(payload) => return Ok(Some(payload)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        }
    }

    #[allow(clippy::implicit_return)]
    async fn save(&self, key: &str, payload: &str) -> Result<(), StorageError> {
        if !self.dir.exists() {
            fs::create_dir_all(&self.dir).await?;
        }

        let file_path = self.slot_path(key);
        let mut file = fs::File::create(&file_path).await?;
        file.write_all(payload.as_bytes()).await?;
        file.flush().await?;

        tracing::debug!(path = ?file_path, bytes = payload.len(), "Saved conversation");

        return Ok(());
    }
}
