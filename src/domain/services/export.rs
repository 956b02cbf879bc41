#[cfg(test)]
#[path = "export_test.rs"]
mod tests;

use std::path;

use anyhow::Result;
use chrono::DateTime;
use chrono::SecondsFormat;
use chrono::Utc;
use serde_derive::Deserialize;
use serde_derive::Serialize;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::MessageStore;
use crate::domain::models::Message;

#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportDocument {
    #[serde(rename = "systemPrompt")]
    pub system_prompt: String,
    pub messages: Vec<Message>,
}

impl ExportDocument {
    pub fn from_store(store: &MessageStore) -> ExportDocument {
        return ExportDocument {
            system_prompt: store.system_prompt().to_string(),
            messages: store.messages().to_vec(),
        };
    }
}

/// `chat_2023-11-14T22-13-20-000Z.json` style names, from an ISO-8601 UTC
/// timestamp with `:` and `.` swapped for `-`.
pub fn file_name(now: DateTime<Utc>) -> String {
    let timestamp = now
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-");

    return format!("chat_{timestamp}.json");
}

pub async fn write(store: &MessageStore, dir: &path::Path) -> Result<path::PathBuf> {
    let payload = serde_json::to_string_pretty(&ExportDocument::from_store(store))?;

    if !dir.exists() {
        fs::create_dir_all(dir).await?;
    }

    let file_path = dir.join(file_name(Utc::now()));
    let mut file = fs::File::create(&file_path).await?;
    file.write_all(payload.as_bytes()).await?;

    tracing::info!(path = ?file_path, "Exported conversation");

    return Ok(file_path);
}
