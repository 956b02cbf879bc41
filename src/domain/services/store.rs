#[cfg(test)]
#[path = "store_test.rs"]
mod tests;

use crate::domain::models::Message;
use crate::domain::models::Role;
use crate::domain::models::StorageBox;
use crate::domain::models::StorageError;

pub const GREETING: &str = "Hi! I'm here whenever you have a question.";
pub const CLEARED_GREETING: &str = "New conversation started.";
pub const SYSTEM_MESSAGE_ID: &str = "sys";

/// Ordered conversation turns. The store is the single owner of message
/// content; everything else refers to messages by id.
#[derive(Clone, Debug, Default)]
pub struct MessageStore {
    messages: Vec<Message>,
    system_prompt: String,
}

impl MessageStore {
    pub fn new(messages: Vec<Message>) -> MessageStore {
        return MessageStore {
            messages,
            system_prompt: "".to_string(),
        };
    }

    pub fn seeded() -> MessageStore {
        return MessageStore::new(vec![Message::new(Role::Assistant, GREETING)]);
    }

    pub fn decode(payload: &str) -> Result<Vec<Message>, StorageError> {
        let messages: Vec<Message> = serde_json::from_str(payload)?;
        return Ok(messages);
    }

    /// Rehydrates the conversation saved under `key`. A missing, empty or
    /// undecodable slot falls back to the default greeting.
    pub async fn load(storage: &StorageBox, key: &str) -> MessageStore {
        let payload = match storage.load(key).await {
            Ok(Some(payload)) => payload,
            Ok(None) => {
                tracing::debug!(key, "No stored conversation, seeding");
                return MessageStore::seeded();
            }
            Err(err) => {
                tracing::warn!(error = ?err, key, "Failed to read stored conversation, seeding");
                return MessageStore::seeded();
            }
        };

        match MessageStore::decode(&payload) {
            Ok(messages) if !messages.is_empty() => {
                tracing::debug!(key, count = messages.len(), "Loaded stored conversation");
                return MessageStore::new(messages);
            }
            Ok(_) => {
                return MessageStore::seeded();
            }
            Err(err) => {
                tracing::warn!(error = ?err, key, "Stored conversation is corrupt, seeding");
                return MessageStore::seeded();
            }
        }
    }

    pub async fn save(&self, storage: &StorageBox, key: &str) -> Result<(), StorageError> {
        let payload = serde_json::to_string(&self.messages)?;
        storage.save(key, &payload).await?;

        return Ok(());
    }

    pub fn messages(&self) -> &[Message] {
        return &self.messages;
    }

    #[cfg(test)]
    pub fn get(&self, id: &str) -> Option<&Message> {
        return self.messages.iter().find(|m| return m.id == id);
    }

    pub fn system_prompt(&self) -> &str {
        return &self.system_prompt;
    }

    pub fn set_system_prompt(&mut self, prompt: &str) {
        self.system_prompt = prompt.to_string();
    }

    /// The conversation as sent to a provider, led by the system prompt when
    /// one is configured.
    pub fn history(&self) -> Vec<Message> {
        let prompt = self.system_prompt.trim();
        if prompt.is_empty() {
            return self.messages.clone();
        }

        let mut history = vec![Message::with_id(SYSTEM_MESSAGE_ID, Role::System, prompt)];
        history.extend(self.messages.iter().cloned());

        return history;
    }

    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn update_content(&mut self, id: &str, content: &str) -> bool {
        if let Some(message) = self.messages.iter_mut().find(|m| return m.id == id) {
            message.replace(content);
            return true;
        }

        return false;
    }

    pub fn append_content(&mut self, id: &str, fragment: &str) -> bool {
        if let Some(message) = self.messages.iter_mut().find(|m| return m.id == id) {
            message.append(fragment);
            return true;
        }

        return false;
    }

    pub fn reset(&mut self, initial: Message) {
        self.messages = vec![initial];
    }

    /// Drops everything after the most recent user message. Returns false,
    /// leaving the store untouched, when there is no user message.
    pub fn truncate_after_last_user(&mut self) -> bool {
        let last_user = self.messages.iter().rposition(|m| return m.role == Role::User);
        if let Some(idx) = last_user {
            self.messages.truncate(idx + 1);
            return true;
        }

        return false;
    }
}
