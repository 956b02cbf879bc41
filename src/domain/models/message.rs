#[cfg(test)]
#[path = "message_test.rs"]
mod tests;

use chrono::DateTime;
use chrono::SubsecRound;
use chrono::Utc;
use serde_derive::Deserialize;
use serde_derive::Serialize;

use super::Role;
use crate::domain::services::ids;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub ts: DateTime<Utc>,
}

impl Message {
    pub fn new(role: Role, content: &str) -> Message {
        return Message::with_id(&ids::generate(), role, content);
    }

    pub fn with_id(id: &str, role: Role, content: &str) -> Message {
        return Message {
            id: id.to_string(),
            role,
            content: content.to_string(),
            ts: Utc::now().trunc_subsecs(3),
        };
    }

    pub fn append(&mut self, fragment: &str) {
        self.content += fragment;
    }

    pub fn replace(&mut self, content: &str) {
        self.content = content.to_string();
    }
}
