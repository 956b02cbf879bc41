use serde_derive::Deserialize;
use serde_derive::Serialize;
use strum::EnumIter;

use crate::configuration::Config;
use crate::configuration::ConfigKey;

#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, EnumIter, strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    /// Name shown next to a message in the transcript.
    pub fn label(&self) -> String {
        match self {
            Role::System => return String::from("System"),
            Role::User => {
                let username = Config::get(ConfigKey::Username);
                if username.is_empty() {
                    return String::from("User");
                }
                return username;
            }
            Role::Assistant => return String::from("Assistant"),
        }
    }
}
