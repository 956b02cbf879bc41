pub mod simple;
pub mod sse;

use anyhow::bail;
use anyhow::Result;
use serde_derive::Serialize;

use crate::domain::models::Message;
use crate::domain::models::ProviderBox;
use crate::domain::models::ProviderError;
use crate::domain::models::ProviderName;
use crate::domain::models::Role;

/// Body shared by both chat endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatRequest {
    messages: Vec<ChatRequestMessage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct ChatRequestMessage {
    role: Role,
    content: String,
}

impl ChatRequest {
    pub fn from_history(history: &[Message]) -> Result<ChatRequest, ProviderError> {
        if history.is_empty() {
            return Err(ProviderError::EmptyHistory);
        }

        let messages = history
            .iter()
            .map(|message| {
                return ChatRequestMessage {
                    role: message.role,
                    content: message.content.to_string(),
                };
            })
            .collect();

        return Ok(ChatRequest { messages });
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> ProviderError {
        return ProviderError::Transport(err.to_string());
    }
}

pub struct ProviderManager {}

impl ProviderManager {
    pub fn get(name: ProviderName) -> Result<ProviderBox> {
        if name == ProviderName::Simple {
            return Ok(Box::<simple::Simple>::default());
        }

        if name == ProviderName::Sse {
            return Ok(Box::<sse::Sse>::default());
        }

        bail!(format!("No provider implemented for {name}"))
    }
}
