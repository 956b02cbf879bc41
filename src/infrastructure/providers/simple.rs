#[cfg(test)]
#[path = "simple_test.rs"]
mod tests;

use async_trait::async_trait;
use serde_derive::Deserialize;
use tokio_util::sync::CancellationToken;

use super::ChatRequest;
use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::Message;
use crate::domain::models::Provider;
use crate::domain::models::ProviderError;
use crate::domain::models::ProviderName;
use crate::domain::models::Reply;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
struct ChatResponse {
    reply: String,
}

/// Waits for the whole reply from `POST /api/chat`.
pub struct Simple {
    url: String,
}

impl Default for Simple {
    fn default() -> Simple {
        return Simple {
            url: Config::get(ConfigKey::ServerURL),
        };
    }
}

impl Simple {
    async fn request(&self, req: &ChatRequest) -> Result<Reply, ProviderError> {
        let res = reqwest::Client::new()
            .post(format!("{url}/api/chat", url = self.url))
            .json(req)
            .send()
            .await?;

        let status = res.status().as_u16();
        if !res.status().is_success() {
            tracing::error!(status, "Failed to make chat request");
            return Err(ProviderError::Status(status));
        }

        let body = res.bytes().await?;
        let response = serde_json::from_slice::<ChatResponse>(&body)
            .map_err(|err| return ProviderError::Malformed(err.to_string()))?;

        return Ok(Reply::Immediate(response.reply));
    }
}

#[async_trait]
impl Provider for Simple {
    fn name(&self) -> ProviderName {
        return ProviderName::Simple;
    }

    #[allow(clippy::implicit_return)]
    async fn get_reply(
        &self,
        history: &[Message],
        cancel: CancellationToken,
    ) -> Result<Reply, ProviderError> {
        let req = ChatRequest::from_history(history)?;

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!("Chat request aborted");
                return Err(ProviderError::Aborted);
            }
            res = self.request(&req) => return res,
        }
    }
}
