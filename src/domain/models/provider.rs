#[cfg(test)]
#[path = "provider_test.rs"]
mod tests;

use async_trait::async_trait;
use futures::stream::BoxStream;
use strum::EnumIter;
use strum::EnumVariantNames;
use strum::IntoEnumIterator;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use super::Message;

#[derive(Clone, Debug, PartialEq, Eq, EnumIter, EnumVariantNames, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum ProviderName {
    Simple,
    Sse,
}

impl ProviderName {
    pub fn parse(text: String) -> Option<ProviderName> {
        return ProviderName::iter().find(|e| return e.to_string() == text);
    }
}

#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum ProviderError {
    #[error("the request was aborted")]
    Aborted,
    #[error("request failed: {0}")]
    Transport(String),
    #[error("server responded with status {0}")]
    Status(u16),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("cannot request a reply for an empty history")]
    EmptyHistory,
}

impl ProviderError {
    pub fn is_aborted(&self) -> bool {
        return *self == ProviderError::Aborted;
    }
}

/// Fragments of an assistant reply, in the order the provider produced them.
pub type FragmentStream = BoxStream<'static, Result<String, ProviderError>>;

pub enum Reply {
    /// The full reply, delivered at once.
    Immediate(String),
    /// The reply delivered incrementally.
    Stream(FragmentStream),
}

#[async_trait]
pub trait Provider {
    fn name(&self) -> ProviderName;

    /// Requests a reply for `history`, whose last element is the newest user
    /// turn. Implementations pick either delivery mode of `Reply`.
    ///
    /// Triggering `cancel` before or during production fails the call, or the
    /// fragment stream, with `ProviderError::Aborted`. The underlying transport
    /// is released as soon as cancellation is observed.
    async fn get_reply(
        &self,
        history: &[Message],
        cancel: CancellationToken,
    ) -> Result<Reply, ProviderError>;
}

pub type ProviderBox = Box<dyn Provider + Send + Sync>;
