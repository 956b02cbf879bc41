use std::path::PathBuf;

use super::Message;
use super::Phase;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    ContentAppended(String, String),
    ContentReplaced(String, String),
    ConversationReset(Vec<Message>),
    Exported(PathBuf),
    MessageAppended(Message),
    Notice(String),
    SessionFinished(String, Phase),
    SessionStarted(String),
}

impl Event {
    /// Whether the event describes a change to the stored messages.
    pub fn mutates_store(&self) -> bool {
        match self {
            Event::ContentAppended(..)
            | Event::ContentReplaced(..)
            | Event::ConversationReset(..)
            | Event::MessageAppended(..) => return true,
            _ => return false,
        }
    }
}
