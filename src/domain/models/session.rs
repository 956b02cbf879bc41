use tokio_util::sync::CancellationToken;

#[derive(Copy, Clone, Debug, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Phase {
    Idle,
    Pending,
    Streaming,
    Completed,
    Errored,
}

impl Phase {
    /// Pending or streaming. Only one active session may exist per
    /// conversation.
    pub fn is_active(&self) -> bool {
        return *self == Phase::Pending || *self == Phase::Streaming;
    }
}

/// An in-progress reply generation. The target message lives in the store,
/// the session only refers to it by id.
#[derive(Clone, Debug)]
pub struct StreamSession {
    pub message_id: String,
    pub cancel: CancellationToken,
    pub phase: Phase,
}
