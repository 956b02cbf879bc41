#[cfg(test)]
#[path = "reconciler_test.rs"]
mod tests;

use tokio_util::sync::CancellationToken;

use super::MessageStore;
use crate::domain::models::Event;
use crate::domain::models::Message;
use crate::domain::models::Phase;
use crate::domain::models::ProviderError;
use crate::domain::models::Role;
use crate::domain::models::StreamSession;

pub const STOPPED_NOTICE: &str = "(stopped)";

/// Text written into the target message when a reply could not be produced.
pub fn failure_notice(err: &ProviderError) -> String {
    if err.is_aborted() {
        return STOPPED_NOTICE.to_string();
    }

    return format!("An error occurred: {err}");
}

/// A session that has just moved from idle to pending. `history` is what the
/// provider should be asked about.
pub struct Begin {
    pub history: Vec<Message>,
    pub cancel: CancellationToken,
    pub events: Vec<Event>,
}

/// Drives a single stream session through its phases, applying each
/// transition to the message store and reporting it as events. Persisting and
/// publishing those events is left to the caller.
#[derive(Default)]
pub struct Reconciler {
    session: Option<StreamSession>,
}

impl Reconciler {
    pub fn phase(&self) -> Phase {
        if let Some(session) = &self.session {
            return session.phase;
        }

        return Phase::Idle;
    }

    pub fn is_active(&self) -> bool {
        return self.phase().is_active();
    }

    #[cfg(test)]
    pub fn session(&self) -> Option<&StreamSession> {
        return self.session.as_ref();
    }

    pub fn begin_send(&mut self, store: &mut MessageStore, text: &str) -> Option<Begin> {
        let content = text.trim();
        if content.is_empty() {
            return None;
        }
        if self.is_active() {
            tracing::warn!(phase = %self.phase(), "Rejected send while a reply is in progress");
            return None;
        }

        let user_message = Message::new(Role::User, content);
        store.append(user_message.clone());
        let history = store.history();

        let mut events = vec![Event::MessageAppended(user_message)];
        let cancel = self.open(store, &mut events);

        return Some(Begin {
            history,
            cancel,
            events,
        });
    }

    pub fn begin_regenerate(&mut self, store: &mut MessageStore) -> Option<Begin> {
        if self.is_active() {
            tracing::warn!(phase = %self.phase(), "Rejected regenerate while a reply is in progress");
            return None;
        }
        if !store.truncate_after_last_user() {
            tracing::debug!("Nothing to regenerate, no user message yet");
            return None;
        }

        let history = store.history();
        let mut events = vec![Event::ConversationReset(store.messages().to_vec())];
        let cancel = self.open(store, &mut events);

        return Some(Begin {
            history,
            cancel,
            events,
        });
    }

    fn open(&mut self, store: &mut MessageStore, events: &mut Vec<Event>) -> CancellationToken {
        let assistant_message = Message::new(Role::Assistant, "");
        let message_id = assistant_message.id.to_string();
        let cancel = CancellationToken::new();

        store.append(assistant_message.clone());
        self.session = Some(StreamSession {
            message_id: message_id.to_string(),
            cancel: cancel.clone(),
            phase: Phase::Pending,
        });
        tracing::info!(message_id, "Stream session pending");

        events.push(Event::MessageAppended(assistant_message));
        events.push(Event::SessionStarted(message_id));

        return cancel;
    }

    /// Triggers the active session's cancellation token. Returns false when
    /// there is nothing to cancel.
    pub fn cancel(&self) -> bool {
        if let Some(session) = &self.session {
            if session.phase.is_active() {
                tracing::info!(message_id = session.message_id, "Cancelling stream session");
                session.cancel.cancel();
                return true;
            }
        }

        return false;
    }

    /// The provider answered with the whole reply at once.
    pub fn resolve_immediate(&mut self, store: &mut MessageStore, text: &str) -> Vec<Event> {
        let session = match self.take_if(Phase::Pending) {
            Some(session) => session,
            None => return vec![],
        };

        store.update_content(&session.message_id, text);

        return vec![
            Event::ContentReplaced(session.message_id.to_string(), text.to_string()),
            self.finish(session, Phase::Completed),
        ];
    }

    /// The provider answered with a fragment stream.
    pub fn resolve_stream(&mut self) -> bool {
        if let Some(session) = self.session.as_mut() {
            if session.phase == Phase::Pending {
                session.phase = Phase::Streaming;
                tracing::info!(message_id = session.message_id, "Stream session streaming");
                return true;
            }
        }

        return false;
    }

    /// Appends one fragment to the target message. Once the session has been
    /// cancelled, the fragment is dropped and the session completes with the
    /// content appended so far.
    pub fn apply_fragment(&mut self, store: &mut MessageStore, fragment: &str) -> Vec<Event> {
        let (message_id, cancelled) = match &self.session {
            Some(session) if session.phase == Phase::Streaming => (
                session.message_id.to_string(),
                session.cancel.is_cancelled(),
            ),
            _ => return vec![],
        };

        if cancelled {
            return self.complete();
        }

        tracing::debug!(message_id, fragment, "Applying fragment");
        store.append_content(&message_id, fragment);

        return vec![Event::ContentAppended(message_id, fragment.to_string())];
    }

    /// The fragment stream ended, or was cancelled.
    pub fn complete(&mut self) -> Vec<Event> {
        if let Some(session) = self.take_if(Phase::Streaming) {
            return vec![self.finish(session, Phase::Completed)];
        }

        return vec![];
    }

    /// The provider failed. The target message content is overwritten with a
    /// notice, except for an abort surfacing mid-stream after the session was
    /// cancelled, which keeps the partial content and completes.
    pub fn fail(&mut self, store: &mut MessageStore, err: &ProviderError) -> Vec<Event> {
        let session = match self.session.take() {
            Some(session) if session.phase.is_active() => session,
            other => {
                self.session = other;
                return vec![];
            }
        };

        if session.phase == Phase::Streaming && err.is_aborted() && session.cancel.is_cancelled()
        {
            return vec![self.finish(session, Phase::Completed)];
        }

        let notice = failure_notice(err);
        store.update_content(&session.message_id, &notice);

        return vec![
            Event::ContentReplaced(session.message_id.to_string(), notice),
            self.finish(session, Phase::Errored),
        ];
    }

    fn take_if(&mut self, phase: Phase) -> Option<StreamSession> {
        if self.session.is_some() && self.phase() == phase {
            return self.session.take();
        }

        return None;
    }

    fn finish(&self, session: StreamSession, phase: Phase) -> Event {
        tracing::info!(message_id = session.message_id, phase = %phase, "Stream session finished");
        return Event::SessionFinished(session.message_id, phase);
    }
}
