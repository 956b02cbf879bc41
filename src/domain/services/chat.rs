#[cfg(test)]
#[path = "chat_test.rs"]
mod tests;

use std::path;

use anyhow::bail;
use anyhow::Result;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::export;
use super::reconciler::Begin;
use super::MessageStore;
use super::Reconciler;
use super::CLEARED_GREETING;
use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::Action;
use crate::domain::models::Event;
use crate::domain::models::FragmentStream;
use crate::domain::models::Message;
#[cfg(test)]
use crate::domain::models::Phase;
use crate::domain::models::ProviderBox;
use crate::domain::models::ProviderName;
use crate::domain::models::Reply;
use crate::domain::models::Role;
use crate::domain::models::StorageBox;
use crate::infrastructure::providers::ProviderManager;
use crate::infrastructure::storage::file::FileStorage;

const BUSY_NOTICE: &str =
    "A reply is still being generated. Use /stop to cancel it, or wait for it to finish.";

pub struct ChatOptions {
    pub provider: ProviderBox,
    pub storage: StorageBox,
    pub storage_key: String,
    pub export_dir: path::PathBuf,
    pub system_prompt: String,
}

impl ChatOptions {
    pub fn from_config() -> Result<ChatOptions> {
        let provider_name = Config::get(ConfigKey::Provider);
        let provider = match ProviderName::parse(provider_name.to_string()) {
            Some(name) => ProviderManager::get(name)?,
            None => bail!(format!("No provider implemented for {provider_name}")),
        };

        return Ok(ChatOptions {
            provider,
            storage: Box::<FileStorage>::default(),
            storage_key: Config::get(ConfigKey::StorageKey),
            export_dir: path::PathBuf::from(Config::get(ConfigKey::ExportDir)),
            system_prompt: Config::get(ConfigKey::SystemPrompt),
        });
    }
}

/// Owns the conversation and runs every stream session. Each committed
/// transition is saved to storage and then published to the view.
pub struct ChatService {
    store: MessageStore,
    reconciler: Reconciler,
    provider: ProviderBox,
    storage: StorageBox,
    storage_key: String,
    export_dir: path::PathBuf,
    tx: mpsc::UnboundedSender<Event>,
}

impl ChatService {
    pub async fn new(options: ChatOptions, tx: mpsc::UnboundedSender<Event>) -> ChatService {
        let mut store = MessageStore::load(&options.storage, &options.storage_key).await;
        store.set_system_prompt(&options.system_prompt);
        tracing::info!(
            provider = %options.provider.name(),
            key = options.storage_key,
            messages = store.messages().len(),
            "Chat service started"
        );

        return ChatService {
            store,
            reconciler: Reconciler::default(),
            provider: options.provider,
            storage: options.storage,
            storage_key: options.storage_key,
            export_dir: options.export_dir,
            tx,
        };
    }

    #[cfg(test)]
    pub fn store(&self) -> &MessageStore {
        return &self.store;
    }

    #[cfg(test)]
    pub fn phase(&self) -> Phase {
        return self.reconciler.phase();
    }

    pub async fn start(mut self, rx: &mut mpsc::UnboundedReceiver<Action>) -> Result<()> {
        self.tx
            .send(Event::ConversationReset(self.store.messages().to_vec()))?;

        while let Some(action) = rx.recv().await {
            if !self.handle(action, rx).await? {
                break;
            }
        }

        return Ok(());
    }

    /// Handles one action while idle. Returns false once the service should
    /// shut down.
    pub async fn handle(
        &mut self,
        action: Action,
        rx: &mut mpsc::UnboundedReceiver<Action>,
    ) -> Result<bool> {
        match action {
            Action::Send(text) => {
                if let Some(begin) = self.reconciler.begin_send(&mut self.store, &text) {
                    return self.run_session(begin, rx).await;
                }
            }
            Action::Regenerate() => {
                if let Some(begin) = self.reconciler.begin_regenerate(&mut self.store) {
                    return self.run_session(begin, rx).await;
                }
                self.tx.send(Event::Notice(
                    "There is no message to regenerate a reply for yet.".to_string(),
                ))?;
            }
            Action::Stop() => {
                self.reconciler.cancel();
            }
            Action::Clear() => {
                self.store
                    .reset(Message::new(Role::Assistant, CLEARED_GREETING));
                self.commit(vec![Event::ConversationReset(
                    self.store.messages().to_vec(),
                )])
                .await?;
            }
            Action::Export() => {
                self.export().await?;
            }
            Action::SetSystemPrompt(prompt) => {
                self.set_system_prompt(&prompt)?;
            }
            Action::Quit() => {
                return Ok(false);
            }
        }

        return Ok(true);
    }

    async fn run_session(
        &mut self,
        begin: Begin,
        rx: &mut mpsc::UnboundedReceiver<Action>,
    ) -> Result<bool> {
        let Begin {
            history,
            cancel,
            events,
        } = begin;
        self.commit(events).await?;

        let mut deferred: Vec<Action> = vec![];
        let mut channel_open = true;

        let reply = {
            let request = self.provider.get_reply(&history, cancel.clone());
            tokio::pin!(request);

            loop {
                tokio::select! {
                    biased;
                    action = rx.recv(), if channel_open => {
                        channel_open = self.on_busy_action(action, &mut deferred)?;
                    }
                    reply = &mut request => break reply,
                }
            }
        };

        match reply {
            Ok(Reply::Immediate(text)) => {
                let events = self.reconciler.resolve_immediate(&mut self.store, &text);
                self.commit(events).await?;
            }
            Ok(Reply::Stream(stream)) => {
                self.reconciler.resolve_stream();
                self.consume(stream, &cancel, rx, &mut deferred, &mut channel_open)
                    .await?;
            }
            Err(err) => {
                tracing::warn!(error = %err, "Provider failed to reply");
                let events = self.reconciler.fail(&mut self.store, &err);
                self.commit(events).await?;
            }
        }

        let mut running = channel_open;
        for action in deferred {
            match action {
                Action::Quit() => running = false,
                Action::Export() => self.export().await?,
                Action::SetSystemPrompt(prompt) => self.set_system_prompt(&prompt)?,
                _ => (),
            }
        }

        return Ok(running);
    }

    async fn consume(
        &mut self,
        mut stream: FragmentStream,
        cancel: &CancellationToken,
        rx: &mut mpsc::UnboundedReceiver<Action>,
        deferred: &mut Vec<Action>,
        channel_open: &mut bool,
    ) -> Result<()> {
        loop {
            if cancel.is_cancelled() || !self.reconciler.is_active() {
                let events = self.reconciler.complete();
                self.commit(events).await?;
                return Ok(());
            }

            tokio::select! {
                biased;
                action = rx.recv(), if *channel_open => {
                    *channel_open = self.on_busy_action(action, deferred)?;
                }
                item = stream.next() => match item {
                    Some(Ok(fragment)) => {
                        let events = self.reconciler.apply_fragment(&mut self.store, &fragment);
                        self.commit(events).await?;
                    }
                    Some(Err(err)) => {
                        tracing::warn!(error = %err, "Fragment stream failed");
                        let events = self.reconciler.fail(&mut self.store, &err);
                        self.commit(events).await?;
                        return Ok(());
                    }
                    None => {
                        let events = self.reconciler.complete();
                        self.commit(events).await?;
                        return Ok(());
                    }
                },
            }
        }
    }

    /// Actions arriving while a session is active. Stop cancels, anything that
    /// would start or replace a session is rejected, and the rest waits until
    /// the session ends. Returns false once the action channel has closed.
    fn on_busy_action(&self, action: Option<Action>, deferred: &mut Vec<Action>) -> Result<bool> {
        let action = match action {
            Some(action) => action,
            None => {
                self.reconciler.cancel();
                return Ok(false);
            }
        };

        match action {
            Action::Stop() => {
                self.reconciler.cancel();
            }
            Action::Quit() => {
                self.reconciler.cancel();
                deferred.push(action);
            }
            Action::Export() | Action::SetSystemPrompt(_) => {
                deferred.push(action);
            }
            Action::Send(_) | Action::Regenerate() | Action::Clear() => {
                tracing::warn!(action = ?action, phase = %self.reconciler.phase(), "Rejected action while a reply is in progress");
                self.tx.send(Event::Notice(BUSY_NOTICE.to_string()))?;
            }
        }

        return Ok(true);
    }

    async fn commit(&self, events: Vec<Event>) -> Result<()> {
        if events.iter().any(|event| return event.mutates_store()) {
            if let Err(err) = self.store.save(&self.storage, &self.storage_key).await {
                tracing::warn!(error = ?err, key = self.storage_key, "Failed to save conversation");
            }
        }

        for event in events {
            self.tx.send(event)?;
        }

        return Ok(());
    }

    async fn export(&self) -> Result<()> {
        match export::write(&self.store, &self.export_dir).await {
            Ok(file_path) => {
                self.tx.send(Event::Exported(file_path))?;
            }
            Err(err) => {
                tracing::warn!(error = ?err, "Failed to export conversation");
                self.tx
                    .send(Event::Notice(format!("Export failed: {err}")))?;
            }
        }

        return Ok(());
    }

    fn set_system_prompt(&mut self, prompt: &str) -> Result<()> {
        self.store.set_system_prompt(prompt);

        let notice = if prompt.trim().is_empty() {
            "System prompt cleared.".to_string()
        } else {
            "System prompt updated.".to_string()
        };
        self.tx.send(Event::Notice(notice))?;

        return Ok(());
    }
}
