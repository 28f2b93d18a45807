//! Conversation controller
//!
//! Owns the message log and the single outstanding provider request. A turn
//! goes: append the user message, spawn the request, and later fold the
//! result back in with [`ChatController::poll`] or [`ChatController::wait`].
//! The user message is always in the log before the request task exists, so
//! the reply can never land ahead of it.
//!
//! Frontends read state through the accessors and can [`subscribe`] to
//! [`ChatEvent`]s instead of diffing the log.
//!
//! [`subscribe`]: ChatController::subscribe

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::ai::ChatProvider;
use crate::credential::{CredentialStore, KeySource};
use crate::error::ProviderError;
use crate::provider::Provider;
use crate::state::{ConversationLog, Message};

/// What `send_message` did with the text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// User message appended and the request is on its way
    Dispatched,
    /// Blank after trimming; nothing happened
    Empty,
    /// A request is already outstanding; nothing happened
    Busy,
    /// No API key; nothing happened and no request was made
    MissingCredential,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Error,
}

/// Toast-style notifications and state changes for frontends
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    MessageAppended(Message),
    SendStarted,
    SendFinished { ok: bool },
    ConversationCleared,
    CredentialSaved,
    ProviderChanged(Provider),
    Notice { level: NoticeLevel, text: String },
}

type ReplyTask = JoinHandle<Result<String, ProviderError>>;

struct PendingSend {
    task: ReplyTask,
    generation: u64,
}

pub struct ChatController {
    log: ConversationLog,
    credentials: CredentialStore,
    provider: Arc<dyn ChatProvider>,
    pending: Option<PendingSend>,
    // Bumped on every clear so a reply to a wiped conversation is dropped
    generation: u64,
    subscribers: Vec<mpsc::UnboundedSender<ChatEvent>>,
}

impl ChatController {
    pub fn new(provider: Arc<dyn ChatProvider>, credentials: CredentialStore) -> Self {
        let kind = provider.provider();

        Self {
            log: ConversationLog::new(kind.greeting()),
            credentials,
            provider,
            pending: None,
            generation: 0,
            subscribers: Vec::new(),
        }
    }

    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<ChatEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    pub fn messages(&self) -> &[Message] {
        self.log.messages()
    }

    pub fn is_sending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn has_credential(&self) -> bool {
        self.credentials.is_present()
    }

    pub fn key_source(&self) -> Option<KeySource> {
        self.credentials.source()
    }

    pub fn provider(&self) -> Provider {
        self.provider.provider()
    }

    pub fn model(&self) -> &str {
        self.provider.model()
    }

    /// Start a turn. Must be called from within a Tokio runtime.
    pub fn send_message(&mut self, text: &str) -> SendOutcome {
        let text = text.trim();
        if text.is_empty() {
            return SendOutcome::Empty;
        }
        if self.pending.is_some() {
            debug!("ignoring send while a request is in flight");
            return SendOutcome::Busy;
        }
        let Some(api_key) = self.credentials.get() else {
            debug!("ignoring send without an API key");
            return SendOutcome::MissingCredential;
        };

        let history = self.log.messages().to_vec();
        self.append(Message::user(text));

        let provider = Arc::clone(&self.provider);
        let prompt = text.to_string();
        let task = tokio::spawn(async move { provider.complete(&api_key, &history, &prompt).await });

        info!(
            provider = self.provider().as_str(),
            model = self.model(),
            "dispatched chat request"
        );

        self.pending = Some(PendingSend {
            task,
            generation: self.generation,
        });
        self.emit(ChatEvent::SendStarted);
        SendOutcome::Dispatched
    }

    /// Fold in the outstanding reply if it has arrived. Never blocks.
    ///
    /// Returns the provider result when this call resolved a request.
    pub async fn poll(&mut self) -> Option<Result<String, ProviderError>> {
        let finished = self
            .pending
            .as_ref()
            .is_some_and(|pending| pending.task.is_finished());
        if !finished {
            return None;
        }
        self.resolve().await
    }

    /// Wait for the outstanding reply, if any, and fold it in
    pub async fn wait(&mut self) -> Option<Result<String, ProviderError>> {
        self.resolve().await
    }

    /// Reset to a single greeting. The stored key is left alone.
    pub fn clear_conversation(&mut self) {
        self.generation += 1;
        self.log.reset();
        info!("conversation cleared");
        self.emit(ChatEvent::ConversationCleared);
        self.notice(NoticeLevel::Success, "Chat history cleared".to_string());
    }

    pub fn save_credential(&mut self, key: &str) -> Result<()> {
        self.credentials.set(key)?;
        self.emit(ChatEvent::CredentialSaved);
        self.notice(
            NoticeLevel::Success,
            format!("{} API key saved successfully", self.provider().display_name()),
        );
        Ok(())
    }

    /// Swap the provider client. Refused (returns false) while sending.
    pub fn set_provider(&mut self, provider: Arc<dyn ChatProvider>) -> bool {
        if self.pending.is_some() {
            return false;
        }

        let kind = provider.provider();
        self.provider = provider;
        self.credentials.retarget_env_override(kind.key_env_var());
        self.log.set_greeting(kind.greeting());

        // An untouched conversation should greet in the new provider's name
        if self.log.len() == 1 {
            self.log.reset();
        }

        info!(provider = kind.as_str(), "switched provider");
        self.emit(ChatEvent::ProviderChanged(kind));
        true
    }

    async fn resolve(&mut self) -> Option<Result<String, ProviderError>> {
        let pending = self.pending.as_mut()?;
        let joined = (&mut pending.task).await;
        let generation = pending.generation;
        self.pending = None;

        let result = joined.unwrap_or_else(|e| {
            Err(ProviderError::Transport(format!("request task failed: {}", e)))
        });

        if generation != self.generation {
            debug!("dropping reply for a cleared conversation");
            self.emit(ChatEvent::SendFinished { ok: result.is_ok() });
            return Some(result);
        }

        match &result {
            Ok(reply) => {
                info!(chars = reply.chars().count(), "received reply");
                self.append(Message::assistant(reply.clone()));
            }
            Err(err) => {
                warn!(status = ?err.status_code(), "chat request failed: {}", err);
                let name = self.provider().display_name();
                self.append(Message::assistant(format!(
                    "Sorry, there was an error processing your request. Please check your {} API key and try again. Error: {}",
                    name, err
                )));
                self.notice(
                    NoticeLevel::Error,
                    format!("Failed to get {} response. Please check your API key.", name),
                );
            }
        }

        self.emit(ChatEvent::SendFinished { ok: result.is_ok() });
        Some(result)
    }

    fn append(&mut self, message: Message) {
        self.log.push(message.clone());
        self.emit(ChatEvent::MessageAppended(message));
    }

    fn notice(&mut self, level: NoticeLevel, text: String) {
        self.emit(ChatEvent::Notice { level, text });
    }

    fn emit(&mut self, event: ChatEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}
