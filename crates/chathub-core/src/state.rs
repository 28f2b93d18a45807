//! UI-agnostic conversation state types
//!
//! This module contains the message log shared between frontends (the TUI and
//! the one-shot CLI commands). Nothing here depends on a UI framework or on
//! the network.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single chat message. Messages are never edited after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub text: String,
    pub sender: Sender,
    pub timestamp: DateTime<Utc>,
}

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
}

impl Sender {
    /// Role name used by chat-completions style APIs
    pub fn as_role(&self) -> &'static str {
        match self {
            Sender::User => "user",
            Sender::Assistant => "assistant",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Sender::User => "You",
            Sender::Assistant => "AI Assistant",
        }
    }
}

impl Message {
    pub fn new(sender: Sender, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text: text.into(),
            sender,
            timestamp: Utc::now(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Sender::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Sender::Assistant, text)
    }
}

/// Ordered message log. Append-only, except for [`ConversationLog::reset`]
/// which puts it back to a single greeting. Never empty.
#[derive(Debug, Clone)]
pub struct ConversationLog {
    greeting: String,
    messages: Vec<Message>,
}

impl ConversationLog {
    pub fn new(greeting: impl Into<String>) -> Self {
        let greeting = greeting.into();
        let messages = vec![Message::assistant(greeting.clone())];
        Self { greeting, messages }
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Drop everything and start over with a freshly timestamped greeting
    pub fn reset(&mut self) {
        self.messages.clear();
        self.messages.push(Message::assistant(self.greeting.clone()));
    }

    /// Swap the greeting used by future resets (e.g. after a provider change)
    pub fn set_greeting(&mut self, greeting: impl Into<String>) {
        self.greeting = greeting.into();
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn new_log_holds_only_the_greeting() {
        let log = ConversationLog::new("hi there");
        assert_eq!(log.len(), 1);
        assert_eq!(log.messages()[0].sender, Sender::Assistant);
        assert_eq!(log.messages()[0].text, "hi there");
    }

    #[test]
    fn reset_leaves_a_single_fresh_greeting() {
        let mut log = ConversationLog::new("hello");
        let first_id = log.messages()[0].id.clone();
        log.push(Message::user("one"));
        log.push(Message::assistant("two"));
        log.push(Message::user("three"));

        log.reset();

        assert_eq!(log.len(), 1);
        let seed = &log.messages()[0];
        assert_eq!(seed.sender, Sender::Assistant);
        assert_eq!(seed.text, "hello");
        assert_ne!(seed.id, first_id);
    }

    #[test]
    fn message_ids_are_unique() {
        let mut log = ConversationLog::new("hello");
        for i in 0..50 {
            log.push(Message::user(format!("msg {i}")));
        }
        let ids: HashSet<_> = log.messages().iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids.len(), log.len());
    }

    #[test]
    fn sender_maps_to_chat_roles() {
        assert_eq!(Sender::User.as_role(), "user");
        assert_eq!(Sender::Assistant.as_role(), "assistant");
    }

    #[test]
    fn sender_serializes_lowercase() {
        let json = serde_json::to_string(&Sender::Assistant).unwrap();
        assert_eq!(json, "\"assistant\"");
    }
}
