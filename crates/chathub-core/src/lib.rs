pub mod ai;
pub mod config;
pub mod controller;
pub mod credential;
pub mod error;
pub mod provider;
pub mod state;
pub mod storage;

// Re-export main types for convenience
pub use ai::{client_for, ChatProvider, ClientOptions, GeminiClient, OpenAIClient};
pub use config::{Config, Overrides};
pub use controller::{ChatController, ChatEvent, NoticeLevel, SendOutcome};
pub use credential::{CredentialStore, KeySource, API_KEY_STORAGE_KEY};
pub use error::ProviderError;
pub use provider::Provider;
pub use state::{ConversationLog, Message, Sender};
pub use storage::{JsonFileStore, KeyValueStore, MemoryStore};
