use anyhow::{bail, Result};
use tracing::{info, warn};

use crate::storage::KeyValueStore;

/// Well-known storage key holding the raw provider API key
pub const API_KEY_STORAGE_KEY: &str = "ai_api_key";

/// Where the key in use came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    Env,
    Stored,
}

impl KeySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeySource::Env => "env",
            KeySource::Stored => "stored",
        }
    }
}

/// Holds the single provider API key. A saved key can be overwritten but
/// never removed.
pub struct CredentialStore {
    store: Box<dyn KeyValueStore>,
    env_var: Option<String>,
}

impl CredentialStore {
    pub fn new(store: impl KeyValueStore + 'static) -> Self {
        Self {
            store: Box::new(store),
            env_var: None,
        }
    }

    /// Let a non-empty environment variable take precedence over the stored key
    pub fn with_env_override(mut self, var: &str) -> Self {
        self.env_var = Some(var.to_string());
        self
    }

    /// Point an existing environment override at another variable. A store
    /// built without an override stays without one.
    pub fn retarget_env_override(&mut self, var: &str) {
        if self.env_var.is_some() {
            self.env_var = Some(var.to_string());
        }
    }

    pub fn get(&self) -> Option<String> {
        self.resolve().map(|(key, _)| key)
    }

    pub fn source(&self) -> Option<KeySource> {
        self.resolve().map(|(_, source)| source)
    }

    pub fn is_present(&self) -> bool {
        self.get().is_some()
    }

    /// The key saved in storage, ignoring any environment override
    pub fn stored(&self) -> Option<String> {
        match self.store.get(API_KEY_STORAGE_KEY) {
            Ok(value) => value.filter(|k| !k.is_empty()),
            Err(e) => {
                warn!("could not read stored API key: {:#}", e);
                None
            }
        }
    }

    /// Persist `key` (trimmed), overwriting any previous value
    pub fn set(&mut self, key: &str) -> Result<()> {
        let key = key.trim();
        if key.is_empty() {
            bail!("API key must not be empty");
        }

        self.store.set(API_KEY_STORAGE_KEY, key)?;
        info!("saved API key ({} characters)", key.chars().count());
        Ok(())
    }

    fn resolve(&self) -> Option<(String, KeySource)> {
        let from_env = self
            .env_var
            .as_deref()
            .and_then(|var| std::env::var(var).ok())
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());

        if let Some(key) = from_env {
            return Some((key, KeySource::Env));
        }

        self.stored().map(|key| (key, KeySource::Stored))
    }
}
