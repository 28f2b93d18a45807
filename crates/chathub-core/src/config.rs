use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use anyhow::{Result, anyhow};
use tracing::debug;

use crate::ai::ClientOptions;
use crate::provider::Provider;

const APP_DIR: &str = "chathub";

pub const PROVIDER_ENV: &str = "CHATHUB_PROVIDER";
pub const MODEL_ENV: &str = "CHATHUB_MODEL";
pub const BASE_URL_ENV: &str = "CHATHUB_BASE_URL";

/// Settings from the environment or the command line. Unset fields leave
/// the file's values alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub provider: Option<Provider>,
    pub model: Option<String>,
    pub base_url: Option<String>,
}

impl Overrides {
    /// Blank values count as unset; an unknown provider name is an error
    pub fn from_parts(
        provider: Option<&str>,
        model: Option<String>,
        base_url: Option<String>,
    ) -> Result<Self> {
        let provider = match provider.map(str::trim).filter(|p| !p.is_empty()) {
            Some(name) => Some(Provider::from_str(name).ok_or_else(|| {
                anyhow!(
                    "unknown provider '{}', expected one of: {}",
                    name,
                    Provider::all()
                        .iter()
                        .map(|p| p.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            })?),
            None => None,
        };

        Ok(Self {
            provider,
            model: model.filter(|m| !m.trim().is_empty()),
            base_url: base_url.filter(|u| !u.trim().is_empty()),
        })
    }

    /// `CHATHUB_PROVIDER` / `CHATHUB_MODEL` / `CHATHUB_BASE_URL`
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Self::from_parts(
            lookup(PROVIDER_ENV).as_deref(),
            lookup(MODEL_ENV),
            lookup(BASE_URL_ENV),
        )
    }

    /// Fields set in `top` win over ours
    pub fn layered(self, top: Overrides) -> Overrides {
        Overrides {
            provider: top.provider.or(self.provider),
            model: top.model.or(self.model),
            base_url: top.base_url.or(self.base_url),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub request_timeout_secs: Option<u64>,
}

impl Config {
    pub fn new() -> Self {
        Self {
            provider: Some(Provider::default().as_str().to_string()),
            model: None,
            base_url: None,
            request_timeout_secs: None,
        }
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(config_path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        debug!(path = %config_path.display(), "loaded config");
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(config_path, config_content)?;
        Ok(())
    }

    /// Record `provider` in the config file at `config_path`, keeping the
    /// rest of what is stored there
    pub fn save_provider(config_path: &Path, provider: Provider) -> Result<()> {
        let mut config = Self::load_from(config_path).unwrap_or_else(|_| Self::new());
        config.set_provider(provider);
        config.save_to(config_path)
    }

    pub fn set_provider(&mut self, provider: Provider) {
        self.provider = Some(provider.as_str().to_string());
        // Model and endpoint only make sense for the provider they were set for
        self.model = None;
        self.base_url = None;
    }

    /// Layer `overrides` on top of what was read from the file.
    ///
    /// A provider different from the file's drops the file's model and
    /// endpoint; model and endpoint given in `overrides` are always kept.
    pub fn apply(&mut self, overrides: &Overrides) {
        if let Some(provider) = overrides.provider {
            if provider == self.provider() {
                self.provider = Some(provider.as_str().to_string());
            } else {
                self.set_provider(provider);
            }
        }
        if let Some(model) = &overrides.model {
            self.model = Some(model.clone());
        }
        if let Some(base_url) = &overrides.base_url {
            self.base_url = Some(base_url.clone());
        }
    }

    /// Configured provider; unknown names fall back to the default
    pub fn provider(&self) -> Provider {
        self.provider
            .as_deref()
            .and_then(Provider::from_str)
            .unwrap_or_default()
    }

    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            model: self.model.clone().filter(|m| !m.trim().is_empty()),
            base_url: self.base_url.clone().filter(|u| !u.trim().is_empty()),
            timeout: self.request_timeout_secs.map(Duration::from_secs),
        }
    }

    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join(APP_DIR))
    }

    /// File backing the credential store
    pub fn storage_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("storage.json"))
    }

    pub fn log_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("chathub.log"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, Config::new());
        assert_eq!(config.provider(), Provider::Gemini);
    }

    #[test]
    fn save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sub").join("config.json");
        let config = Config {
            provider: Some("openai".to_string()),
            model: Some("gpt-4o".to_string()),
            base_url: Some("http://localhost:9000".to_string()),
            request_timeout_secs: Some(30),
        };

        config.save_to(&path).unwrap();
        let loaded = Config::load_from(&path).unwrap();

        assert_eq!(loaded, config);
        assert_eq!(loaded.provider(), Provider::OpenAI);
    }

    #[test]
    fn partial_file_leaves_other_fields_unset() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"provider":"openai"}"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.provider(), Provider::OpenAI);
        assert_eq!(config.model, None);
    }

    #[test]
    fn save_provider_keeps_other_settings_and_drops_model() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        Config {
            provider: Some("gemini".to_string()),
            model: Some("gemini-1.5-pro".to_string()),
            base_url: Some("http://proxy.local".to_string()),
            request_timeout_secs: Some(60),
        }
        .save_to(&path)
        .unwrap();

        Config::save_provider(&path, Provider::OpenAI).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.provider(), Provider::OpenAI);
        assert_eq!(loaded.model, None);
        assert_eq!(loaded.base_url, None);
        assert_eq!(loaded.request_timeout_secs, Some(60));
    }

    #[test]
    fn unknown_provider_falls_back_to_default() {
        let config = Config {
            provider: Some("ollama".to_string()),
            ..Config::new()
        };
        assert_eq!(config.provider(), Provider::Gemini);
    }

    fn gemini_pro_file() -> Config {
        Config {
            provider: Some("gemini".to_string()),
            model: Some("gemini-1.5-pro".to_string()),
            base_url: Some("http://gemini-proxy.local".to_string()),
            request_timeout_secs: Some(20),
        }
    }

    fn env(vars: &[(&str, &str)]) -> Overrides {
        let vars: Vec<(String, String)> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Overrides::from_lookup(|name| {
            vars.iter().find(|(k, _)| k == name).map(|(_, v)| v.clone())
        })
        .unwrap()
    }

    #[test]
    fn env_overrides_are_read_by_name() {
        let overrides = env(&[
            ("CHATHUB_PROVIDER", "openai"),
            ("CHATHUB_MODEL", "gpt-4o"),
            ("CHATHUB_BASE_URL", "http://proxy.internal:8080"),
        ]);
        assert_eq!(
            overrides,
            Overrides {
                provider: Some(Provider::OpenAI),
                model: Some("gpt-4o".to_string()),
                base_url: Some("http://proxy.internal:8080".to_string()),
            }
        );

        assert_eq!(env(&[("CHATHUB_MODEL", "  ")]), Overrides::default());
    }

    #[test]
    fn unknown_provider_override_is_an_error() {
        let err = Overrides::from_parts(Some("ollama"), None, None).unwrap_err();
        assert!(err.to_string().contains("unknown provider 'ollama'"));
    }

    #[test]
    fn env_provider_change_drops_file_model_and_endpoint() {
        let mut config = gemini_pro_file();
        config.apply(&env(&[("CHATHUB_PROVIDER", "openai")]));

        assert_eq!(config.provider(), Provider::OpenAI);
        assert_eq!(config.model, None);
        assert_eq!(config.base_url, None);
        assert_eq!(config.request_timeout_secs, Some(20));
    }

    #[test]
    fn same_provider_keeps_file_model_and_endpoint() {
        let mut config = gemini_pro_file();
        config.apply(&env(&[("CHATHUB_PROVIDER", "gemini")]));

        assert_eq!(config, gemini_pro_file());
    }

    #[test]
    fn provider_change_keeps_env_model_and_endpoint() {
        let mut config = Config::new();
        config.apply(&env(&[
            ("CHATHUB_PROVIDER", "openai"),
            ("CHATHUB_MODEL", "gpt-4o"),
            ("CHATHUB_BASE_URL", "http://proxy.internal:8080"),
        ]));

        let options = config.client_options();
        assert_eq!(config.provider(), Provider::OpenAI);
        assert_eq!(options.model.as_deref(), Some("gpt-4o"));
        assert_eq!(options.base_url.as_deref(), Some("http://proxy.internal:8080"));
    }

    #[test]
    fn command_line_wins_over_env_which_wins_over_file() {
        let env = env(&[
            ("CHATHUB_MODEL", "gemini-1.5-flash-8b"),
            ("CHATHUB_BASE_URL", "http://proxy.internal:8080"),
        ]);
        let cli = Overrides::from_parts(None, Some("gemini-2.0-flash".to_string()), None).unwrap();

        let mut config = gemini_pro_file();
        config.apply(&env.layered(cli));

        assert_eq!(config.provider(), Provider::Gemini);
        assert_eq!(config.model.as_deref(), Some("gemini-2.0-flash"));
        assert_eq!(config.base_url.as_deref(), Some("http://proxy.internal:8080"));
        assert_eq!(config.request_timeout_secs, Some(20));
    }

    #[test]
    fn client_options_drop_blank_values() {
        let config = Config {
            model: Some("  ".to_string()),
            base_url: Some("http://127.0.0.1:1".to_string()),
            request_timeout_secs: Some(5),
            ..Config::new()
        };
        let options = config.client_options();
        assert_eq!(options.model, None);
        assert_eq!(options.base_url.as_deref(), Some("http://127.0.0.1:1"));
        assert_eq!(options.timeout, Some(Duration::from_secs(5)));
    }
}
