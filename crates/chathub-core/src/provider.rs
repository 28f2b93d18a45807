#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Provider {
    #[default]
    Gemini,
    OpenAI,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Gemini => "gemini",
            Provider::OpenAI => "openai",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "gemini" | "google" => Some(Provider::Gemini),
            "openai" | "chatgpt" => Some(Provider::OpenAI),
            _ => None,
        }
    }

    pub fn all() -> Vec<Provider> {
        vec![Provider::Gemini, Provider::OpenAI]
    }

    /// The provider after this one, wrapping around
    pub fn next(&self) -> Provider {
        match self {
            Provider::Gemini => Provider::OpenAI,
            Provider::OpenAI => Provider::Gemini,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Provider::Gemini => "Google Gemini",
            Provider::OpenAI => "OpenAI",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::Gemini => "gemini-1.5-flash",
            Provider::OpenAI => "gpt-4o-mini",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Provider::Gemini => "https://generativelanguage.googleapis.com",
            Provider::OpenAI => "https://api.openai.com",
        }
    }

    /// Environment variable that may carry the API key
    pub fn key_env_var(&self) -> &'static str {
        match self {
            Provider::Gemini => "GEMINI_API_KEY",
            Provider::OpenAI => "OPENAI_API_KEY",
        }
    }

    pub fn greeting(&self) -> String {
        format!(
            "Hello! I'm an AI assistant powered by {}. How can I help you today?",
            self.display_name()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_names_case_insensitively() {
        assert_eq!(Provider::from_str("Gemini"), Some(Provider::Gemini));
        assert_eq!(Provider::from_str(" OPENAI "), Some(Provider::OpenAI));
        assert_eq!(Provider::from_str("ollama"), None);
    }

    #[test]
    fn as_str_round_trips_for_every_provider() {
        for provider in Provider::all() {
            assert_eq!(Provider::from_str(provider.as_str()), Some(provider));
        }
    }

    #[test]
    fn next_cycles_through_all() {
        assert_eq!(Provider::Gemini.next(), Provider::OpenAI);
        assert_eq!(Provider::OpenAI.next(), Provider::Gemini);
    }
}
