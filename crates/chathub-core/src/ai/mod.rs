pub mod gemini;
pub mod openai;

pub use gemini::GeminiClient;
pub use openai::OpenAIClient;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use futures_util::future::BoxFuture;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::error::ProviderError;
use crate::provider::Provider;
use crate::state::Message;

/// Fixed generation parameters shared by both request shapes
pub const TEMPERATURE: f64 = 0.7;
pub const MAX_OUTPUT_TOKENS: u32 = 1000;

/// One request/response exchange with an LLM HTTP API.
///
/// `history` is the log as it stood before the user's `text` was appended.
/// Implementations decide whether to send it.
pub trait ChatProvider: Send + Sync {
    fn provider(&self) -> Provider;

    fn model(&self) -> &str;

    fn complete<'a>(
        &'a self,
        api_key: &'a str,
        history: &'a [Message],
        text: &'a str,
    ) -> BoxFuture<'a, Result<String, ProviderError>>;
}

/// Where and how to reach a provider. `None` fields fall back to the
/// provider's defaults.
#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub timeout: Option<Duration>,
}

/// Build the client for `provider`
pub fn client_for(provider: Provider, options: &ClientOptions) -> Result<Arc<dyn ChatProvider>> {
    let http = http_client(options.timeout)?;
    let model = options
        .model
        .clone()
        .unwrap_or_else(|| provider.default_model().to_string());
    let base_url = options
        .base_url
        .clone()
        .unwrap_or_else(|| provider.default_base_url().to_string());

    let client: Arc<dyn ChatProvider> = match provider {
        Provider::Gemini => Arc::new(GeminiClient::with_client(http, &base_url, &model)),
        Provider::OpenAI => Arc::new(OpenAIClient::with_client(http, &base_url, &model)),
    };
    Ok(client)
}

fn http_client(timeout: Option<Duration>) -> Result<Client> {
    match timeout {
        Some(timeout) => Ok(Client::builder().timeout(timeout).build()?),
        None => Ok(Client::new()),
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<ErrorDetail>,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: Option<String>,
}

/// The server's `error.message`, or a generic line naming the status
fn error_message(provider: Provider, status: StatusCode, body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.error)
        .and_then(|e| e.message)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| {
            format!(
                "Failed to get response from {} (HTTP {})",
                provider.display_name(),
                status.as_u16()
            )
        })
}

/// Read the body, turning a non-success status into [`ProviderError::Status`]
async fn read_body(provider: Provider, response: reqwest::Response) -> Result<String, ProviderError> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(ProviderError::Status {
            status: status.as_u16(),
            message: error_message(provider, status, &body),
        });
    }

    Ok(body)
}

fn trim_base_url(base_url: &str) -> String {
    base_url.trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_message_prefers_server_message() {
        let body = r#"{"error":{"code":400,"message":"API key not valid.","status":"INVALID_ARGUMENT"}}"#;
        let msg = error_message(Provider::Gemini, StatusCode::BAD_REQUEST, body);
        assert_eq!(msg, "API key not valid.");
    }

    #[test]
    fn error_message_falls_back_when_body_is_not_json() {
        let msg = error_message(Provider::OpenAI, StatusCode::BAD_GATEWAY, "<html>bad gateway</html>");
        assert_eq!(msg, "Failed to get response from OpenAI (HTTP 502)");
    }

    #[test]
    fn error_message_falls_back_when_message_is_missing() {
        let msg = error_message(Provider::Gemini, StatusCode::FORBIDDEN, r#"{"error":{}}"#);
        assert_eq!(msg, "Failed to get response from Google Gemini (HTTP 403)");
    }

    #[test]
    fn client_for_uses_provider_defaults() {
        let client = client_for(Provider::OpenAI, &ClientOptions::default()).unwrap();
        assert_eq!(client.provider(), Provider::OpenAI);
        assert_eq!(client.model(), "gpt-4o-mini");

        let options = ClientOptions {
            model: Some("gemini-1.5-pro".to_string()),
            ..Default::default()
        };
        let client = client_for(Provider::Gemini, &options).unwrap();
        assert_eq!(client.provider(), Provider::Gemini);
        assert_eq!(client.model(), "gemini-1.5-pro");
    }

    #[test]
    fn base_url_loses_trailing_slashes() {
        assert_eq!(trim_base_url("http://localhost:8080/"), "http://localhost:8080");
        assert_eq!(trim_base_url("https://api.openai.com"), "https://api.openai.com");
    }
}
