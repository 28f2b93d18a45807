use futures_util::future::BoxFuture;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{read_body, trim_base_url, ChatProvider, MAX_OUTPUT_TOKENS, TEMPERATURE};
use crate::error::ProviderError;
use crate::provider::Provider;
use crate::state::Message;

pub const SYSTEM_PROMPT: &str = "You are a helpful assistant. Keep your answers concise and accurate.";

#[derive(Serialize)]
struct OpenAIMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: Option<OpenAIResponseMessage>,
}

#[derive(Deserialize)]
struct OpenAIResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Option<Vec<OpenAIChoice>>,
}

/// Multi-turn client for the chat-completions endpoint. The whole prior
/// conversation goes out with every request.
#[derive(Clone)]
pub struct OpenAIClient {
    client: Client,
    base_url: String,
    model: String,
}

impl OpenAIClient {
    pub fn new(base_url: &str, model: &str) -> Self {
        Self::with_client(Client::new(), base_url, model)
    }

    pub fn with_client(client: Client, base_url: &str, model: &str) -> Self {
        Self {
            client,
            base_url: trim_base_url(base_url),
            model: model.to_string(),
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }

    pub async fn query(
        &self,
        api_key: &str,
        history: &[Message],
        prompt: &str,
    ) -> Result<String, ProviderError> {
        let request = build_request(&self.model, history, prompt);

        debug!(
            model = %self.model,
            messages = request.messages.len(),
            "sending OpenAI chat completion request"
        );

        let response = self
            .client
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        let body = read_body(Provider::OpenAI, response).await?;
        parse_response(&body)
    }
}

impl ChatProvider for OpenAIClient {
    fn provider(&self) -> Provider {
        Provider::OpenAI
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn complete<'a>(
        &'a self,
        api_key: &'a str,
        history: &'a [Message],
        text: &'a str,
    ) -> BoxFuture<'a, Result<String, ProviderError>> {
        Box::pin(self.query(api_key, history, text))
    }
}

fn build_request(model: &str, history: &[Message], prompt: &str) -> OpenAIRequest {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(OpenAIMessage {
        role: "system".to_string(),
        content: SYSTEM_PROMPT.to_string(),
    });
    messages.extend(history.iter().map(|m| OpenAIMessage {
        role: m.sender.as_role().to_string(),
        content: m.text.clone(),
    }));
    messages.push(OpenAIMessage {
        role: "user".to_string(),
        content: prompt.to_string(),
    });

    OpenAIRequest {
        model: model.to_string(),
        messages,
        temperature: TEMPERATURE,
        max_tokens: MAX_OUTPUT_TOKENS,
    }
}

/// Extract `choices[0].message.content`
fn parse_response(body: &str) -> Result<String, ProviderError> {
    let response: OpenAIResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::Malformed(format!("invalid JSON from OpenAI: {}", e)))?;

    response
        .choices
        .and_then(|c| c.into_iter().next())
        .and_then(|c| c.message)
        .and_then(|m| m.content)
        .ok_or_else(|| ProviderError::Malformed("missing choices[0].message.content".to_string()))
}
