use futures_util::future::BoxFuture;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{read_body, trim_base_url, ChatProvider, MAX_OUTPUT_TOKENS, TEMPERATURE};
use crate::error::ProviderError;
use crate::provider::Provider;
use crate::state::Message;

const TOP_P: f64 = 0.8;
const TOP_K: u32 = 40;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f64,
    max_output_tokens: u32,
    top_p: f64,
    top_k: u32,
}

#[derive(Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiResponseContent>,
}

#[derive(Deserialize)]
struct GeminiResponseContent {
    parts: Option<Vec<GeminiResponsePart>>,
}

#[derive(Deserialize)]
struct GeminiResponsePart {
    text: Option<String>,
}

/// Single-turn client for the `generateContent` endpoint. Only the current
/// prompt is sent; earlier turns are not part of the request.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    base_url: String,
    model: String,
}

impl GeminiClient {
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
        format!("{}/v1/models/{}:generateContent", self.base_url, self.model)
    }

    pub async fn query(&self, api_key: &str, prompt: &str) -> Result<String, ProviderError> {
        let request = build_request(prompt);

        debug!(model = %self.model, "sending Gemini generateContent request");

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", api_key)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        let body = read_body(Provider::Gemini, response).await?;
        parse_response(&body)
    }
}

impl ChatProvider for GeminiClient {
    fn provider(&self) -> Provider {
        Provider::Gemini
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn complete<'a>(
        &'a self,
        api_key: &'a str,
        _history: &'a [Message],
        text: &'a str,
    ) -> BoxFuture<'a, Result<String, ProviderError>> {
        Box::pin(self.query(api_key, text))
    }
}

fn build_request(prompt: &str) -> GeminiRequest {
    GeminiRequest {
        contents: vec![GeminiContent {
            parts: vec![GeminiPart {
                text: prompt.to_string(),
            }],
        }],
        generation_config: GenerationConfig {
            temperature: TEMPERATURE,
            max_output_tokens: MAX_OUTPUT_TOKENS,
            top_p: TOP_P,
            top_k: TOP_K,
        },
    }
}

/// Extract `candidates[0].content.parts[0].text`
fn parse_response(body: &str) -> Result<String, ProviderError> {
    let response: GeminiResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::Malformed(format!("invalid JSON from Gemini: {}", e)))?;

    response
        .candidates
        .and_then(|c| c.into_iter().next())
        .and_then(|c| c.content)
        .and_then(|c| c.parts)
        .and_then(|p| p.into_iter().next())
        .and_then(|p| p.text)
        .ok_or_else(|| {
            ProviderError::Malformed("missing candidates[0].content.parts[0].text".to_string())
        })
}
