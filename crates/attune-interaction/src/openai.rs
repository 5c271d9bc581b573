//! OpenAI chat completions adapter.

use crate::error::LlmError;
use crate::provider::{ChatProvider, LlmMessage};
use crate::sse::{self, SsePayload};
use async_trait::async_trait;
use attune_core::LlmConfig;
use futures::stream::BoxStream;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const BASE_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Adapter for the OpenAI chat completions API. Roles pass through
/// unchanged; streaming ends on the `[DONE]` literal.
#[derive(Clone)]
pub struct OpenAiProvider {
    client: Client,
    base_url: String,
}

impl Default for OpenAiProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl OpenAiProvider {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            base_url: BASE_URL.to_string(),
        }
    }

    /// Overrides the endpoint, for OpenAI-compatible gateways.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn request(
        &self,
        messages: &[LlmMessage],
        config: &LlmConfig,
        stream: bool,
    ) -> Result<reqwest::RequestBuilder, LlmError> {
        if config.api_key.is_empty() {
            return Err(LlmError::InvalidApiKey);
        }
        Ok(self
            .client
            .post(&self.base_url)
            .header("Authorization", format!("Bearer {}", config.api_key))
            .header("Content-Type", "application/json")
            .json(&request_body(messages, config, stream)))
    }

    fn parse_stream_payload(payload: &str) -> SsePayload {
        if payload == "[DONE]" {
            return SsePayload::Done;
        }
        let Ok(chunk) = serde_json::from_str::<StreamChunk>(payload) else {
            return SsePayload::Ignore;
        };
        match chunk.choices.into_iter().next().and_then(|c| c.delta.content) {
            Some(text) => SsePayload::Delta(text),
            None => SsePayload::Ignore,
        }
    }
}

#[async_trait]
impl ChatProvider for OpenAiProvider {
    async fn send_message(
        &self,
        messages: &[LlmMessage],
        config: &LlmConfig,
    ) -> Result<String, LlmError> {
        let response = self
            .request(messages, config, false)?
            .send()
            .await
            .map_err(LlmError::network)?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(LlmError::Api { status: status.as_u16(), message });
        }

        let parsed: ChatResponse = response.json().await.map_err(|_| LlmError::InvalidResponse)?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(LlmError::InvalidResponse)
    }

    fn stream_message(
        &self,
        messages: &[LlmMessage],
        config: &LlmConfig,
    ) -> BoxStream<'static, Result<String, LlmError>> {
        match self.request(messages, config, true) {
            Ok(request) => sse::text_stream(request, Self::parse_stream_payload),
            Err(err) => Box::pin(futures::stream::once(async move { Err(err) })),
        }
    }
}

fn request_body(messages: &[LlmMessage], config: &LlmConfig, stream: bool) -> ChatRequest {
    ChatRequest {
        model: config.model.clone(),
        messages: messages
            .iter()
            .map(|m| WireMessage {
                role: m.role.as_str().to_string(),
                content: m.content.clone(),
            })
            .collect(),
        temperature: config.temperature,
        max_tokens: config.max_tokens,
        stream,
    }
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<WireMessage>,
    temperature: f64,
    max_tokens: u32,
    stream: bool,
}

#[derive(Serialize)]
struct WireMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Deserialize)]
struct StreamDelta {
    content: Option<String>,
}
