//! Claude messages adapter.

use crate::error::LlmError;
use crate::provider::{ChatProvider, LlmMessage, WireRole};
use crate::sse::{self, SsePayload};
use async_trait::async_trait;
use attune_core::LlmConfig;
use futures::stream::BoxStream;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const BASE_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Adapter for the Claude messages API.
///
/// Claude requires the system prompt as a top-level field rather than inside
/// the message array, so the adapter hoists it out. Streaming delivers
/// `content_block_delta` events and terminates on `message_stop`.
#[derive(Clone)]
pub struct ClaudeProvider {
    client: Client,
    base_url: String,
}

impl Default for ClaudeProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ClaudeProvider {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            base_url: BASE_URL.to_string(),
        }
    }

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
            .header("x-api-key", &config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&request_body(messages, config, stream)))
    }

    fn parse_stream_payload(payload: &str) -> SsePayload {
        let Ok(event) = serde_json::from_str::<StreamEvent>(payload) else {
            return SsePayload::Ignore;
        };
        match event.r#type.as_str() {
            "content_block_delta" => match event.delta.and_then(|d| d.text) {
                Some(text) => SsePayload::Delta(text),
                None => SsePayload::Ignore,
            },
            "message_stop" => SsePayload::Done,
            _ => SsePayload::Ignore,
        }
    }
}

#[async_trait]
impl ChatProvider for ClaudeProvider {
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

        let parsed: MessagesResponse =
            response.json().await.map_err(|_| LlmError::InvalidResponse)?;
        parsed
            .content
            .into_iter()
            .find(|block| block.r#type == "text")
            .and_then(|block| block.text)
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

fn request_body(messages: &[LlmMessage], config: &LlmConfig, stream: bool) -> MessagesRequest {
    // System prompt is a top-level field, not a message.
    let system = messages
        .iter()
        .find(|m| m.role == WireRole::System)
        .map(|m| m.content.clone());

    let conversation = messages
        .iter()
        .filter(|m| m.role != WireRole::System)
        .map(|m| WireMessage {
            role: m.role.as_str().to_string(),
            content: m.content.clone(),
        })
        .collect();

    MessagesRequest {
        model: config.model.clone(),
        messages: conversation,
        temperature: config.temperature,
        max_tokens: config.max_tokens,
        stream,
        system,
    }
}

#[derive(Serialize)]
struct MessagesRequest {
    model: String,
    messages: Vec<WireMessage>,
    temperature: f64,
    max_tokens: u32,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
}

#[derive(Serialize)]
struct WireMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    r#type: String,
    text: Option<String>,
}

#[derive(Deserialize)]
struct StreamEvent {
    r#type: String,
    delta: Option<StreamDelta>,
}

#[derive(Deserialize)]
struct StreamDelta {
    text: Option<String>,
}
