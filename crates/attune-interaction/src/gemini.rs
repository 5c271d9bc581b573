//! Gemini generateContent adapter.

use crate::error::LlmError;
use crate::provider::{ChatProvider, LlmMessage, WireRole};
use crate::sse::{self, SsePayload};
use async_trait::async_trait;
use attune_core::LlmConfig;
use futures::stream::BoxStream;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Adapter for the Gemini REST API.
///
/// Gemini has no system role in the content array (the system message becomes
/// `systemInstruction`), maps `assistant` to `model`, and requires the first
/// conversational turn to be a user turn: any leading assistant messages are
/// folded into the system instruction instead.
#[derive(Clone)]
pub struct GeminiProvider {
    client: Client,
    base_url: String,
}

impl Default for GeminiProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl GeminiProvider {
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

    fn url(&self, config: &LlmConfig, stream: bool) -> String {
        let endpoint = if stream { "streamGenerateContent" } else { "generateContent" };
        let sse_param = if stream { "&alt=sse" } else { "" };
        format!(
            "{}/{}:{endpoint}?key={}{sse_param}",
            self.base_url, config.model, config.api_key
        )
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
            .post(self.url(config, stream))
            .header("Content-Type", "application/json")
            .json(&request_body(messages, config)))
    }

    fn parse_stream_payload(payload: &str) -> SsePayload {
        let Ok(chunk) = serde_json::from_str::<GenerateContentResponse>(payload) else {
            return SsePayload::Ignore;
        };
        match extract_text(chunk) {
            Some(text) => SsePayload::Delta(text),
            None => SsePayload::Ignore,
        }
    }
}

#[async_trait]
impl ChatProvider for GeminiProvider {
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

        let parsed: GenerateContentResponse =
            response.json().await.map_err(|_| LlmError::InvalidResponse)?;
        extract_text(parsed).ok_or(LlmError::InvalidResponse)
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

fn request_body(messages: &[LlmMessage], config: &LlmConfig) -> GenerateContentRequest {
    let mut system = messages
        .iter()
        .find(|m| m.role == WireRole::System)
        .map(|m| m.content.clone());

    let mut conversation: Vec<&LlmMessage> = messages
        .iter()
        .filter(|m| m.role != WireRole::System)
        .collect();

    // The first content entry must be a user turn; leading assistant turns
    // are folded into the system instruction.
    while let Some(first) = conversation.first() {
        if first.role != WireRole::Assistant {
            break;
        }
        let folded = conversation.remove(0);
        system = Some(match system {
            Some(existing) => format!("{existing}\n\n{}", folded.content),
            None => folded.content.clone(),
        });
    }

    GenerateContentRequest {
        contents: conversation
            .iter()
            .map(|m| Content {
                role: match m.role {
                    WireRole::Assistant => "model".to_string(),
                    _ => "user".to_string(),
                },
                parts: vec![Part { text: m.content.clone() }],
            })
            .collect(),
        generation_config: GenerationConfig {
            temperature: config.temperature,
            max_output_tokens: config.max_tokens,
        },
        system_instruction: system.map(|text| SystemInstruction {
            parts: vec![Part { text }],
        }),
    }
}

fn extract_text(response: GenerateContentResponse) -> Option<String> {
    response
        .candidates?
        .into_iter()
        .next()?
        .content?
        .parts
        .into_iter()
        .find_map(|part| part.text)
}

#[derive(Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
    #[serde(rename = "systemInstruction", skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemInstruction>,
}

#[derive(Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f64,
    max_output_tokens: u32,
}

#[derive(Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use attune_core::ProviderKind;
    use serde_json::json;

    fn config() -> LlmConfig {
        LlmConfig::for_provider(ProviderKind::Gemini, "g-key")
    }

    #[test]
    fn roles_map_to_user_and_model() {
        let messages = vec![
            LlmMessage::system("coach prompt"),
            LlmMessage::user("hi"),
            LlmMessage::assistant("hello"),
        ];
        let body = serde_json::to_value(request_body(&messages, &config())).unwrap();
        assert_eq!(
            body,
            json!({
                "contents": [
                    {"role": "user", "parts": [{"text": "hi"}]},
                    {"role": "model", "parts": [{"text": "hello"}]},
                ],
                "generationConfig": {"temperature": 0.7, "maxOutputTokens": 1024},
                "systemInstruction": {"parts": [{"text": "coach prompt"}]},
            })
        );
    }

    #[test]
    fn leading_assistant_turns_fold_into_the_system_instruction() {
        let messages = vec![
            LlmMessage::system("coach prompt"),
            LlmMessage::assistant("welcome back"),
            LlmMessage::user("thanks"),
        ];
        let body = serde_json::to_value(request_body(&messages, &config())).unwrap();
        assert_eq!(
            body["systemInstruction"]["parts"][0]["text"],
            json!("coach prompt\n\nwelcome back")
        );
        assert_eq!(body["contents"][0]["role"], json!("user"));
        assert_eq!(body["contents"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn stream_url_requests_sse() {
        let provider = GeminiProvider::new();
        let url = provider.url(&config(), true);
        assert!(url.ends_with(":streamGenerateContent?key=g-key&alt=sse"));
        let url = provider.url(&config(), false);
        assert!(url.ends_with(":generateContent?key=g-key"));
    }

    #[test]
    fn stream_payload_parsing() {
        let payload = r#"{"candidates":[{"content":{"parts":[{"text":"Hi"}]}}]}"#;
        assert!(matches!(
            GeminiProvider::parse_stream_payload(payload),
            SsePayload::Delta(text) if text == "Hi"
        ));
        assert!(matches!(
            GeminiProvider::parse_stream_payload(r#"{"candidates":[]}"#),
            SsePayload::Ignore
        ));
    }
}
