//! Backend-agnostic provider contract.

use crate::claude::ClaudeProvider;
use crate::error::LlmError;
use crate::gemini::GeminiProvider;
use crate::openai::OpenAiProvider;
use async_trait::async_trait;
use attune_core::{LlmConfig, ProviderKind};
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Role of a message on the wire. Separate from the persisted
/// `MessageRole`: system prompts exist only at this level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireRole {
    System,
    User,
    Assistant,
}

impl WireRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// A single backend-agnostic chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmMessage {
    pub role: WireRole,
    pub content: String,
}

impl LlmMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: WireRole::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: WireRole::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: WireRole::Assistant, content: content.into() }
    }
}

/// One adapter per LLM backend.
///
/// Implementations hold no state between calls beyond a reusable HTTP client;
/// each invocation is one outbound request (or one long-lived streamed
/// connection).
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Sends the message list and resolves to the complete response text.
    async fn send_message(
        &self,
        messages: &[LlmMessage],
        config: &LlmConfig,
    ) -> Result<String, LlmError>;

    /// Opens a streamed connection and yields text deltas that concatenate
    /// to the full response. The stream ends cleanly on the backend's done
    /// signal and stops producing items when dropped.
    fn stream_message(
        &self,
        messages: &[LlmMessage],
        config: &LlmConfig,
    ) -> BoxStream<'static, Result<String, LlmError>>;
}

/// Strategy selection: the adapter for a configured backend.
pub fn provider_for(kind: ProviderKind) -> Arc<dyn ChatProvider> {
    match kind {
        ProviderKind::OpenAi => Arc::new(OpenAiProvider::new()),
        ProviderKind::Claude => Arc::new(ClaudeProvider::new()),
        ProviderKind::Gemini => Arc::new(GeminiProvider::new()),
    }
}
