//! Wire-level error taxonomy for LLM requests.

use attune_core::text::truncate;
use thiserror::Error;

/// Errors produced by provider adapters and the completion client.
///
/// Adapters classify and propagate, never swallow. The completion client
/// absorbs only the 429-retry case; everything else passes through unchanged.
#[derive(Error, Debug, Clone)]
pub enum LlmError {
    /// Missing/empty credential. Fatal for the request, never retried.
    #[error("API key is missing or invalid")]
    InvalidApiKey,

    /// Malformed or unexpected payload shape. Fatal for the request.
    #[error("Received an invalid response from the API")]
    InvalidResponse,

    /// Non-2xx HTTP response. Retried only for status 429.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Transport-level failure.
    #[error("Network error: {0}")]
    Network(String),

    /// Mid-stream failure. Partial content already delivered is kept.
    #[error("Streaming error: {0}")]
    Streaming(String),

    /// The request was cancelled by the caller. Never surfaced to the user.
    #[error("Request cancelled")]
    Cancelled,
}

impl LlmError {
    /// Classifies a reqwest transport failure.
    pub fn network(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }

    /// Whether this is the one error the completion client retries.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::Api { status: 429, .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// User-visible rendering. Raw API messages are truncated so a provider
    /// error body never floods the transcript.
    pub fn user_message(&self) -> String {
        match self {
            Self::Api { status: 429, .. } => {
                "Rate limited — please wait a moment and try again".to_string()
            }
            other => truncate(&other.to_string(), 200),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_detection() {
        assert!(LlmError::Api { status: 429, message: String::new() }.is_rate_limited());
        assert!(!LlmError::Api { status: 500, message: String::new() }.is_rate_limited());
        assert!(!LlmError::Network("down".into()).is_rate_limited());
    }

    #[test]
    fn long_api_messages_are_truncated_for_users() {
        let err = LlmError::Api {
            status: 500,
            message: "x".repeat(400),
        };
        assert!(err.user_message().len() <= 220);
    }
}
