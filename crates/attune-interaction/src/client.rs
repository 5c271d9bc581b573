//! Completion client with rate-limit retry and cancellable in-flight requests.

use crate::error::LlmError;
use crate::provider::{ChatProvider, LlmMessage, provider_for};
use attune_core::LlmConfig;
use futures::stream::BoxStream;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Retries beyond the initial attempt, applied only to HTTP 429 responses.
const MAX_RETRIES: usize = 3;

/// Backoff before retry attempt N.
const RETRY_DELAYS: [Duration; MAX_RETRIES] = [
    Duration::from_secs(2),
    Duration::from_secs(4),
    Duration::from_secs(8),
];

/// Wall-clock ceiling per individual attempt. A timed-out attempt surfaces
/// as a network error and is not retried.
const ATTEMPT_TIMEOUT: Duration = Duration::from_secs(60);

/// Sends conversation payloads to the configured provider.
///
/// Cheap to clone. The retry policy lives here rather than in the adapters
/// so every provider gets the same behavior.
#[derive(Clone)]
pub struct CompletionClient {
    provider: Arc<dyn ChatProvider>,
    config: LlmConfig,
}

impl CompletionClient {
    /// Builds a client from config, routing to the adapter for its provider.
    pub fn new(config: LlmConfig) -> Self {
        Self {
            provider: provider_for(config.provider),
            config,
        }
    }

    /// Builds a client over an explicit provider implementation.
    pub fn with_provider(provider: Arc<dyn ChatProvider>, config: LlmConfig) -> Self {
        Self { provider, config }
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    /// Requests a full completion, retrying on consecutive rate limits.
    ///
    /// Up to `MAX_RETRIES` retries with fixed backoff. Any non-429 error,
    /// including a per-attempt timeout, returns immediately.
    pub async fn complete(&self, messages: &[LlmMessage]) -> Result<String, LlmError> {
        let mut retries = 0;
        loop {
            let attempt = tokio::time::timeout(ATTEMPT_TIMEOUT, self.provider.send_message(messages, &self.config));
            let result = match attempt.await {
                Ok(result) => result,
                Err(_) => Err(LlmError::Network("request timed out".to_string())),
            };
            match result {
                Ok(text) => return Ok(text),
                Err(err) if err.is_rate_limited() && retries < MAX_RETRIES => {
                    let delay = RETRY_DELAYS[retries];
                    retries += 1;
                    warn!(retry = retries, delay_secs = delay.as_secs(), "rate limited, backing off");
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Opens a streaming completion. Deltas arrive as they are produced;
    /// rate limits are not retried mid-stream.
    pub fn stream(&self, messages: &[LlmMessage]) -> BoxStream<'static, Result<String, LlmError>> {
        self.provider.stream_message(messages, &self.config)
    }

    /// Spawns a completion that can be cancelled from another task.
    pub fn send(&self, messages: Vec<LlmMessage>) -> CompletionHandle {
        let client = self.clone();
        let token = CancellationToken::new();
        let task_token = token.clone();
        let task = tokio::spawn(async move {
            tokio::select! {
                _ = task_token.cancelled() => Err(LlmError::Cancelled),
                result = client.complete(&messages) => result,
            }
        });
        CompletionHandle { token, task }
    }
}

/// Handle to an in-flight completion.
pub struct CompletionHandle {
    token: CancellationToken,
    task: JoinHandle<Result<String, LlmError>>,
}

impl CompletionHandle {
    /// Signals the completion to stop. The awaiting side observes
    /// `LlmError::Cancelled`.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Waits for the completion to finish or be cancelled.
    pub async fn join(self) -> Result<String, LlmError> {
        self.task.await.unwrap_or(Err(LlmError::Cancelled))
    }
}
