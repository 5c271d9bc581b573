//! LLM interaction layer.
//!
//! One adapter per backend (OpenAI, Claude, Gemini), each translating a
//! backend-agnostic message list and generation config into that backend's
//! wire format, plus the [`CompletionClient`] that adds timeout, 429 backoff
//! and cancellation on top of whichever adapter is selected.

pub mod claude;
pub mod client;
pub mod error;
pub mod gemini;
pub mod openai;
pub mod provider;
pub mod sse;

pub use claude::ClaudeProvider;
pub use client::{CompletionClient, CompletionHandle};
pub use error::LlmError;
pub use gemini::GeminiProvider;
pub use openai::OpenAiProvider;
pub use provider::{ChatProvider, LlmMessage, WireRole, provider_for};
