//! Session events.
//!
//! The orchestrator publishes explicit state transitions through a channel of
//! these events; the presentation layer consumes them instead of observing
//! mutable session state.

use crate::model::{ChatMessage, RiskAssessment};
use serde::{Deserialize, Serialize};

/// High-level events emitted over the course of a coaching session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    /// The session greeting, shown before an intent is chosen.
    Greeting { text: String },
    /// A user message was accepted and persisted.
    UserMessage { message: ChatMessage },
    /// A streamed text delta for the in-flight assistant response.
    AssistantDelta { generation: u64, text: String },
    /// The assistant response completed and was persisted.
    AssistantCompleted { generation: u64, message: ChatMessage },
    /// The latest user turn was flagged by the risk assessor.
    RiskFlagged { assessment: RiskAssessment },
    /// A user-visible failure. Cancellations are never reported here.
    Error { message: String },
    /// Wrap-up summary produced while closing the session.
    WrapUp { takeaway: String, next_step: String },
    /// Terminal event; the session record is closed and persisted.
    SessionClosed,
}
