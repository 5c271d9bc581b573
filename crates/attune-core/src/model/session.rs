//! Chat sessions and messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// The user's stated purpose for a session.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SessionIntent {
    Clarity,
    Direction,
    NextStep,
    ThinkingOutLoud,
}

impl SessionIntent {
    pub const ALL: [SessionIntent; 4] = [
        Self::Clarity,
        Self::Direction,
        Self::NextStep,
        Self::ThinkingOutLoud,
    ];

    /// Short title shown to the user; persisted as their choice when an
    /// intent is selected.
    pub fn title(&self) -> &'static str {
        match self {
            Self::Clarity => "Clarity",
            Self::Direction => "Direction",
            Self::NextStep => "A next step",
            Self::ThinkingOutLoud => "Thinking out loud",
        }
    }

    /// Display phrase used inside the Topic Context prompt section.
    pub fn display_phrase(&self) -> &'static str {
        match self {
            Self::Clarity => "Clarity — seeing things more clearly",
            Self::Direction => "Direction — help choosing a path",
            Self::NextStep => "A concrete next step",
            Self::ThinkingOutLoud => "Space to think out loud",
        }
    }
}

/// The author of a persisted chat message.
///
/// Prompt-level system messages are a wire concern and never persisted, so
/// there is no `System` variant here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// A single coaching conversation.
///
/// Created when a topic is selected; the intent is set when the user chooses
/// one; closed at wrap-up when `ended_at`, `takeaway` and `next_step` are
/// populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: Uuid,
    pub topic_slug: String,
    pub intent: Option<SessionIntent>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub takeaway: Option<String>,
    pub next_step: Option<String>,
}

impl ChatSession {
    pub fn new(topic_slug: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            topic_slug: topic_slug.into(),
            intent: None,
            started_at: Utc::now(),
            ended_at: None,
            takeaway: None,
            next_step: None,
        }
    }
}

/// A single message in a session's transcript.
///
/// Assistant messages are created empty and grow monotonically while the
/// response streams; user messages are created fully formed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub session_id: Uuid,
    pub role: MessageRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub risk_flagged: bool,
}

impl ChatMessage {
    pub fn new(session_id: Uuid, role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id,
            role,
            content: content.into(),
            created_at: Utc::now(),
            risk_flagged: false,
        }
    }

    pub fn user(session_id: Uuid, content: impl Into<String>) -> Self {
        Self::new(session_id, MessageRole::User, content)
    }

    pub fn assistant(session_id: Uuid, content: impl Into<String>) -> Self {
        Self::new(session_id, MessageRole::Assistant, content)
    }
}
