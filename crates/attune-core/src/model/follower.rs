//! Follower (end-user) profile.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackStyle {
    Gentle,
    Direct,
}

impl FeedbackStyle {
    /// Human-readable label used in the prompt's follower section.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Gentle => "Gentle & reflective",
            Self::Direct => "Direct & practical",
        }
    }
}

/// At most one per user. Used for framing and tone only, never quoted back
/// to the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowerProfile {
    pub id: Uuid,
    pub help_areas: Vec<String>,
    pub feedback_style: FeedbackStyle,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FollowerProfile {
    pub fn new(help_areas: Vec<String>, feedback_style: FeedbackStyle) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            help_areas,
            feedback_style,
            note: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}
