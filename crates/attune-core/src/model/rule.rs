//! Rules of engagement.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The category a rule belongs to.
///
/// Only `Boundary` rules participate in the keyword stage of risk assessment;
/// the rest are deferred to the model's contextual judgment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleCategory {
    Behavior,
    Tone,
    Boundary,
    Scope,
}

impl RuleCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Behavior => "behavior",
            Self::Tone => "tone",
            Self::Boundary => "boundary",
            Self::Scope => "scope",
        }
    }
}

/// A configured constraint on the coach's behavior.
///
/// Rules are mutable through the surrounding application (toggled, added,
/// deleted) and must be read fresh for every assessment and prompt build.
/// Lower priority means higher precedence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub category: RuleCategory,
    pub priority: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Rule {
    pub fn new(
        title: impl Into<String>,
        content: impl Into<String>,
        category: RuleCategory,
        priority: i32,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            content: content.into(),
            category,
            priority,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}
