//! Guardrail audit records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which stage of the risk assessment flagged the turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    RuleBased,
    LlmDetected,
}

impl TriggerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RuleBased => "rule_based",
            Self::LlmDetected => "llm_detected",
        }
    }
}

/// Append-only audit record written once per flagged turn, after the
/// assistant response completes. Never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardrailLog {
    pub id: Uuid,
    pub session_id: Uuid,
    pub topic_slug: String,
    pub trigger_type: TriggerType,
    pub rule_title: Option<String>,
    /// User message excerpt, truncated to 200 characters.
    pub user_excerpt: String,
    /// Assistant response excerpt, truncated to 500 characters.
    pub assistant_excerpt: String,
    pub created_at: DateTime<Utc>,
}

impl GuardrailLog {
    pub fn new(
        session_id: Uuid,
        topic_slug: impl Into<String>,
        trigger_type: TriggerType,
        rule_title: Option<String>,
        user_excerpt: impl Into<String>,
        assistant_excerpt: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id,
            topic_slug: topic_slug.into(),
            trigger_type,
            rule_title,
            user_excerpt: user_excerpt.into(),
            assistant_excerpt: assistant_excerpt.into(),
            created_at: Utc::now(),
        }
    }
}
