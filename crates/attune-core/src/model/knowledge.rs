//! Structured coaching knowledge.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The role a knowledge object plays in the prompt stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KnowledgeRole {
    Knowledge,
    PersonaSignal,
    BoundaryRisk,
}

impl KnowledgeRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Knowledge => "knowledge",
            Self::PersonaSignal => "persona_signal",
            Self::BoundaryRisk => "boundary_risk",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "knowledge" => Some(Self::Knowledge),
            "persona_signal" => Some(Self::PersonaSignal),
            "boundary_risk" => Some(Self::BoundaryRisk),
            _ => None,
        }
    }
}

/// A structured coaching idea extracted from raw source material.
/// Belongs to exactly one topic, identified by slug.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeObject {
    pub id: Uuid,
    pub topic_slug: String,
    pub core_idea: String,
    pub when_to_use: String,
    /// Ordered practical guidelines, rendered semicolon-joined in the prompt.
    pub heuristics: Vec<String>,
    /// Ordered anti-patterns, rendered semicolon-joined in the prompt.
    pub what_to_avoid: Vec<String>,
    pub source_reference: String,
    pub role: KnowledgeRole,
    pub created_at: DateTime<Utc>,
}

impl KnowledgeObject {
    pub fn new(
        topic_slug: impl Into<String>,
        core_idea: impl Into<String>,
        when_to_use: impl Into<String>,
        heuristics: Vec<String>,
        what_to_avoid: Vec<String>,
        source_reference: impl Into<String>,
        role: KnowledgeRole,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            topic_slug: topic_slug.into(),
            core_idea: core_idea.into(),
            when_to_use: when_to_use.into(),
            heuristics,
            what_to_avoid,
            source_reference: source_reference.into(),
            role,
            created_at: Utc::now(),
        }
    }
}
