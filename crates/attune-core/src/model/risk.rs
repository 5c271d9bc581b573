//! Risk assessment results.

use super::guardrail::TriggerType;
use super::rule::Rule;
use serde::{Deserialize, Serialize};

/// Transient result of assessing one user turn. Produced fresh per turn,
/// never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub is_flagged: bool,
    pub trigger_type: Option<TriggerType>,
    pub matched_rule: Option<Rule>,
    pub explanation: Option<String>,
}

impl RiskAssessment {
    /// Sentinel "nothing flagged" result.
    pub fn safe() -> Self {
        Self {
            is_flagged: false,
            trigger_type: None,
            matched_rule: None,
            explanation: None,
        }
    }

    pub fn flagged(
        trigger_type: TriggerType,
        matched_rule: Option<Rule>,
        explanation: impl Into<String>,
    ) -> Self {
        Self {
            is_flagged: true,
            trigger_type: Some(trigger_type),
            matched_rule,
            explanation: Some(explanation.into()),
        }
    }
}
