//! Two-stage risk assessment for user turns.
//!
//! Stage one is a pure keyword scan against boundary rules and runs on every
//! turn. Stage two asks the model to classify the message against the active
//! rules, and only runs when stage one found nothing and a configured client
//! is available. A stage-two failure is logged and treated as "not flagged";
//! assessment never blocks a conversation.

use attune_core::model::{RiskAssessment, Rule, RuleCategory, TriggerType};
use attune_interaction::{CompletionClient, LlmMessage};
use tracing::warn;

const MENTAL_HEALTH_KEYWORDS: &[&str] = &[
    "diagnose me",
    "am i depressed",
    "do i have anxiety",
    "do i have adhd",
    "mental illness",
    "psychiatric",
    "bipolar",
    "schizophreni",
    "suicid",
    "self-harm",
    "kill myself",
    "end my life",
    "want to die",
];

const FINANCIAL_LEGAL_KEYWORDS: &[&str] = &[
    "should i invest",
    "stock pick",
    "tax advice",
    "legal advice",
    "sue",
    "lawyer",
    "lawsuit",
    "which stocks",
    "crypto invest",
    "financial plan",
    "retirement fund",
];

const CERTAINTY_KEYWORDS: &[&str] = &[
    "guarantee",
    "promise me",
    "100%",
    "will definitely",
    "can you assure",
    "is it certain",
];

/// Assesses one user message against a snapshot of the active rules.
///
/// Rules are passed in rather than fetched so callers control freshness;
/// the orchestrator re-reads them every turn.
pub struct RiskAssessor {
    rules: Vec<Rule>,
}

impl RiskAssessor {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// Runs both stages. The client is optional; without one (or with an
    /// unconfigured one) the assessment is keyword-only.
    pub async fn assess(
        &self,
        user_message: &str,
        client: Option<&CompletionClient>,
    ) -> RiskAssessment {
        if let Some(assessment) = self.assess_rule_based(user_message) {
            return assessment;
        }

        if let Some(client) = client {
            if client.is_configured() {
                if let Some(assessment) = self.assess_with_model(user_message, client).await {
                    return assessment;
                }
            }
        }

        RiskAssessment::safe()
    }

    /// Stage one: case-insensitive substring scan. First match wins.
    pub fn assess_rule_based(&self, user_message: &str) -> Option<RiskAssessment> {
        let lowercased = user_message.to_lowercase();

        for rule in self.rules.iter().filter(|r| r.is_active) {
            for keyword in keywords_for_rule(rule) {
                if lowercased.contains(keyword) {
                    return Some(RiskAssessment::flagged(
                        TriggerType::RuleBased,
                        Some(rule.clone()),
                        format!(
                            "Message contains '{keyword}' which may approach the boundary: {}",
                            rule.title
                        ),
                    ));
                }
            }
        }

        None
    }

    /// Stage two: model classification against the active rules.
    async fn assess_with_model(
        &self,
        user_message: &str,
        client: &CompletionClient,
    ) -> Option<RiskAssessment> {
        let boundaries = self
            .rules
            .iter()
            .filter(|r| r.is_active)
            .map(|r| format!("- {}: {}", r.title, r.content))
            .collect::<Vec<_>>()
            .join("\n");

        let prompt = format!(
            "You are a safety classifier for an AI coaching system. Analyze the following user message and determine if it approaches any of these boundaries:\n\nBOUNDARIES:\n{boundaries}\n\nUSER MESSAGE:\n{user_message}\n\nRespond with EXACTLY one of:\nSAFE - if the message does not approach any boundary\nFLAGGED|<rule_title>|<brief_explanation> - if it does\n\nExamples:\nSAFE\nFLAGGED|No mental health diagnosis|User appears to be describing symptoms of depression and seeking diagnosis"
        );

        let messages = vec![
            LlmMessage::system(
                "You are a concise safety classifier. Respond in the exact format specified.",
            ),
            LlmMessage::user(prompt),
        ];

        match client.complete(&messages).await {
            Ok(response) => self.parse_model_assessment(&response),
            Err(err) => {
                warn!(error = %err, "risk classification failed, treating turn as safe");
                None
            }
        }
    }

    fn parse_model_assessment(&self, response: &str) -> Option<RiskAssessment> {
        let trimmed = response.trim();
        let upper = trimmed.to_uppercase();

        if upper.starts_with("SAFE") {
            return None;
        }

        if upper.starts_with("FLAGGED") {
            let parts: Vec<&str> = trimmed.split('|').collect();
            let rule_title = parts.get(1).map(|p| p.trim());
            let explanation = parts
                .get(2)
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty());

            let matched_rule = rule_title.and_then(|title| {
                self.rules
                    .iter()
                    .find(|r| r.title.eq_ignore_ascii_case(title))
                    .cloned()
            });

            return Some(RiskAssessment {
                is_flagged: true,
                trigger_type: Some(TriggerType::LlmDetected),
                matched_rule,
                explanation,
            });
        }

        None
    }
}

/// Only boundary rules carry keyword sets; scope violations are contextual
/// and left to the model, and behavior/tone rules never trigger on keywords.
fn keywords_for_rule(rule: &Rule) -> &'static [&'static str] {
    if rule.category != RuleCategory::Boundary {
        return &[];
    }

    let title = rule.title.to_lowercase();

    if title.contains("mental health") || title.contains("diagnos") {
        return MENTAL_HEALTH_KEYWORDS;
    }
    if title.contains("financial") || title.contains("legal") {
        return FINANCIAL_LEGAL_KEYWORDS;
    }
    if title.contains("certainty") || title.contains("guarantee") {
        return CERTAINTY_KEYWORDS;
    }

    &[]
}
