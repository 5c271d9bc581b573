//! System prompt composition.
//!
//! The prompt is layered in a fixed order so later layers can never override
//! the rules of engagement: rules, persona, topic + intent, follower profile
//! (optional), knowledge, response instructions. The composer is a pure
//! function of its inputs; identical input produces byte-identical output.

use crate::templates;
use attune_core::model::{
    ChatMessage, FollowerProfile, KnowledgeObject, MessageRole, PersonaIdentity, RiskAssessment,
    Rule, SessionIntent, Topic,
};
use attune_interaction::LlmMessage;

/// Knowledge objects rendered per prompt, in store order.
const MAX_KNOWLEDGE_OBJECTS: usize = 3;

/// Inputs for one prompt build. Collected fresh per turn; the composer
/// itself never touches the store.
pub struct PromptComposer {
    pub persona: PersonaIdentity,
    pub rules: Vec<Rule>,
    pub topic: Topic,
    pub intent: Option<SessionIntent>,
    pub follower: Option<FollowerProfile>,
    pub knowledge: Vec<KnowledgeObject>,
    pub history: Vec<ChatMessage>,
    pub is_first_message: bool,
    pub risk: Option<RiskAssessment>,
}

impl PromptComposer {
    /// Builds the full message list: system prompt, then the conversation
    /// history in chronological order. The first completion of a session has
    /// no history and gets a synthetic session-start turn instead.
    pub fn build(&self) -> Vec<LlmMessage> {
        let mut messages = vec![LlmMessage::system(self.build_system_prompt())];

        for message in &self.history {
            messages.push(match message.role {
                MessageRole::User => LlmMessage::user(&message.content),
                MessageRole::Assistant => LlmMessage::assistant(&message.content),
            });
        }

        if self.is_first_message {
            messages.push(LlmMessage::user(templates::SESSION_STARTED_MARKER));
        }

        messages
    }

    /// Renders the six-layer system prompt.
    pub fn build_system_prompt(&self) -> String {
        let mut sections = vec![
            self.rules_section(),
            self.persona_section(),
            self.topic_section(),
        ];

        if let Some(profile) = &self.follower {
            sections.push(self.follower_section(profile));
        }

        sections.push(self.knowledge_section());
        sections.push(self.response_section());

        sections.join("\n\n")
    }

    fn rules_section(&self) -> String {
        let mut section = format!("{}\n", templates::RULES_HEADER);

        let mut active: Vec<&Rule> = self.rules.iter().filter(|r| r.is_active).collect();
        active.sort_by_key(|r| r.priority);

        if active.is_empty() {
            section.push_str(
                "\n(No specific rules configured. Use good judgment and coaching best practices.)",
            );
        } else {
            for rule in active {
                section.push_str(&format!(
                    "\n- [{}] {}: {}",
                    rule.category.as_str().to_uppercase(),
                    rule.title,
                    rule.content
                ));
            }
        }

        section
    }

    fn persona_section(&self) -> String {
        let beliefs = bullet_list(&self.persona.core_beliefs);
        let boundaries = bullet_list(&self.persona.boundaries);

        format!(
            "{}\n\nName: {}\nVoice: {}\nTone: {}\nCoaching Style: {}\nCore Beliefs:\n{}\nRisk Stance: {}\nBoundaries:\n{}",
            templates::PERSONA_HEADER,
            self.persona.name,
            self.persona.voice,
            self.persona.tone,
            self.persona.coaching_style,
            beliefs,
            self.persona.risk_stance,
            boundaries,
        )
    }

    fn topic_section(&self) -> String {
        let intent_label = self
            .intent
            .map(|intent| intent.display_phrase())
            .unwrap_or("general");

        format!(
            "{}\n\nTopic: {}\nTopic Framing: {}\nSession Intent: The user wants \"{}\" from this conversation.\nScope: Stay within {}. If the user drifts to another topic, gently acknowledge and redirect.",
            templates::TOPIC_HEADER,
            self.topic.title,
            self.topic.subtitle,
            intent_label,
            self.topic.title,
        )
    }

    fn follower_section(&self, profile: &FollowerProfile) -> String {
        let areas = if profile.help_areas.is_empty() {
            "Not specified".to_string()
        } else {
            profile.help_areas.join(", ")
        };

        let mut section = format!(
            "{}\n\nFocus Areas: {}\nPreferred Feedback Style: {}",
            templates::FOLLOWER_HEADER,
            areas,
            profile.feedback_style.label(),
        );

        if let Some(note) = &profile.note {
            if !note.is_empty() {
                section.push_str(&format!("\nAdditional Context: {note}"));
            }
        }

        section
    }

    fn knowledge_section(&self) -> String {
        let mut section = format!("{}\n", templates::KNOWLEDGE_HEADER);

        if self.knowledge.is_empty() {
            section.push_str(
                "\n(No specific knowledge items available for this topic.)\nRely on the persona's core beliefs and coaching style to guide your responses.\nBe honest if you don't have a specific framework — reason from first principles.",
            );
        } else {
            for (index, ko) in self.knowledge.iter().take(MAX_KNOWLEDGE_OBJECTS).enumerate() {
                section.push_str(&format!(
                    "\nIdea {}:\n  Core Idea: {}\n  When to Use: {}\n  Guiding Heuristics: {}\n  What to Avoid: {}\n  Source: {}",
                    index + 1,
                    ko.core_idea,
                    ko.when_to_use,
                    ko.heuristics.join("; "),
                    ko.what_to_avoid.join("; "),
                    ko.source_reference,
                ));
            }
        }

        section
    }

    fn response_section(&self) -> String {
        let mut section = format!(
            "{}\n{}",
            templates::RESPONSE_HEADER,
            templates::RESPONSE_INSTRUCTIONS
        );

        if self.is_first_message {
            section.push_str("\n\n");
            section.push_str(templates::FIRST_MESSAGE_INSTRUCTION);
        }

        if let Some(risk) = &self.risk {
            if risk.is_flagged {
                let trigger = risk
                    .trigger_type
                    .map(|t| t.as_str())
                    .unwrap_or("unknown");
                let rule_title = risk
                    .matched_rule
                    .as_ref()
                    .map(|r| r.title.as_str())
                    .unwrap_or("General boundary");
                let reason = risk
                    .explanation
                    .as_deref()
                    .unwrap_or("Potential boundary approach detected");

                section.push_str(&format!(
                    "\n\n=== RISK ALERT (active for this response) ===\nThe user's latest message has been flagged by the safety system.\nTrigger: {trigger} — {rule_title}\nReason: {reason}\n\nYOU MUST:\n- Acknowledge the user's concern with empathy\n- Transparently explain that this falls outside your coaching scope\n- If appropriate, suggest they speak to a qualified professional\n- Do NOT provide advice on the flagged topic\n- Keep your response warm and supportive, not robotic or dismissive"
                ));
            }
        }

        section
    }
}

fn bullet_list(items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("- {item}"))
        .collect::<Vec<_>>()
        .join("\n")
}
