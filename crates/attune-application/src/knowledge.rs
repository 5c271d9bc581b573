//! Knowledge ingestion pipeline.
//!
//! Raw source text goes through three steps: mechanical chunking by idea,
//! model classification into a topic and role, and model extraction of a
//! structured knowledge object. Chunking and both response parsers are pure;
//! only classification and extraction touch the model, and both degrade to
//! fixed fallbacks when it is unavailable.

use attune_core::text::truncate;
use attune_core::{CoachStore, Result};
use attune_core::model::{KnowledgeObject, KnowledgeRole};
use attune_interaction::{CompletionClient, LlmMessage};
use tracing::{debug, warn};

/// The fixed topic taxonomy the classifier chooses from.
pub const TOPIC_SLUGS: [&str; 12] = [
    "notion-life-os",
    "simplified-life-os",
    "second-brain",
    "client-content-os",
    "goal-setting",
    "habit-tracking",
    "task-project-management",
    "ai-agent-os",
    "notion-foundations",
    "productivity-principles",
    "info-org-capture",
    "design-workspace",
];

const DEFAULT_TOPIC_SLUG: &str = "productivity-principles";

/// Chunks boundaries on markdown headings, or on blank lines once a chunk
/// has more than three lines. Chunks under 100 characters are merged into
/// whatever follows them.
pub fn chunk_by_idea(text: &str) -> Vec<String> {
    let mut chunks: Vec<String> = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in text.split('\n') {
        let trimmed = line.trim();
        let is_heading =
            trimmed.starts_with("# ") || trimmed.starts_with("## ") || trimmed.starts_with("### ");

        if is_heading && !current.is_empty() {
            chunks.push(current.join("\n"));
            current = vec![line];
        } else if trimmed.is_empty() && current.len() > 3 {
            chunks.push(current.join("\n"));
            current = Vec::new();
        } else if !trimmed.is_empty() {
            current.push(line);
        }
    }

    if !current.is_empty() {
        chunks.push(current.join("\n"));
    }

    let mut merged: Vec<String> = Vec::new();
    for chunk in chunks {
        match merged.last_mut() {
            Some(last) if last.chars().count() < 100 => {
                last.push('\n');
                last.push_str(&chunk);
            }
            _ => merged.push(chunk),
        }
    }

    merged
}

/// Result of classifying one chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub topic_slug: String,
    pub role: KnowledgeRole,
}

impl Default for Classification {
    fn default() -> Self {
        Self {
            topic_slug: DEFAULT_TOPIC_SLUG.to_string(),
            role: KnowledgeRole::Knowledge,
        }
    }
}

/// Drives source text through chunking, classification and extraction.
pub struct KnowledgeProcessor {
    client: CompletionClient,
}

impl KnowledgeProcessor {
    pub fn new(client: CompletionClient) -> Self {
        Self { client }
    }

    /// Classifies a chunk into a topic slug and knowledge role. Any failure,
    /// including an unconfigured client, yields the default classification.
    pub async fn classify(&self, chunk: &str) -> Classification {
        if !self.client.is_configured() {
            return Classification::default();
        }

        let prompt = format!(
            "Classify the following text chunk from a coaching knowledge base.\n\nTEXT:\n{}\n\nRespond with EXACTLY two lines:\nTOPIC: <one of: {}>\nROLE: <one of: knowledge, persona_signal, boundary_risk>\n\nTopic guide:\n- notion-life-os: Comprehensive Notion life operating system\n- simplified-life-os: Beginner-friendly simplified Notion setup\n- second-brain: Knowledge management, capturing and retrieving ideas\n- client-content-os: Client management, content pipelines, freelancing\n- goal-setting: Goals, planning, yearly reviews\n- habit-tracking: Habits, consistency, routine building\n- task-project-management: Tasks, projects, priorities, dashboards\n- ai-agent-os: AI agents, prompt engineering, agent design\n- notion-foundations: Notion basics, databases, relations, formulas\n- productivity-principles: Productivity philosophy, workflows, essentialism\n- info-org-capture: Information organization, idea capture systems\n- design-workspace: Notion aesthetics, dashboard design, visual layout\n\nRole definitions:\n- knowledge: Coaching frameworks, advice, methods, strategies\n- persona_signal: Indicators of the creator's voice, tone, beliefs, style\n- boundary_risk: Content about limitations, what not to do, safety concerns",
            truncate(chunk, 1000),
            TOPIC_SLUGS.join(", "),
        );

        let messages = vec![
            LlmMessage::system(
                "You are a concise text classifier. Respond in the exact format specified.",
            ),
            LlmMessage::user(prompt),
        ];

        match self.client.complete(&messages).await {
            Ok(response) => parse_classification(&response),
            Err(err) => {
                warn!(error = %err, "chunk classification failed, using defaults");
                Classification::default()
            }
        }
    }

    /// Extracts a structured knowledge object from a chunk. Returns `None`
    /// when the model produced no usable core idea. An unconfigured client
    /// falls back to a bare object carrying the truncated chunk itself.
    pub async fn extract(
        &self,
        chunk: &str,
        classification: &Classification,
        source_title: &str,
    ) -> Option<KnowledgeObject> {
        if !self.client.is_configured() {
            return Some(KnowledgeObject::new(
                classification.topic_slug.clone(),
                truncate(chunk, 200),
                "General coaching context",
                Vec::new(),
                Vec::new(),
                source_title,
                classification.role,
            ));
        }

        let prompt = format!(
            "Extract a structured coaching knowledge object from the following text.\n\nTEXT:\n{}\n\nRespond in this exact format (each field on its own line):\nCORE_IDEA: <one sentence summarizing the main coaching insight>\nWHEN_TO_USE: <when a coach should apply this idea>\nHEURISTICS: <2-3 practical guidelines, separated by |>\nWHAT_TO_AVOID: <1-2 things to avoid, separated by |>\n\nBe concise. Each field should be 1-2 sentences max.",
            truncate(chunk, 1500),
        );

        let messages = vec![
            LlmMessage::system(
                "You are a knowledge extraction specialist. Respond in the exact format specified.",
            ),
            LlmMessage::user(prompt),
        ];

        match self.client.complete(&messages).await {
            Ok(response) => parse_knowledge_object(&response, classification, source_title),
            Err(err) => {
                warn!(error = %err, "knowledge extraction failed, skipping chunk");
                None
            }
        }
    }

    /// Runs the full pipeline over one source document, inserting every
    /// extracted object. Returns how many objects were stored.
    pub async fn process(
        &self,
        store: &dyn CoachStore,
        text: &str,
        source_title: &str,
    ) -> Result<usize> {
        let chunks = chunk_by_idea(text);
        debug!(chunks = chunks.len(), source = source_title, "processing knowledge source");

        let mut stored = 0;
        for chunk in &chunks {
            let classification = self.classify(chunk).await;
            if let Some(object) = self.extract(chunk, &classification, source_title).await {
                store.insert_knowledge(object).await?;
                stored += 1;
            }
        }

        Ok(stored)
    }
}

fn parse_classification(response: &str) -> Classification {
    let mut result = Classification::default();

    for line in response.split('\n') {
        let trimmed = line.trim();
        let upper = trimmed.to_uppercase();
        if upper.starts_with("TOPIC:") {
            let value = trimmed["TOPIC:".len()..].trim().to_lowercase();
            if TOPIC_SLUGS.contains(&value.as_str()) {
                result.topic_slug = value;
            }
        } else if upper.starts_with("ROLE:") {
            let value = trimmed["ROLE:".len()..].trim().to_lowercase();
            if let Some(role) = KnowledgeRole::parse(&value) {
                result.role = role;
            }
        }
    }

    result
}

fn parse_knowledge_object(
    response: &str,
    classification: &Classification,
    source_title: &str,
) -> Option<KnowledgeObject> {
    let mut core_idea = String::new();
    let mut when_to_use = String::new();
    let mut heuristics: Vec<String> = Vec::new();
    let mut what_to_avoid: Vec<String> = Vec::new();

    for line in response.split('\n') {
        let trimmed = line.trim();
        let upper = trimmed.to_uppercase();
        if upper.starts_with("CORE_IDEA:") {
            core_idea = trimmed["CORE_IDEA:".len()..].trim().to_string();
        } else if upper.starts_with("WHEN_TO_USE:") {
            when_to_use = trimmed["WHEN_TO_USE:".len()..].trim().to_string();
        } else if upper.starts_with("HEURISTICS:") {
            heuristics = split_piped(&trimmed["HEURISTICS:".len()..]);
        } else if upper.starts_with("WHAT_TO_AVOID:") {
            what_to_avoid = split_piped(&trimmed["WHAT_TO_AVOID:".len()..]);
        }
    }

    if core_idea.is_empty() {
        return None;
    }

    Some(KnowledgeObject::new(
        classification.topic_slug.clone(),
        core_idea,
        when_to_use,
        heuristics,
        what_to_avoid,
        source_title,
        classification.role,
    ))
}

fn split_piped(value: &str) -> Vec<String> {
    value
        .split('|')
        .map(|part| part.trim().to_string())
        .filter(|part| !part.is_empty())
        .collect()
}
