//! Persistence-store trait and the in-memory implementation.
//!
//! The store is an external collaborator: the conversation core only needs
//! the read/write surface below and makes no assumptions about what backs it.
//! Rules, persona, knowledge and the follower profile may be mutated by the
//! surrounding application between turns, so callers re-read them per turn
//! and never cache across turns.

use crate::error::{CoreError, Result};
use crate::model::{
    ChatMessage, ChatSession, FollowerProfile, GuardrailLog, KnowledgeObject, PersonaIdentity,
    Rule, Topic,
};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Abstract persistence surface consumed by the conversation core.
///
/// # Implementation Notes
///
/// - `fetch_active_rules` must return only active rules, sorted ascending by
///   priority.
/// - `fetch_recent_sessions` returns most recently started first.
/// - No transactional multi-entity writes are required.
#[async_trait]
pub trait CoachStore: Send + Sync {
    async fn fetch_persona(&self) -> Result<Option<PersonaIdentity>>;
    async fn fetch_active_rules(&self) -> Result<Vec<Rule>>;
    async fn fetch_knowledge(&self, topic_slug: &str, limit: usize) -> Result<Vec<KnowledgeObject>>;
    async fn fetch_all_knowledge(&self) -> Result<Vec<KnowledgeObject>>;
    async fn fetch_follower_profile(&self) -> Result<Option<FollowerProfile>>;
    async fn fetch_topic(&self, slug: &str) -> Result<Option<Topic>>;
    async fn fetch_recent_sessions(&self, limit: usize) -> Result<Vec<ChatSession>>;
    async fn fetch_messages(&self, session_id: Uuid) -> Result<Vec<ChatMessage>>;

    async fn insert_topic(&self, topic: Topic) -> Result<()>;
    async fn insert_rule(&self, rule: Rule) -> Result<()>;
    async fn insert_knowledge(&self, knowledge: KnowledgeObject) -> Result<()>;
    async fn upsert_persona(&self, persona: PersonaIdentity) -> Result<()>;
    async fn upsert_follower_profile(&self, profile: FollowerProfile) -> Result<()>;

    async fn insert_session(&self, session: ChatSession) -> Result<()>;
    async fn update_session(&self, session: &ChatSession) -> Result<()>;
    async fn insert_message(&self, message: ChatMessage) -> Result<()>;
    async fn update_message(&self, message: &ChatMessage) -> Result<()>;
    async fn insert_guardrail(&self, log: GuardrailLog) -> Result<()>;
    async fn fetch_guardrails(&self) -> Result<Vec<GuardrailLog>>;
}

#[derive(Default)]
struct Inner {
    persona: Option<PersonaIdentity>,
    rules: Vec<Rule>,
    topics: Vec<Topic>,
    knowledge: Vec<KnowledgeObject>,
    follower: Option<FollowerProfile>,
    sessions: HashMap<Uuid, ChatSession>,
    messages: HashMap<Uuid, ChatMessage>,
    guardrails: Vec<GuardrailLog>,
}

/// In-memory store backed by a `RwLock`ed map. Used by tests and as the
/// default embedded store when no persistent backend is wired up.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CoachStore for MemoryStore {
    async fn fetch_persona(&self) -> Result<Option<PersonaIdentity>> {
        Ok(self.inner.read().await.persona.clone())
    }

    async fn fetch_active_rules(&self) -> Result<Vec<Rule>> {
        let inner = self.inner.read().await;
        let mut rules: Vec<Rule> = inner.rules.iter().filter(|r| r.is_active).cloned().collect();
        rules.sort_by_key(|r| r.priority);
        Ok(rules)
    }

    async fn fetch_knowledge(&self, topic_slug: &str, limit: usize) -> Result<Vec<KnowledgeObject>> {
        let inner = self.inner.read().await;
        Ok(inner
            .knowledge
            .iter()
            .filter(|ko| ko.topic_slug == topic_slug)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn fetch_all_knowledge(&self) -> Result<Vec<KnowledgeObject>> {
        Ok(self.inner.read().await.knowledge.clone())
    }

    async fn fetch_follower_profile(&self) -> Result<Option<FollowerProfile>> {
        Ok(self.inner.read().await.follower.clone())
    }

    async fn fetch_topic(&self, slug: &str) -> Result<Option<Topic>> {
        let inner = self.inner.read().await;
        Ok(inner.topics.iter().find(|t| t.slug == slug).cloned())
    }

    async fn fetch_recent_sessions(&self, limit: usize) -> Result<Vec<ChatSession>> {
        let inner = self.inner.read().await;
        let mut sessions: Vec<ChatSession> = inner.sessions.values().cloned().collect();
        sessions.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        sessions.truncate(limit);
        Ok(sessions)
    }

    async fn fetch_messages(&self, session_id: Uuid) -> Result<Vec<ChatMessage>> {
        let inner = self.inner.read().await;
        let mut messages: Vec<ChatMessage> = inner
            .messages
            .values()
            .filter(|m| m.session_id == session_id)
            .cloned()
            .collect();
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(messages)
    }

    async fn insert_topic(&self, topic: Topic) -> Result<()> {
        self.inner.write().await.topics.push(topic);
        Ok(())
    }

    async fn insert_rule(&self, rule: Rule) -> Result<()> {
        self.inner.write().await.rules.push(rule);
        Ok(())
    }

    async fn insert_knowledge(&self, knowledge: KnowledgeObject) -> Result<()> {
        self.inner.write().await.knowledge.push(knowledge);
        Ok(())
    }

    async fn upsert_persona(&self, persona: PersonaIdentity) -> Result<()> {
        self.inner.write().await.persona = Some(persona);
        Ok(())
    }

    async fn upsert_follower_profile(&self, profile: FollowerProfile) -> Result<()> {
        self.inner.write().await.follower = Some(profile);
        Ok(())
    }

    async fn insert_session(&self, session: ChatSession) -> Result<()> {
        self.inner.write().await.sessions.insert(session.id, session);
        Ok(())
    }

    async fn update_session(&self, session: &ChatSession) -> Result<()> {
        let mut inner = self.inner.write().await;
        if !inner.sessions.contains_key(&session.id) {
            return Err(CoreError::not_found("session", session.id.to_string()));
        }
        inner.sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn insert_message(&self, message: ChatMessage) -> Result<()> {
        self.inner.write().await.messages.insert(message.id, message);
        Ok(())
    }

    async fn update_message(&self, message: &ChatMessage) -> Result<()> {
        let mut inner = self.inner.write().await;
        if !inner.messages.contains_key(&message.id) {
            return Err(CoreError::not_found("message", message.id.to_string()));
        }
        inner.messages.insert(message.id, message.clone());
        Ok(())
    }

    async fn insert_guardrail(&self, log: GuardrailLog) -> Result<()> {
        self.inner.write().await.guardrails.push(log);
        Ok(())
    }

    async fn fetch_guardrails(&self) -> Result<Vec<GuardrailLog>> {
        Ok(self.inner.read().await.guardrails.clone())
    }
}
