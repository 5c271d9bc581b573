//! Conversation orchestration.
//!
//! `ChatOrchestrator` drives one coaching session through its state machine
//! and publishes [`ChatEvent`]s for the presentation layer. Assistant
//! responses stream in on a spawned task; every dispatch captures the
//! current generation counter, and any delivery whose generation is behind
//! the counter is discarded without touching session state. Sending a new
//! message cancels whatever response is still in flight.

use crate::prompt::PromptComposer;
use crate::risk::RiskAssessor;
use crate::templates;
use attune_core::model::{
    ChatMessage, ChatSession, GuardrailLog, PersonaIdentity, RiskAssessment, SessionIntent, Topic,
    TriggerType,
};
use attune_core::text::truncate;
use attune_core::{
    ChatEvent, CoachStore, CoreError, EntitlementCheck, Result, allow_all_topics,
};
use attune_interaction::{CompletionClient, LlmError, LlmMessage};
use chrono::Utc;
use futures::StreamExt;
use rand::seq::SliceRandom;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const GREETING_TEMPLATES: [&str; 5] = [
    "Hey — glad you're here. Let's talk about {topic}.",
    "Welcome back. Ready to dig into {topic}?",
    "Good to see you. Let's work through {topic} together.",
    "Hey — let's jump into {topic}.",
    "Alright, {topic} it is. Let's get into it.",
];

const OFFLINE_RESPONSE: &str =
    "I hear you. (Configure an LLM provider in Settings to enable real responses.)";
const OFFLINE_TAKEAWAY: &str = "You're thinking about this the right way.";
const OFFLINE_NEXT_STEP: &str = "Try writing down the one thing that matters most this week.";

const SHORT_SESSION_TAKEAWAY: &str = "Every conversation starts somewhere.";
const SHORT_SESSION_NEXT_STEP: &str = "Come back when you're ready to dig in.";

const WRAP_UP_ERROR_TAKEAWAY: &str = "You showed up and did the work today.";
const WRAP_UP_ERROR_NEXT_STEP: &str = "Take one small step from what we discussed.";

const MISSING_NEXT_STEP: &str = "Reflect on what stood out to you from this conversation.";

const KNOWLEDGE_PER_PROMPT: usize = 3;
const GUARDRAIL_USER_EXCERPT_MAX: usize = 200;
const GUARDRAIL_ASSISTANT_EXCERPT_MAX: usize = 500;

/// Where a session is in its lifecycle. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NotStarted,
    AwaitingIntent,
    Active,
    WrappingUp,
    Closed,
}

struct SessionCore {
    state: SessionState,
    session: Option<ChatSession>,
    transcript: Vec<ChatMessage>,
    /// Bumped on every dispatch and on wrap-up; stale deliveries carry an
    /// older value and are dropped.
    generation: u64,
    inflight: Option<CancellationToken>,
}

/// Orchestrates a single coaching session on one topic.
pub struct ChatOrchestrator {
    store: Arc<dyn CoachStore>,
    client: CompletionClient,
    topic: Topic,
    greeting: String,
    entitlement: EntitlementCheck,
    events: mpsc::UnboundedSender<ChatEvent>,
    core: Arc<Mutex<SessionCore>>,
}

impl ChatOrchestrator {
    /// Creates an orchestrator with every topic accessible.
    pub fn new(
        store: Arc<dyn CoachStore>,
        client: CompletionClient,
        topic: Topic,
    ) -> (Self, mpsc::UnboundedReceiver<ChatEvent>) {
        Self::with_entitlement(store, client, topic, allow_all_topics())
    }

    /// Creates an orchestrator with an injected topic-access predicate.
    pub fn with_entitlement(
        store: Arc<dyn CoachStore>,
        client: CompletionClient,
        topic: Topic,
        entitlement: EntitlementCheck,
    ) -> (Self, mpsc::UnboundedReceiver<ChatEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let greeting = pick_greeting(&topic);
        let orchestrator = Self {
            store,
            client,
            topic,
            greeting,
            entitlement,
            events,
            core: Arc::new(Mutex::new(SessionCore {
                state: SessionState::NotStarted,
                session: None,
                transcript: Vec::new(),
                generation: 0,
                inflight: None,
            })),
        };
        (orchestrator, receiver)
    }

    pub fn greeting(&self) -> &str {
        &self.greeting
    }

    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    pub async fn state(&self) -> SessionState {
        self.core.lock().await.state
    }

    pub async fn session(&self) -> Option<ChatSession> {
        self.core.lock().await.session.clone()
    }

    /// Snapshot of the persisted transcript so far.
    pub async fn transcript(&self) -> Vec<ChatMessage> {
        self.core.lock().await.transcript.clone()
    }

    /// Opens the session: entitlement check, session record, greeting.
    pub async fn start(&self) -> Result<()> {
        if !(self.entitlement)(&self.topic) {
            return Err(CoreError::TopicLocked(self.topic.slug.clone()));
        }

        let mut core = self.core.lock().await;
        if core.state != SessionState::NotStarted {
            return Err(CoreError::invalid_state(format!(
                "cannot start a session in state {:?}",
                core.state
            )));
        }

        let session = ChatSession::new(&self.topic.slug);
        self.store.insert_session(session.clone()).await?;
        core.session = Some(session);
        core.state = SessionState::AwaitingIntent;
        drop(core);

        info!(topic = %self.topic.slug, "session started");
        self.emit(ChatEvent::Greeting { text: self.greeting.clone() });
        Ok(())
    }

    /// Records the chosen intent, persists the greeting exchange and
    /// dispatches the session opener.
    pub async fn select_intent(&self, intent: SessionIntent) -> Result<()> {
        let mut core = self.core.lock().await;
        if core.state != SessionState::AwaitingIntent {
            return Err(CoreError::invalid_state(format!(
                "cannot select an intent in state {:?}",
                core.state
            )));
        }

        let mut session = core
            .session
            .clone()
            .ok_or_else(|| CoreError::invalid_state("no session record"))?;
        session.intent = Some(intent);
        self.store.update_session(&session).await?;
        core.session = Some(session.clone());

        let greeting_message = ChatMessage::assistant(
            session.id,
            format!("{}\n\nWhat would make this useful?", self.greeting),
        );
        self.store.insert_message(greeting_message.clone()).await?;
        core.transcript.push(greeting_message);

        let user_message = ChatMessage::user(session.id, intent.title());
        self.store.insert_message(user_message.clone()).await?;
        core.transcript.push(user_message.clone());

        core.state = SessionState::Active;
        core.generation += 1;
        let generation = core.generation;
        drop(core);

        info!(intent = %intent, "intent selected");
        self.emit(ChatEvent::UserMessage { message: user_message });

        if !self.client.is_configured() {
            return self
                .append_canned_assistant(
                    format!(
                        "Hey — glad you're here. Let's talk about {}. What's on your mind?",
                        self.topic.title.to_lowercase()
                    ),
                    generation,
                )
                .await;
        }

        self.dispatch(generation, true, None, None).await
    }

    /// Accepts one user turn: cancels any in-flight response, assesses risk
    /// and dispatches the next completion. Empty input is ignored.
    pub async fn send_user_message(&self, text: &str) -> Result<()> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }

        let (generation, user_message) = {
            let mut core = self.core.lock().await;
            if core.state != SessionState::Active {
                return Err(CoreError::invalid_state(format!(
                    "cannot send a message in state {:?}",
                    core.state
                )));
            }
            if let Some(token) = core.inflight.take() {
                token.cancel();
            }
            core.generation += 1;

            let session_id = core
                .session
                .as_ref()
                .map(|s| s.id)
                .ok_or_else(|| CoreError::invalid_state("no session record"))?;
            let message = ChatMessage::user(session_id, text);
            self.store.insert_message(message.clone()).await?;
            core.transcript.push(message.clone());
            (core.generation, message)
        };

        self.emit(ChatEvent::UserMessage { message: user_message.clone() });

        if !self.client.is_configured() {
            return self
                .append_canned_assistant(OFFLINE_RESPONSE.to_string(), generation)
                .await;
        }

        let rules = self.store.fetch_active_rules().await?;
        let assessment = RiskAssessor::new(rules)
            .assess(&user_message.content, Some(&self.client))
            .await;

        if assessment.is_flagged {
            let mut flagged = user_message.clone();
            flagged.risk_flagged = true;
            self.store.update_message(&flagged).await?;

            let mut core = self.core.lock().await;
            if let Some(entry) = core.transcript.iter_mut().find(|m| m.id == flagged.id) {
                entry.risk_flagged = true;
            }
            drop(core);

            self.emit(ChatEvent::RiskFlagged { assessment: assessment.clone() });
        }

        self.dispatch(
            generation,
            false,
            Some(assessment),
            Some(user_message.content),
        )
        .await
    }

    /// Closes the session: cancels any in-flight response, generates (or
    /// falls back to) the wrap-up copy, persists the closed record. Always
    /// reaches `Closed` on success paths and on wrap-up failure alike.
    pub async fn end_session(&self) -> Result<()> {
        let transcript = {
            let mut core = self.core.lock().await;
            match core.state {
                SessionState::AwaitingIntent | SessionState::Active => {}
                state => {
                    return Err(CoreError::invalid_state(format!(
                        "cannot end a session in state {:?}",
                        state
                    )));
                }
            }
            if let Some(token) = core.inflight.take() {
                token.cancel();
            }
            core.generation += 1;
            core.state = SessionState::WrappingUp;

            let mut session = core
                .session
                .clone()
                .ok_or_else(|| CoreError::invalid_state("no session record"))?;
            session.ended_at = Some(Utc::now());
            core.session = Some(session);
            core.transcript.clone()
        };

        let (takeaway, next_step) = if transcript.len() < 2 {
            (
                SHORT_SESSION_TAKEAWAY.to_string(),
                SHORT_SESSION_NEXT_STEP.to_string(),
            )
        } else if !self.client.is_configured() {
            (OFFLINE_TAKEAWAY.to_string(), OFFLINE_NEXT_STEP.to_string())
        } else {
            self.generate_wrap_up(&transcript).await
        };

        let mut core = self.core.lock().await;
        let mut session = core
            .session
            .clone()
            .ok_or_else(|| CoreError::invalid_state("no session record"))?;
        session.takeaway = Some(takeaway.clone());
        session.next_step = Some(next_step.clone());
        self.store.update_session(&session).await?;
        core.session = Some(session);
        core.state = SessionState::Closed;
        drop(core);

        info!(topic = %self.topic.slug, "session closed");
        self.emit(ChatEvent::WrapUp { takeaway, next_step });
        self.emit(ChatEvent::SessionClosed);
        Ok(())
    }

    async fn generate_wrap_up(&self, transcript: &[ChatMessage]) -> (String, String) {
        let summary = transcript
            .iter()
            .map(|m| format!("{}: {}", m.role.as_str(), m.content))
            .collect::<Vec<_>>()
            .join("\n");

        let messages = vec![
            LlmMessage::system(templates::WRAP_UP_INSTRUCTION),
            LlmMessage::user(format!("Here is the conversation:\n\n{summary}")),
        ];

        match self.client.complete(&messages).await {
            Ok(response) => parse_wrap_up(&response),
            Err(err) => {
                warn!(error = %err, "wrap-up generation failed, using fallback copy");
                (
                    WRAP_UP_ERROR_TAKEAWAY.to_string(),
                    WRAP_UP_ERROR_NEXT_STEP.to_string(),
                )
            }
        }
    }

    /// Gathers fresh prompt inputs, composes, and spawns the streaming task
    /// for this generation.
    async fn dispatch(
        &self,
        generation: u64,
        is_first_message: bool,
        risk: Option<RiskAssessment>,
        user_content: Option<String>,
    ) -> Result<()> {
        let persona = self
            .store
            .fetch_persona()
            .await?
            .unwrap_or_else(PersonaIdentity::fallback);
        let rules = self.store.fetch_active_rules().await?;
        let knowledge = self
            .store
            .fetch_knowledge(&self.topic.slug, KNOWLEDGE_PER_PROMPT)
            .await?;
        let follower = self.store.fetch_follower_profile().await?;

        let token = CancellationToken::new();
        let (session_id, intent, history) = {
            let mut core = self.core.lock().await;
            if core.generation != generation {
                return Ok(());
            }
            let session = core
                .session
                .as_ref()
                .ok_or_else(|| CoreError::invalid_state("no session record"))?;
            let session_id = session.id;
            let intent = session.intent;
            let history = if is_first_message {
                Vec::new()
            } else {
                core.transcript.clone()
            };
            core.inflight = Some(token.clone());
            (session_id, intent, history)
        };

        let composer = PromptComposer {
            persona,
            rules,
            topic: self.topic.clone(),
            intent,
            follower,
            knowledge,
            history,
            is_first_message,
            risk: risk.clone(),
        };
        let messages = composer.build();
        debug!(generation, first = is_first_message, "dispatching completion");

        let task = StreamTask {
            store: Arc::clone(&self.store),
            client: self.client.clone(),
            core: Arc::clone(&self.core),
            events: self.events.clone(),
            topic_slug: self.topic.slug.clone(),
            session_id,
            generation,
            risk,
            user_content,
        };
        tokio::spawn(task.run(messages, token));
        Ok(())
    }

    async fn append_canned_assistant(&self, content: String, generation: u64) -> Result<()> {
        let mut core = self.core.lock().await;
        if core.generation != generation {
            return Ok(());
        }
        let session_id = core
            .session
            .as_ref()
            .map(|s| s.id)
            .ok_or_else(|| CoreError::invalid_state("no session record"))?;
        let message = ChatMessage::assistant(session_id, content);
        self.store.insert_message(message.clone()).await?;
        core.transcript.push(message.clone());
        drop(core);

        self.emit(ChatEvent::AssistantCompleted { generation, message });
        Ok(())
    }

    fn emit(&self, event: ChatEvent) {
        // The receiver side may be gone; events are best-effort.
        let _ = self.events.send(event);
    }
}

/// One spawned streaming response. Everything it mutates is gated on the
/// generation it was dispatched with.
struct StreamTask {
    store: Arc<dyn CoachStore>,
    client: CompletionClient,
    core: Arc<Mutex<SessionCore>>,
    events: mpsc::UnboundedSender<ChatEvent>,
    topic_slug: String,
    session_id: uuid::Uuid,
    generation: u64,
    risk: Option<RiskAssessment>,
    user_content: Option<String>,
}

impl StreamTask {
    async fn run(self, messages: Vec<LlmMessage>, token: CancellationToken) {
        let mut stream = self.client.stream(&messages);
        let mut accumulated = String::new();
        let mut failure: Option<LlmError> = None;

        loop {
            tokio::select! {
                _ = token.cancelled() => return,
                chunk = stream.next() => match chunk {
                    None => break,
                    Some(Ok(delta)) => {
                        if !self.still_current().await {
                            return;
                        }
                        accumulated.push_str(&delta);
                        let _ = self.events.send(ChatEvent::AssistantDelta {
                            generation: self.generation,
                            text: delta,
                        });
                    }
                    Some(Err(err)) => {
                        if err.is_cancelled() {
                            return;
                        }
                        failure = Some(err);
                        break;
                    }
                },
            }
        }

        // The generation check and both writes happen under one lock
        // acquisition, so a superseding turn either lands before (this
        // delivery is dropped whole) or after (it sees a consistent
        // store and transcript). A stale delivery must write nowhere.
        let message = {
            let mut core = self.core.lock().await;
            if core.generation != self.generation {
                return;
            }

            if let Some(err) = &failure {
                // Keep whatever streamed before the failure, annotated.
                accumulated
                    .push_str(&format!("\n\n(Response interrupted: {})", err.user_message()));
                let _ = self.events.send(ChatEvent::Error {
                    message: err.user_message(),
                });
            }

            let message = ChatMessage::assistant(self.session_id, accumulated.clone());
            if let Err(err) = self.store.insert_message(message.clone()).await {
                warn!(error = %err, "failed to persist assistant message");
            }
            core.transcript.push(message.clone());
            core.inflight = None;
            message
        };

        let _ = self.events.send(ChatEvent::AssistantCompleted {
            generation: self.generation,
            message,
        });

        if failure.is_none() {
            if let Some(risk) = &self.risk {
                if risk.is_flagged {
                    self.log_guardrail(risk, &accumulated).await;
                }
            }
        }
    }

    async fn still_current(&self) -> bool {
        self.core.lock().await.generation == self.generation
    }

    async fn log_guardrail(&self, risk: &RiskAssessment, assistant_response: &str) {
        let log = GuardrailLog::new(
            self.session_id,
            &self.topic_slug,
            risk.trigger_type.unwrap_or(TriggerType::RuleBased),
            risk.matched_rule.as_ref().map(|r| r.title.clone()),
            truncate(
                self.user_content.as_deref().unwrap_or(""),
                GUARDRAIL_USER_EXCERPT_MAX,
            ),
            truncate(assistant_response, GUARDRAIL_ASSISTANT_EXCERPT_MAX),
        );
        if let Err(err) = self.store.insert_guardrail(log).await {
            warn!(error = %err, "failed to persist guardrail log");
        }
    }
}

fn pick_greeting(topic: &Topic) -> String {
    let template = GREETING_TEMPLATES
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(GREETING_TEMPLATES[0]);
    template.replace("{topic}", &topic.title.to_lowercase())
}

/// Lenient wrap-up parse. A missing takeaway falls back to the truncated
/// response; a missing next step falls back to a generic reflection prompt.
fn parse_wrap_up(response: &str) -> (String, String) {
    let mut takeaway: Option<String> = None;
    let mut next_step: Option<String> = None;

    for line in response.split('\n') {
        let trimmed = line.trim();
        if let Some(rest) = trimmed.strip_prefix("TAKEAWAY:") {
            takeaway = Some(rest.trim().to_string());
        } else if let Some(rest) = trimmed.strip_prefix("NEXT_STEP:") {
            next_step = Some(rest.trim().to_string());
        }
    }

    (
        takeaway
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| truncate(response, 200)),
        next_step
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| MISSING_NEXT_STEP.to_string()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use attune_core::model::{Rule, RuleCategory};
    use attune_core::{LlmConfig, MemoryStore, ProviderKind};
    use attune_interaction::ChatProvider;
    use futures::stream::BoxStream;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;

    enum ScriptedStream {
        Chunks(Vec<std::result::Result<String, LlmError>>),
        Pending,
    }

    /// Replays scripted completions and streams in call order.
    #[derive(Default)]
    struct MockProvider {
        completions: StdMutex<VecDeque<std::result::Result<String, LlmError>>>,
        streams: StdMutex<VecDeque<ScriptedStream>>,
    }

    impl MockProvider {
        fn complete_with(self, response: std::result::Result<String, LlmError>) -> Self {
            self.completions.lock().unwrap().push_back(response);
            self
        }

        fn stream_with(self, chunks: Vec<&str>) -> Self {
            self.streams.lock().unwrap().push_back(ScriptedStream::Chunks(
                chunks.into_iter().map(|c| Ok(c.to_string())).collect(),
            ));
            self
        }

        fn stream_pending(self) -> Self {
            self.streams
                .lock()
                .unwrap()
                .push_back(ScriptedStream::Pending);
            self
        }
    }

    #[async_trait]
    impl ChatProvider for MockProvider {
        async fn send_message(
            &self,
            _messages: &[LlmMessage],
            _config: &LlmConfig,
        ) -> std::result::Result<String, LlmError> {
            self.completions
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok("SAFE".to_string()))
        }

        fn stream_message(
            &self,
            _messages: &[LlmMessage],
            _config: &LlmConfig,
        ) -> BoxStream<'static, std::result::Result<String, LlmError>> {
            match self.streams.lock().unwrap().pop_front() {
                Some(ScriptedStream::Chunks(chunks)) => {
                    Box::pin(futures::stream::iter(chunks))
                }
                Some(ScriptedStream::Pending) => Box::pin(futures::stream::pending()),
                None => Box::pin(futures::stream::empty()),
            }
        }
    }

    fn topic() -> Topic {
        Topic::new("goal-setting", "Goal Setting", "Plan the year", "target", 1)
    }

    fn offline_client() -> CompletionClient {
        CompletionClient::new(LlmConfig::for_provider(ProviderKind::OpenAi, ""))
    }

    fn mock_client(provider: MockProvider) -> CompletionClient {
        CompletionClient::with_provider(
            Arc::new(provider),
            LlmConfig::for_provider(ProviderKind::OpenAi, "test-key"),
        )
    }

    async fn next_completion(rx: &mut mpsc::UnboundedReceiver<ChatEvent>) -> ChatMessage {
        loop {
            match rx.recv().await.expect("event stream ended") {
                ChatEvent::AssistantCompleted { message, .. } => return message,
                _ => continue,
            }
        }
    }

    #[tokio::test]
    async fn lifecycle_runs_offline_with_canned_copy() {
        let store = Arc::new(MemoryStore::new());
        let (orchestrator, mut rx) =
            ChatOrchestrator::new(store.clone(), offline_client(), topic());

        orchestrator.start().await.unwrap();
        assert_eq!(orchestrator.state().await, SessionState::AwaitingIntent);
        assert!(matches!(rx.recv().await, Some(ChatEvent::Greeting { .. })));

        orchestrator
            .select_intent(SessionIntent::Clarity)
            .await
            .unwrap();
        assert_eq!(orchestrator.state().await, SessionState::Active);

        assert!(matches!(rx.recv().await, Some(ChatEvent::UserMessage { .. })));
        let opener = next_completion(&mut rx).await;
        assert_eq!(
            opener.content,
            "Hey — glad you're here. Let's talk about goal setting. What's on your mind?"
        );

        orchestrator.send_user_message("I feel stuck").await.unwrap();
        assert!(matches!(rx.recv().await, Some(ChatEvent::UserMessage { .. })));
        let reply = next_completion(&mut rx).await;
        assert_eq!(reply.content, OFFLINE_RESPONSE);

        orchestrator.end_session().await.unwrap();
        assert_eq!(orchestrator.state().await, SessionState::Closed);

        match rx.recv().await {
            Some(ChatEvent::WrapUp { takeaway, next_step }) => {
                assert_eq!(takeaway, OFFLINE_TAKEAWAY);
                assert_eq!(next_step, OFFLINE_NEXT_STEP);
            }
            other => panic!("expected wrap-up, got {other:?}"),
        }
        assert!(matches!(rx.recv().await, Some(ChatEvent::SessionClosed)));

        let session = orchestrator.session().await.unwrap();
        assert!(session.ended_at.is_some());
        assert_eq!(session.intent, Some(SessionIntent::Clarity));
    }

    #[tokio::test]
    async fn starting_twice_is_an_invalid_transition() {
        let (orchestrator, _rx) =
            ChatOrchestrator::new(Arc::new(MemoryStore::new()), offline_client(), topic());
        orchestrator.start().await.unwrap();
        assert!(matches!(
            orchestrator.start().await,
            Err(CoreError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn locked_topics_refuse_to_start() {
        let premium = topic().premium();
        let check: EntitlementCheck = Arc::new(|t: &Topic| !t.is_premium);
        let (orchestrator, _rx) = ChatOrchestrator::with_entitlement(
            Arc::new(MemoryStore::new()),
            offline_client(),
            premium,
            check,
        );
        assert!(matches!(
            orchestrator.start().await,
            Err(CoreError::TopicLocked(_))
        ));
    }

    #[tokio::test]
    async fn ending_a_short_session_uses_placeholder_copy() {
        let (orchestrator, mut rx) =
            ChatOrchestrator::new(Arc::new(MemoryStore::new()), offline_client(), topic());
        orchestrator.start().await.unwrap();
        orchestrator.end_session().await.unwrap();

        loop {
            match rx.recv().await.unwrap() {
                ChatEvent::WrapUp { takeaway, next_step } => {
                    assert_eq!(takeaway, SHORT_SESSION_TAKEAWAY);
                    assert_eq!(next_step, SHORT_SESSION_NEXT_STEP);
                    break;
                }
                _ => continue,
            }
        }
    }

    #[tokio::test]
    async fn deltas_accumulate_into_the_persisted_response() {
        let store = Arc::new(MemoryStore::new());
        // One stream for the opener, then SAFE for risk and a stream for
        // the reply.
        let provider = MockProvider::default()
            .stream_with(vec!["Welcome ", "in."])
            .complete_with(Ok("SAFE".into()))
            .stream_with(vec!["Let's ", "start ", "small."]);
        let (orchestrator, mut rx) =
            ChatOrchestrator::new(store.clone(), mock_client(provider), topic());

        orchestrator.start().await.unwrap();
        orchestrator
            .select_intent(SessionIntent::NextStep)
            .await
            .unwrap();
        let opener = next_completion(&mut rx).await;
        assert_eq!(opener.content, "Welcome in.");

        orchestrator.send_user_message("where do I begin?").await.unwrap();
        let reply = next_completion(&mut rx).await;
        assert_eq!(reply.content, "Let's start small.");

        let session = orchestrator.session().await.unwrap();
        let stored = store.fetch_messages(session.id).await.unwrap();
        assert!(stored.iter().any(|m| m.content == "Let's start small."));
    }

    #[tokio::test]
    async fn keyword_flagged_turns_write_a_guardrail_log() {
        let store = Arc::new(MemoryStore::new());
        store
            .insert_rule(Rule::new(
                "No mental health diagnosis",
                "Never diagnose.",
                RuleCategory::Boundary,
                1,
            ))
            .await
            .unwrap();

        // Stage one flags on keywords, so no classifier call is scripted.
        let provider = MockProvider::default()
            .stream_with(vec!["Opener."])
            .stream_with(vec!["That deserves real support."]);
        let (orchestrator, mut rx) =
            ChatOrchestrator::new(store.clone(), mock_client(provider), topic());

        orchestrator.start().await.unwrap();
        orchestrator
            .select_intent(SessionIntent::Clarity)
            .await
            .unwrap();
        next_completion(&mut rx).await;

        orchestrator
            .send_user_message("can you diagnose me?")
            .await
            .unwrap();

        let mut saw_flag = false;
        loop {
            match rx.recv().await.unwrap() {
                ChatEvent::RiskFlagged { assessment } => {
                    assert_eq!(assessment.trigger_type, Some(TriggerType::RuleBased));
                    saw_flag = true;
                }
                ChatEvent::AssistantCompleted { .. } => break,
                _ => continue,
            }
        }
        assert!(saw_flag);

        let guardrails = store.fetch_guardrails().await.unwrap();
        assert_eq!(guardrails.len(), 1);
        assert_eq!(guardrails[0].user_excerpt, "can you diagnose me?");
        assert_eq!(
            guardrails[0].rule_title.as_deref(),
            Some("No mental health diagnosis")
        );

        let session = orchestrator.session().await.unwrap();
        let stored = store.fetch_messages(session.id).await.unwrap();
        assert!(stored.iter().any(|m| m.risk_flagged));
    }

    #[tokio::test]
    async fn a_new_message_supersedes_the_inflight_response() {
        let store = Arc::new(MemoryStore::new());
        // The first reply hangs forever; the second completes.
        let provider = MockProvider::default()
            .stream_with(vec!["Opener."])
            .complete_with(Ok("SAFE".into()))
            .stream_pending()
            .complete_with(Ok("SAFE".into()))
            .stream_with(vec!["Second answer."]);
        let (orchestrator, mut rx) =
            ChatOrchestrator::new(store.clone(), mock_client(provider), topic());

        orchestrator.start().await.unwrap();
        orchestrator
            .select_intent(SessionIntent::Direction)
            .await
            .unwrap();
        next_completion(&mut rx).await;

        orchestrator.send_user_message("first question").await.unwrap();
        orchestrator.send_user_message("second question").await.unwrap();

        let reply = next_completion(&mut rx).await;
        assert_eq!(reply.content, "Second answer.");

        // Only the superseding response made it into the transcript. The
        // greeting and the opener are assistant messages too; skip them.
        let assistant_replies: Vec<ChatMessage> = orchestrator
            .transcript()
            .await
            .into_iter()
            .filter(|m| {
                m.role == attune_core::model::MessageRole::Assistant
                    && m.content != "Opener."
                    && !m.content.ends_with("What would make this useful?")
            })
            .collect();
        assert_eq!(assistant_replies.len(), 1);
        assert_eq!(assistant_replies[0].content, "Second answer.");
    }

    /// Delegates to a `MemoryStore` but pauses assistant-message inserts,
    /// letting a superseding turn race the persistence step.
    struct SlowInsertStore {
        inner: MemoryStore,
    }

    #[async_trait]
    impl CoachStore for SlowInsertStore {
        async fn fetch_persona(&self) -> Result<Option<PersonaIdentity>> {
            self.inner.fetch_persona().await
        }

        async fn fetch_active_rules(&self) -> Result<Vec<Rule>> {
            self.inner.fetch_active_rules().await
        }

        async fn fetch_knowledge(
            &self,
            topic_slug: &str,
            limit: usize,
        ) -> Result<Vec<attune_core::model::KnowledgeObject>> {
            self.inner.fetch_knowledge(topic_slug, limit).await
        }

        async fn fetch_all_knowledge(&self) -> Result<Vec<attune_core::model::KnowledgeObject>> {
            self.inner.fetch_all_knowledge().await
        }

        async fn fetch_follower_profile(
            &self,
        ) -> Result<Option<attune_core::model::FollowerProfile>> {
            self.inner.fetch_follower_profile().await
        }

        async fn fetch_topic(&self, slug: &str) -> Result<Option<Topic>> {
            self.inner.fetch_topic(slug).await
        }

        async fn fetch_recent_sessions(&self, limit: usize) -> Result<Vec<ChatSession>> {
            self.inner.fetch_recent_sessions(limit).await
        }

        async fn fetch_messages(&self, session_id: uuid::Uuid) -> Result<Vec<ChatMessage>> {
            self.inner.fetch_messages(session_id).await
        }

        async fn insert_topic(&self, topic: Topic) -> Result<()> {
            self.inner.insert_topic(topic).await
        }

        async fn insert_rule(&self, rule: Rule) -> Result<()> {
            self.inner.insert_rule(rule).await
        }

        async fn insert_knowledge(
            &self,
            knowledge: attune_core::model::KnowledgeObject,
        ) -> Result<()> {
            self.inner.insert_knowledge(knowledge).await
        }

        async fn upsert_persona(&self, persona: PersonaIdentity) -> Result<()> {
            self.inner.upsert_persona(persona).await
        }

        async fn upsert_follower_profile(
            &self,
            profile: attune_core::model::FollowerProfile,
        ) -> Result<()> {
            self.inner.upsert_follower_profile(profile).await
        }

        async fn insert_session(&self, session: ChatSession) -> Result<()> {
            self.inner.insert_session(session).await
        }

        async fn update_session(&self, session: &ChatSession) -> Result<()> {
            self.inner.update_session(session).await
        }

        async fn insert_message(&self, message: ChatMessage) -> Result<()> {
            if message.role == attune_core::model::MessageRole::Assistant {
                tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            }
            self.inner.insert_message(message).await
        }

        async fn update_message(&self, message: &ChatMessage) -> Result<()> {
            self.inner.update_message(message).await
        }

        async fn insert_guardrail(&self, log: GuardrailLog) -> Result<()> {
            self.inner.insert_guardrail(log).await
        }

        async fn fetch_guardrails(&self) -> Result<Vec<GuardrailLog>> {
            self.inner.fetch_guardrails().await
        }
    }

    #[tokio::test]
    async fn store_and_transcript_agree_when_a_slow_persist_is_superseded() {
        let store = Arc::new(SlowInsertStore { inner: MemoryStore::new() });
        let provider = MockProvider::default()
            .stream_with(vec!["Opener."])
            .complete_with(Ok("SAFE".into()))
            .stream_with(vec!["First answer."])
            .complete_with(Ok("SAFE".into()))
            .stream_with(vec!["Second answer."]);
        let (orchestrator, mut rx) =
            ChatOrchestrator::new(store.clone(), mock_client(provider), topic());

        orchestrator.start().await.unwrap();
        orchestrator
            .select_intent(SessionIntent::Clarity)
            .await
            .unwrap();
        next_completion(&mut rx).await;

        orchestrator.send_user_message("first question").await.unwrap();
        // Let the first response finish streaming and reach its slow
        // persistence step before it is superseded.
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        orchestrator.send_user_message("second question").await.unwrap();

        loop {
            if next_completion(&mut rx).await.content == "Second answer." {
                break;
            }
        }

        // Whatever won the race, the persisted messages and the live
        // transcript must name the same assistant responses.
        let session = orchestrator.session().await.unwrap();
        let mut stored: Vec<String> = store
            .fetch_messages(session.id)
            .await
            .unwrap()
            .into_iter()
            .filter(|m| m.role == attune_core::model::MessageRole::Assistant)
            .map(|m| m.content)
            .collect();
        let mut live: Vec<String> = orchestrator
            .transcript()
            .await
            .into_iter()
            .filter(|m| m.role == attune_core::model::MessageRole::Assistant)
            .map(|m| m.content)
            .collect();
        stored.sort();
        live.sort();
        assert_eq!(stored, live);
        assert!(live.contains(&"Second answer.".to_string()));
    }

    #[tokio::test]
    async fn stream_failure_annotates_the_partial_response() {
        let store = Arc::new(MemoryStore::new());
        let provider = MockProvider::default()
            .stream_with(vec!["Opener."])
            .complete_with(Ok("SAFE".into()));
        provider.streams.lock().unwrap().push_back(ScriptedStream::Chunks(vec![
            Ok("Partial ".to_string()),
            Err(LlmError::Streaming("connection reset".into())),
        ]));
        let (orchestrator, mut rx) =
            ChatOrchestrator::new(store.clone(), mock_client(provider), topic());

        orchestrator.start().await.unwrap();
        orchestrator
            .select_intent(SessionIntent::Clarity)
            .await
            .unwrap();
        next_completion(&mut rx).await;

        orchestrator.send_user_message("hello?").await.unwrap();

        let mut saw_error = false;
        let reply = loop {
            match rx.recv().await.unwrap() {
                ChatEvent::Error { .. } => saw_error = true,
                ChatEvent::AssistantCompleted { message, .. } => break message,
                _ => continue,
            }
        };
        assert!(saw_error);
        assert!(reply.content.starts_with("Partial "));
        assert!(reply.content.contains("(Response interrupted:"));
    }

    #[tokio::test]
    async fn wrap_up_parses_the_two_line_format() {
        let store = Arc::new(MemoryStore::new());
        let provider = MockProvider::default()
            .stream_with(vec!["Opener."])
            .complete_with(Ok(
                "TAKEAWAY: Progress beats perfection.\nNEXT_STEP: Write down one priority.".into(),
            ));
        let (orchestrator, mut rx) =
            ChatOrchestrator::new(store.clone(), mock_client(provider), topic());

        orchestrator.start().await.unwrap();
        orchestrator
            .select_intent(SessionIntent::Clarity)
            .await
            .unwrap();
        next_completion(&mut rx).await;

        orchestrator.end_session().await.unwrap();
        loop {
            match rx.recv().await.unwrap() {
                ChatEvent::WrapUp { takeaway, next_step } => {
                    assert_eq!(takeaway, "Progress beats perfection.");
                    assert_eq!(next_step, "Write down one priority.");
                    break;
                }
                _ => continue,
            }
        }

        let session = orchestrator.session().await.unwrap();
        assert_eq!(session.takeaway.as_deref(), Some("Progress beats perfection."));
    }

    #[test]
    fn wrap_up_parsing_falls_back_leniently() {
        let (takeaway, next_step) =
            parse_wrap_up("TAKEAWAY: Keep going.\nNEXT_STEP: Call your mentor.");
        assert_eq!(takeaway, "Keep going.");
        assert_eq!(next_step, "Call your mentor.");

        let rambling = "The model ignored the format entirely and wrote prose.";
        let (takeaway, next_step) = parse_wrap_up(rambling);
        assert_eq!(takeaway, rambling);
        assert_eq!(next_step, MISSING_NEXT_STEP);

        let (_, next_step) = parse_wrap_up("TAKEAWAY: Something.\nNEXT_STEP:   ");
        assert_eq!(next_step, MISSING_NEXT_STEP);
    }

    #[test]
    fn greetings_come_from_the_template_set() {
        let greeting = pick_greeting(&topic());
        assert!(greeting.contains("goal setting"));
        assert!(
            GREETING_TEMPLATES
                .iter()
                .any(|t| t.replace("{topic}", "goal setting") == greeting)
        );
    }
}
