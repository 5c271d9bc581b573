//! Domain entities.
//!
//! All of these are read-mostly inputs to the conversation core; the
//! orchestrator owns `ChatSession` and its messages for the session's
//! duration, and `GuardrailLog` entries are write-once.

mod follower;
mod guardrail;
mod knowledge;
mod persona;
mod risk;
mod rule;
mod session;
mod tip;
mod topic;

pub use follower::{FeedbackStyle, FollowerProfile};
pub use guardrail::{GuardrailLog, TriggerType};
pub use knowledge::{KnowledgeObject, KnowledgeRole};
pub use persona::PersonaIdentity;
pub use risk::RiskAssessment;
pub use rule::{Rule, RuleCategory};
pub use session::{ChatMessage, ChatSession, MessageRole, SessionIntent};
pub use tip::{CoachingTip, TipSource};
pub use topic::Topic;
