//! Application layer for the Attune coaching engine.
//!
//! Wires the domain and interaction layers into the behaviors a host
//! application drives: risk assessment, prompt composition, the session
//! orchestrator, knowledge ingestion and daily-tip selection.

pub mod chat;
pub mod knowledge;
pub mod prompt;
pub mod risk;
pub mod templates;
pub mod tips;

pub use chat::{ChatOrchestrator, SessionState};
pub use knowledge::{Classification, KnowledgeProcessor, chunk_by_idea};
pub use prompt::PromptComposer;
pub use risk::RiskAssessor;
pub use tips::{refresh_tip, select_tip};
