//! Domain layer for the Attune coaching engine.
//!
//! This crate holds the entities the conversation core reads and writes
//! (persona, rules, topics, knowledge, sessions, guardrail logs), the
//! persistence-store trait those entities flow through, the configuration
//! value object, and the event type the orchestrator publishes to whatever
//! presentation layer is attached.
//!
//! Nothing in here performs I/O except [`store::MemoryStore`], and that only
//! against process memory.

pub mod config;
pub mod deeplink;
pub mod entitlement;
pub mod error;
pub mod event;
pub mod model;
pub mod store;
pub mod text;

pub use config::{LlmConfig, ProviderKind};
pub use entitlement::{EntitlementCheck, allow_all_topics};
pub use error::{CoreError, Result};
pub use event::ChatEvent;
pub use store::{CoachStore, MemoryStore};
