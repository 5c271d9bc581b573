//! Topic entitlement.
//!
//! Subscription policy is a product decision that lives outside the
//! conversation core. The orchestrator only sees a predicate injected at
//! construction time; the host application decides what it gates on.

use crate::model::Topic;
use std::sync::Arc;

/// Injected `can access topic` predicate.
pub type EntitlementCheck = Arc<dyn Fn(&Topic) -> bool + Send + Sync>;

/// Default predicate: every topic is accessible.
pub fn allow_all_topics() -> EntitlementCheck {
    Arc::new(|_| true)
}
