//! Daily coaching tip, read by the home-screen widget surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TipSource {
    Heuristic,
    CoreIdea,
    SessionTakeaway,
}

/// The single "current tip" record the widget surface renders.
/// Refreshed at most once per day via day-seeded deterministic selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoachingTip {
    pub id: Uuid,
    pub tip_text: String,
    pub context: String,
    pub topic_title: String,
    pub topic_slug: String,
    pub topic_icon_name: String,
    pub source: TipSource,
    pub generated_at: DateTime<Utc>,
}
