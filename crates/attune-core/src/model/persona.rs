//! Coaching persona identity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The voice/tone/belief profile the assistant embodies.
///
/// At most one persona is consulted per prompt build. When no persona is
/// stored the composer substitutes [`PersonaIdentity::fallback`] rather than
/// failing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaIdentity {
    pub id: Uuid,
    pub name: String,
    pub voice: String,
    pub tone: String,
    pub coaching_style: String,
    /// Ordered list of core beliefs, rendered as bullets in the prompt.
    pub core_beliefs: Vec<String>,
    pub risk_stance: String,
    /// Ordered list of boundaries, rendered as bullets in the prompt.
    pub boundaries: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

impl PersonaIdentity {
    pub fn new(
        name: impl Into<String>,
        voice: impl Into<String>,
        tone: impl Into<String>,
        coaching_style: impl Into<String>,
        core_beliefs: Vec<String>,
        risk_stance: impl Into<String>,
        boundaries: Vec<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            voice: voice.into(),
            tone: tone.into(),
            coaching_style: coaching_style.into(),
            core_beliefs,
            risk_stance: risk_stance.into(),
            boundaries,
            updated_at: Utc::now(),
        }
    }

    /// Empty-but-valid stand-in used when no persona has been configured.
    pub fn fallback() -> Self {
        Self::new("Simon", "", "", "", Vec::new(), "", Vec::new())
    }
}
