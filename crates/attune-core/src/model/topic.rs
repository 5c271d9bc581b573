//! Coaching topics.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A coaching topic. The `slug` is the stable identifier used for knowledge
/// filtering, deep links and guardrail logs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub subtitle: String,
    pub icon_name: String,
    pub sort_order: i32,
    pub is_active: bool,
    pub is_premium: bool,
}

impl Topic {
    pub fn new(
        slug: impl Into<String>,
        title: impl Into<String>,
        subtitle: impl Into<String>,
        icon_name: impl Into<String>,
        sort_order: i32,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            slug: slug.into(),
            title: title.into(),
            subtitle: subtitle.into(),
            icon_name: icon_name.into(),
            sort_order,
            is_active: true,
            is_premium: false,
        }
    }

    pub fn premium(mut self) -> Self {
        self.is_premium = true;
        self
    }
}
