//! Day-seeded coaching tip selection.
//!
//! The widget surface shows one tip per day. Selection is deterministic for
//! a given candidate pool and date so every refresh within the same day
//! lands on the same tip.

use attune_core::model::{CoachingTip, TipSource};
use attune_core::{CoachStore, Result};
use chrono::{Datelike, NaiveDate, Utc};
use uuid::Uuid;

/// Sessions whose takeaways feed the candidate pool.
const RECENT_SESSION_LIMIT: usize = 10;

/// Picks the day's tip from a candidate pool.
///
/// Seed is `year * 1000 + day_of_year`. Session takeaways are preferred for
/// roughly 30% of days when any exist; the index is `seed % pool.len()`.
pub fn select_tip(candidates: &[CoachingTip], date: NaiveDate) -> Option<CoachingTip> {
    if candidates.is_empty() {
        return None;
    }

    let seed = date.year() as usize * 1000 + date.ordinal() as usize;

    let takeaways: Vec<&CoachingTip> = candidates
        .iter()
        .filter(|tip| tip.source == TipSource::SessionTakeaway)
        .collect();
    let use_takeaway = !takeaways.is_empty() && seed % 10 < 3;

    if use_takeaway {
        Some(takeaways[seed % takeaways.len()].clone())
    } else {
        Some(candidates[seed % candidates.len()].clone())
    }
}

/// Assembles the candidate pool from the store and selects the day's tip.
///
/// Candidates: every knowledge heuristic, every knowledge core idea, and the
/// takeaways of the most recent sessions. Entries whose topic no longer
/// exists are skipped. Returns `None` when there is nothing to show.
pub async fn refresh_tip(
    store: &dyn CoachStore,
    date: NaiveDate,
) -> Result<Option<CoachingTip>> {
    let mut candidates: Vec<CoachingTip> = Vec::new();

    for ko in store.fetch_all_knowledge().await? {
        let Some(topic) = store.fetch_topic(&ko.topic_slug).await? else {
            continue;
        };

        for heuristic in &ko.heuristics {
            candidates.push(make_tip(
                heuristic,
                &ko.when_to_use,
                &topic.title,
                &topic.slug,
                &topic.icon_name,
                TipSource::Heuristic,
            ));
        }

        candidates.push(make_tip(
            &ko.core_idea,
            &ko.when_to_use,
            &topic.title,
            &topic.slug,
            &topic.icon_name,
            TipSource::CoreIdea,
        ));
    }

    for session in store.fetch_recent_sessions(RECENT_SESSION_LIMIT).await? {
        let Some(takeaway) = session.takeaway.as_deref().filter(|t| !t.is_empty()) else {
            continue;
        };
        let Some(topic) = store.fetch_topic(&session.topic_slug).await? else {
            continue;
        };

        candidates.push(make_tip(
            takeaway,
            session.next_step.as_deref().unwrap_or(""),
            &topic.title,
            &topic.slug,
            &topic.icon_name,
            TipSource::SessionTakeaway,
        ));
    }

    Ok(select_tip(&candidates, date))
}

fn make_tip(
    tip_text: &str,
    context: &str,
    topic_title: &str,
    topic_slug: &str,
    topic_icon_name: &str,
    source: TipSource,
) -> CoachingTip {
    CoachingTip {
        id: Uuid::new_v4(),
        tip_text: tip_text.to_string(),
        context: context.to_string(),
        topic_title: topic_title.to_string(),
        topic_slug: topic_slug.to_string(),
        topic_icon_name: topic_icon_name.to_string(),
        source,
        generated_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use attune_core::MemoryStore;
    use attune_core::model::{ChatSession, KnowledgeObject, KnowledgeRole, Topic};

    fn tip(text: &str, source: TipSource) -> CoachingTip {
        make_tip(text, "ctx", "Goal Setting", "goal-setting", "target", source)
    }

    #[test]
    fn selection_is_deterministic_per_day() {
        let pool = vec![
            tip("a", TipSource::Heuristic),
            tip("b", TipSource::CoreIdea),
            tip("c", TipSource::Heuristic),
        ];
        let date = NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();

        let first = select_tip(&pool, date).unwrap();
        let second = select_tip(&pool, date).unwrap();
        assert_eq!(first.tip_text, second.tip_text);
    }

    #[test]
    fn takeaway_preference_follows_the_seed() {
        let pool = vec![
            tip("idea", TipSource::CoreIdea),
            tip("takeaway", TipSource::SessionTakeaway),
        ];

        // seed = 2026 * 1000 + 1 = 2026001; 2026001 % 10 = 1 < 3, so the
        // takeaway pool is used.
        let date = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        assert_eq!(select_tip(&pool, date).unwrap().tip_text, "takeaway");

        // seed = 2026004; 4 >= 3, full pool, index 2026004 % 2 = 0.
        let date = NaiveDate::from_ymd_opt(2026, 1, 4).unwrap();
        assert_eq!(select_tip(&pool, date).unwrap().tip_text, "idea");
    }

    #[test]
    fn empty_pool_selects_nothing() {
        let date = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        assert!(select_tip(&[], date).is_none());
    }

    #[tokio::test]
    async fn refresh_gathers_heuristics_ideas_and_takeaways() {
        let store = MemoryStore::new();
        store
            .insert_topic(Topic::new("goal-setting", "Goal Setting", "sub", "target", 1))
            .await
            .unwrap();
        store
            .insert_knowledge(KnowledgeObject::new(
                "goal-setting",
                "Start small.",
                "When overwhelmed",
                vec!["One step at a time".into()],
                vec![],
                "Course",
                KnowledgeRole::Knowledge,
            ))
            .await
            .unwrap();

        let mut session = ChatSession::new("goal-setting");
        session.takeaway = Some("Progress beats perfection.".into());
        store.insert_session(session).await.unwrap();

        // Sessions on a topic that no longer exists contribute nothing.
        let mut orphan = ChatSession::new("deleted-topic");
        orphan.takeaway = Some("ghost".into());
        store.insert_session(orphan).await.unwrap();

        let date = NaiveDate::from_ymd_opt(2026, 1, 4).unwrap();
        let selected = refresh_tip(&store, date).await.unwrap().unwrap();
        assert_ne!(selected.tip_text, "ghost");
        assert_eq!(selected.topic_slug, "goal-setting");
    }
}
