//! Deep-link parsing.
//!
//! The host application registers a custom URI scheme; a link of the form
//! `scheme://topic/<slug>` opens that topic's chat.

/// Extracts the topic slug from a `scheme://topic/<slug>` URI.
/// Returns `None` for any other shape.
pub fn parse_topic_link<'a>(uri: &'a str, scheme: &str) -> Option<&'a str> {
    let rest = uri.strip_prefix(scheme)?.strip_prefix("://")?;
    let slug = rest.strip_prefix("topic/")?;
    let slug = slug.split(['?', '#']).next().unwrap_or(slug);
    let slug = slug.trim_end_matches('/');
    if slug.is_empty() || slug.contains('/') {
        return None;
    }
    Some(slug)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_topic_links() {
        assert_eq!(
            parse_topic_link("attune://topic/goal-setting", "attune"),
            Some("goal-setting")
        );
        assert_eq!(
            parse_topic_link("attune://topic/second-brain/", "attune"),
            Some("second-brain")
        );
    }

    #[test]
    fn rejects_other_shapes() {
        assert_eq!(parse_topic_link("attune://settings", "attune"), None);
        assert_eq!(parse_topic_link("other://topic/x", "attune"), None);
        assert_eq!(parse_topic_link("attune://topic/", "attune"), None);
        assert_eq!(parse_topic_link("attune://topic/a/b", "attune"), None);
    }
}
