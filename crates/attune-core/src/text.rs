//! Small string helpers shared across the workspace.

/// Truncates `text` to at most `max` characters, appending `...` when
/// anything was cut. Counts characters, not bytes, so multi-byte input
/// never splits mid-codepoint.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_strings_pass_through() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello", 5), "hello");
    }

    #[test]
    fn long_strings_get_ellipsis() {
        assert_eq!(truncate("hello world", 5), "hello...");
    }

    #[test]
    fn multibyte_input_is_not_split_mid_codepoint() {
        assert_eq!(truncate("héllo wörld", 7), "héllo w...");
    }
}
