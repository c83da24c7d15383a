//! Small text helpers shared by dedup, scraping and reporting.

/// Normalize text for dedup keys: trim, lowercase, collapse whitespace runs.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Collapse all whitespace runs (including newlines) to single spaces.
pub fn normalize_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Trim and truncate an error message to `limit` characters, appending an
/// ellipsis when shortened. Operates on characters, not bytes, so multibyte
/// messages from remote servers stay valid UTF-8.
pub fn truncate_error(message: &str, limit: usize) -> String {
    let clean = message.trim();
    if clean.chars().count() <= limit {
        return clean.to_string();
    }
    let cut: String = clean.chars().take(limit.saturating_sub(1)).collect();
    format!("{}…", cut.trim_end())
}

/// Truncate arbitrary text to at most `limit` characters.
pub fn truncate_chars(value: &str, limit: usize) -> String {
    value.chars().take(limit).collect()
}

/// Deduplicate strings preserving first-seen order (case-sensitive keys).
pub fn dedupe_preserve_order<I>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = std::collections::HashSet::new();
    let mut ordered = Vec::new();
    for item in items {
        if seen.insert(item.clone()) {
            ordered.push(item);
        }
    }
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_text_collapses_and_lowercases() {
        assert_eq!(normalize_text("  My   Tool \n Name "), "my tool name");
        assert_eq!(normalize_text(""), "");
    }

    #[test]
    fn truncate_error_limits_length() {
        assert_eq!(truncate_error("  short  ", 140), "short");
        let long = "x".repeat(200);
        let truncated = truncate_error(&long, 140);
        assert_eq!(truncated.chars().count(), 140);
        assert!(truncated.ends_with('…'));
    }

    #[test]
    fn dedupe_keeps_first_occurrence() {
        let out = dedupe_preserve_order(vec![
            "a".to_string(),
            "b".to_string(),
            "a".to_string(),
        ]);
        assert_eq!(out, vec!["a", "b"]);
    }
}
