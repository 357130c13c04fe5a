use std::sync::OnceLock;

use regex::Regex;

/// Three or more dashes on their own or inline separate sections.
fn delimiter() -> &'static Regex {
    static DELIMITER: OnceLock<Regex> = OnceLock::new();
    DELIMITER.get_or_init(|| Regex::new(r"-{3,}").expect("section delimiter regex"))
}

/// Splits raw document text into trimmed, non-empty sections.
pub fn split_sections(content: &str) -> Vec<String> {
    delimiter()
        .split(content)
        .map(str::trim)
        .filter(|section| !section.is_empty())
        .map(String::from)
        .collect()
}
