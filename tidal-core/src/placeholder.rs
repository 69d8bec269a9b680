//! `$$Name` placeholders as they appear in title templates and AI prompts.

use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;

pub const PLACEHOLDER_PREFIX: &str = "$$";

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\$\$(\w+)").expect("Invalid placeholder regex"))
}

pub fn encode(name: &str) -> String {
    format!("{}{}", PLACEHOLDER_PREFIX, name)
}

/// Strips the prefix once. Text without the prefix is returned unchanged.
pub fn decode(placeholder: &str) -> &str {
    placeholder
        .strip_prefix(PLACEHOLDER_PREFIX)
        .unwrap_or(placeholder)
}

/// Unique names referenced in `text`, in sorted order.
pub fn extract_referenced(text: &str) -> BTreeSet<String> {
    placeholder_pattern()
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\w+$").expect("Invalid name regex"))
}

/// True when `name` could be written as a placeholder and read back whole.
pub fn is_valid_name(name: &str) -> bool {
    name_pattern().is_match(name)
}

/// True when `c` may appear inside a placeholder name.
pub fn is_name_char(c: char) -> bool {
    is_valid_name(c.encode_utf8(&mut [0; 4]))
}
