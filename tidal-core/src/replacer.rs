use crate::error::{MappingProblem, TitleError};
use crate::placeholder;
use regex::Regex;
use std::collections::HashMap;
use tracing::debug;

/// Multi-key substitution performed in a single pass.
///
/// Replacement output is never re-scanned, so a value that happens to look
/// like another key is left alone. When keys overlap, the longest key wins at
/// any given position. A key only matches whole names: `$$Mood` leaves
/// `$$Moodier` untouched.
#[derive(Debug, Clone)]
pub struct Replacer {
    pattern: Option<Regex>,
    mapping: HashMap<String, String>,
}

impl Replacer {
    pub fn build(
        mapping: &HashMap<String, String>,
        allow_empty_values: bool,
        allow_substring_keys: bool,
    ) -> Result<Self, TitleError> {
        let mut keys: Vec<&String> = mapping.keys().collect();
        keys.sort();

        for key in &keys {
            if key.is_empty() {
                return Err(TitleError::InvalidMapping {
                    key: String::new(),
                    problem: MappingProblem::EmptyKey,
                });
            }
            if !allow_empty_values && mapping[*key].is_empty() {
                return Err(TitleError::InvalidMapping {
                    key: (*key).clone(),
                    problem: MappingProblem::EmptyValue,
                });
            }
        }

        if !allow_substring_keys {
            for key in &keys {
                for other in &keys {
                    if key != other && key.contains(other.as_str()) {
                        return Err(TitleError::AmbiguousKey {
                            key: (*key).clone(),
                            contained: (*other).clone(),
                        });
                    }
                }
            }
        }

        if keys.is_empty() {
            return Ok(Self {
                pattern: None,
                mapping: HashMap::new(),
            });
        }

        // Regex alternation prefers earlier branches, so longer keys go first.
        keys.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        let alternation = keys
            .iter()
            .map(|k| regex::escape(k))
            .collect::<Vec<_>>()
            .join("|");
        let pattern = Regex::new(&alternation).map_err(|_| TitleError::InvalidMapping {
            key: keys[0].clone(),
            problem: MappingProblem::TooLarge,
        })?;

        debug!("Built replacer over {} keys", keys.len());
        Ok(Self {
            pattern: Some(pattern),
            mapping: mapping.clone(),
        })
    }

    pub fn replace(&self, text: &str) -> String {
        match &self.pattern {
            Some(pattern) => pattern
                .replace_all(text, |caps: &regex::Captures| {
                    let found = &caps[0];
                    let end = caps.get(0).map_or(text.len(), |m| m.end());
                    if Self::continues_name(found, &text[end..]) {
                        return found.to_string();
                    }
                    self.mapping
                        .get(found)
                        .cloned()
                        .unwrap_or_else(|| found.to_string())
                })
                .into_owned(),
            None => text.to_string(),
        }
    }

    /// True when a key ending in a name character is immediately followed by
    /// another one, making the match only the front of a longer name.
    fn continues_name(key: &str, rest: &str) -> bool {
        key.chars().next_back().is_some_and(placeholder::is_name_char)
            && rest.chars().next().is_some_and(placeholder::is_name_char)
    }

    pub fn len(&self) -> usize {
        self.mapping.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }
}
