use std::collections::HashMap;
use tidal_core::placeholder;
use tidal_core::{Replacer, TitleError, MAX_TITLE_LENGTH};

/// What a template editor needs to know about a template before it is saved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateAnalysis {
    /// Referenced names that are neither a metric nor an AI variable, sorted.
    pub undefined: Vec<String>,
    /// Characters left for variable values once every known placeholder is
    /// blanked. Negative when the literal text alone is over the limit.
    pub remaining_chars: i64,
}

impl TemplateAnalysis {
    pub fn is_valid(&self) -> bool {
        self.undefined.is_empty() && self.remaining_chars >= 0
    }
}

pub fn analyze_template(
    template: &str,
    known_names: &[String],
) -> Result<TemplateAnalysis, TitleError> {
    let undefined = placeholder::extract_referenced(template)
        .into_iter()
        .filter(|name| !known_names.contains(name))
        .collect();

    // Known names may overlap as substrings here; every one of them is blanked.
    let blanks: HashMap<String, String> = known_names
        .iter()
        .map(|name| (placeholder::encode(name), String::new()))
        .collect();
    let remover = Replacer::build(&blanks, true, true)?;
    let literal_len = remover.replace(template).chars().count() as i64;

    Ok(TemplateAnalysis {
        undefined,
        remaining_chars: MAX_TITLE_LENGTH as i64 - literal_len,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_counts_literal_characters_only() {
        let analysis = analyze_template(
            "Playing $$Category for $$Uptime seconds",
            &names(&["Category", "Uptime"]),
        )
        .unwrap();
        assert!(analysis.undefined.is_empty());
        assert_eq!(analysis.remaining_chars, 140 - "Playing  for  seconds".len() as i64);
        assert!(analysis.is_valid());
    }

    #[test]
    fn test_reports_undefined_names() {
        let analysis =
            analyze_template("$$Mood $$Category $$Missing $$Mood", &names(&["Category", "Mood"]))
                .unwrap();
        assert_eq!(analysis.undefined, vec!["Missing".to_string()]);
        assert!(!analysis.is_valid());
    }

    #[test]
    fn test_overlapping_names_are_all_blanked() {
        let analysis =
            analyze_template("$$Viewers/$$ViewersPeak", &names(&["Viewers", "ViewersPeak"]))
                .unwrap();
        assert_eq!(analysis.remaining_chars, 139);
    }

    #[test]
    fn test_undefined_extension_of_known_name_counts_whole() {
        let analysis = analyze_template("$$Viewers $$ViewersX", &names(&["Viewers"])).unwrap();
        assert_eq!(analysis.undefined, vec!["ViewersX".to_string()]);
        assert_eq!(analysis.remaining_chars, 140 - " $$ViewersX".len() as i64);
    }

    #[test]
    fn test_over_length_literal_text() {
        let template = "x".repeat(150);
        let analysis = analyze_template(&template, &[]).unwrap();
        assert_eq!(analysis.remaining_chars, -10);
        assert!(!analysis.is_valid());
    }
}
