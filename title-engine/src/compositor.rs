use std::collections::HashMap;
use tidal_core::placeholder;
use tidal_core::{
    MappingProblem, MetricKind, MetricValues, Replacer, TitleError, TitlePolicy, MAX_TITLE_LENGTH,
};
use tracing::debug;

/// A title ready to publish, with the AI values that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedTitle {
    pub title: String,
    /// Newly resolved AI values keyed by placeholder.
    pub ai_values: HashMap<String, String>,
}

/// Substitutes AI responses and referenced metrics into `template` and checks
/// the result against `policy`.
///
/// `ai_responses` is keyed by placeholder (`$$Name`). Only metrics referenced
/// by the template take part in the substitution.
pub fn compose(
    template: &str,
    ai_responses: &HashMap<String, String>,
    metrics: &MetricValues,
    policy: TitlePolicy,
) -> Result<ComposedTitle, TitleError> {
    let referenced = placeholder::extract_referenced(template);
    let mut mapping = ai_responses.clone();

    for kind in MetricKind::ALL {
        if !referenced.contains(kind.name()) {
            continue;
        }
        let key = kind.placeholder();
        if mapping.contains_key(&key) {
            return Err(TitleError::ConflictingVariable { placeholder: key });
        }
        let value = metrics.get(&kind).cloned().unwrap_or_default();
        mapping.insert(key, value);
    }
    debug!("Title substitution map: {:?}", mapping);

    let replacer = Replacer::build(&mapping, !policy.fail_on_empty_variable, false).map_err(
        |err| match err {
            TitleError::InvalidMapping {
                key,
                problem: MappingProblem::EmptyValue,
            } => TitleError::EmptyVariable {
                variable: placeholder::decode(&key).to_string(),
            },
            other => other,
        },
    )?;

    let title = replacer.replace(template).trim().to_string();

    if policy.fail_on_unknown_variable {
        let leftover = placeholder::extract_referenced(&title);
        if !leftover.is_empty() {
            return Err(TitleError::UnknownVariable {
                names: leftover.into_iter().collect(),
            });
        }
    }

    let length = title.chars().count();
    if policy.fail_on_over_length && length > MAX_TITLE_LENGTH {
        return Err(TitleError::TitleTooLong {
            length,
            max: MAX_TITLE_LENGTH,
        });
    }

    Ok(ComposedTitle {
        title,
        ai_values: ai_responses.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(pairs: &[(MetricKind, &str)]) -> MetricValues {
        let mut values: MetricValues = MetricKind::ALL
            .into_iter()
            .map(|kind| (kind, String::new()))
            .collect();
        for (kind, value) in pairs {
            values.insert(*kind, value.to_string());
        }
        values
    }

    #[test]
    fn test_substitutes_referenced_metrics() {
        let composed = compose(
            "Playing $$Category with $$NumViewers viewers",
            &HashMap::new(),
            &metrics(&[(MetricKind::Category, "Chess"), (MetricKind::NumViewers, "42")]),
            TitlePolicy::default(),
        )
        .unwrap();
        assert_eq!(composed.title, "Playing Chess with 42 viewers");
        assert!(composed.ai_values.is_empty());
    }

    #[test]
    fn test_unreferenced_empty_metrics_are_ignored() {
        let composed = compose(
            "  $$Category  ",
            &HashMap::new(),
            &metrics(&[(MetricKind::Category, "Chess")]),
            TitlePolicy::default(),
        )
        .unwrap();
        assert_eq!(composed.title, "Chess");
    }

    #[test]
    fn test_ai_values_are_substituted_and_returned() {
        let ai = HashMap::from([("$$Mood".to_string(), "Calm".to_string())]);
        let composed = compose(
            "$$Mood $$Category",
            &ai,
            &metrics(&[(MetricKind::Category, "Chess")]),
            TitlePolicy::default(),
        )
        .unwrap();
        assert_eq!(composed.title, "Calm Chess");
        assert_eq!(composed.ai_values, ai);
    }

    #[test]
    fn test_unknown_variable() {
        let err = compose("$$Unknown", &HashMap::new(), &metrics(&[]), TitlePolicy::default())
            .unwrap_err();
        assert_eq!(
            err,
            TitleError::UnknownVariable {
                names: vec!["Unknown".to_string()]
            }
        );

        let lenient = TitlePolicy {
            fail_on_unknown_variable: false,
            ..TitlePolicy::default()
        };
        let composed = compose("$$Unknown", &HashMap::new(), &metrics(&[]), lenient).unwrap();
        assert_eq!(composed.title, "$$Unknown");
    }

    #[test]
    fn test_declared_name_does_not_match_longer_name() {
        let ai: HashMap<String, String> = [("$$Mood".to_string(), "Calm".to_string())]
            .into_iter()
            .collect();
        let all = metrics(&[(MetricKind::Category, "Chess"), (MetricKind::NumViewers, "42")]);

        let err = compose("$$Mood $$Moodier", &ai, &all, TitlePolicy::default()).unwrap_err();
        assert_eq!(
            err,
            TitleError::UnknownVariable {
                names: vec!["Moodier".to_string()]
            }
        );

        let lenient = TitlePolicy {
            fail_on_unknown_variable: false,
            ..TitlePolicy::default()
        };
        let composed = compose("$$Mood $$Moodier", &ai, &all, lenient).unwrap();
        assert_eq!(composed.title, "Calm $$Moodier");
    }

    #[test]
    fn test_empty_variable_policy() {
        let err = compose(
            "Up for $$Uptime",
            &HashMap::new(),
            &metrics(&[]),
            TitlePolicy::default(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            TitleError::EmptyVariable {
                variable: "Uptime".to_string()
            }
        );

        let lenient = TitlePolicy {
            fail_on_empty_variable: false,
            ..TitlePolicy::default()
        };
        let composed = compose("Up for $$Uptime", &HashMap::new(), &metrics(&[]), lenient).unwrap();
        assert_eq!(composed.title, "Up for");
    }

    #[test]
    fn test_conflicting_variable() {
        let ai = HashMap::from([("$$Category".to_string(), "from the model".to_string())]);
        let err = compose(
            "$$Category",
            &ai,
            &metrics(&[(MetricKind::Category, "Chess")]),
            TitlePolicy::default(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            TitleError::ConflictingVariable {
                placeholder: "$$Category".to_string()
            }
        );
    }

    #[test]
    fn test_substring_names_are_ambiguous() {
        let ai = HashMap::from([
            ("$$Mood".to_string(), "Calm".to_string()),
            ("$$MoodLong".to_string(), "Very calm".to_string()),
        ]);
        let err = compose("$$Mood $$MoodLong", &ai, &metrics(&[]), TitlePolicy::default())
            .unwrap_err();
        assert!(matches!(err, TitleError::AmbiguousKey { .. }));
    }

    #[test]
    fn test_length_counts_characters() {
        let ai = HashMap::from([("$$Text".to_string(), "é".repeat(140))]);
        let composed = compose("$$Text", &ai, &metrics(&[]), TitlePolicy::default()).unwrap();
        assert_eq!(composed.title.chars().count(), 140);

        let ai = HashMap::from([("$$Text".to_string(), "é".repeat(141))]);
        let err = compose("$$Text", &ai, &metrics(&[]), TitlePolicy::default()).unwrap_err();
        assert_eq!(err, TitleError::TitleTooLong { length: 141, max: 140 });

        let lenient = TitlePolicy {
            fail_on_over_length: false,
            ..TitlePolicy::default()
        };
        assert!(compose("$$Text", &ai, &metrics(&[]), lenient).is_ok());
    }

    #[test]
    fn test_replacement_output_is_not_rescanned() {
        let ai = HashMap::from([("$$Mood".to_string(), "$$Category".to_string())]);
        let lenient = TitlePolicy {
            fail_on_unknown_variable: false,
            ..TitlePolicy::default()
        };
        let composed = compose(
            "$$Mood",
            &ai,
            &metrics(&[(MetricKind::Category, "Chess")]),
            lenient,
        )
        .unwrap();
        assert_eq!(composed.title, "$$Category");
    }
}
