use llm_interface::{build_prompt, LlmProvider};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tidal_core::placeholder;
use tidal_core::{AiVariable, CoreError, CycleContext, MetricKind, MetricValues, Replacer, TitleError};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, info};

/// Stands in for a blank metric inside a prompt so it can still be detected.
pub const EMPTY_METRIC_SENTINEL: &str = "<<<N/A>>>";

/// AI variables whose placeholder appears in `template`, in declaration order.
pub fn referenced_variables<'a>(template: &str, variables: &'a [AiVariable]) -> Vec<&'a AiVariable> {
    let referenced = placeholder::extract_referenced(template);
    variables
        .iter()
        .filter(|variable| referenced.contains(&variable.name))
        .collect()
}

fn metric_replacer(metrics: &MetricValues) -> Result<Replacer, TitleError> {
    let mapping: HashMap<String, String> = MetricKind::ALL
        .into_iter()
        .map(|kind| {
            let value = metrics
                .get(&kind)
                .filter(|value| !value.is_empty())
                .cloned()
                .unwrap_or_else(|| EMPTY_METRIC_SENTINEL.to_string());
            (kind.placeholder(), value)
        })
        .collect();
    Replacer::build(&mapping, false, false)
}

/// The first blank metric referenced by `prompt`, or `fallback` when none is.
fn blank_metric_name(prompt: &str, metrics: &MetricValues, fallback: &str) -> String {
    placeholder::extract_referenced(prompt)
        .into_iter()
        .find(|name| {
            MetricKind::from_name(name)
                .map(|kind| metrics.get(&kind).map_or(true, |v| v.is_empty()))
                .unwrap_or(false)
        })
        .unwrap_or_else(|| fallback.to_string())
}

/// Turns AI variable prompts into values by asking the LLM, one call per variable.
pub struct AiVariableResolver {
    llm: Arc<dyn LlmProvider>,
    per_call_timeout: Duration,
}

impl AiVariableResolver {
    pub fn new(llm: Arc<dyn LlmProvider>, per_call_timeout: Duration) -> Self {
        Self {
            llm,
            per_call_timeout,
        }
    }

    /// Builds the prompt of every AI variable referenced by `template`.
    ///
    /// Metric placeholders inside a prompt are substituted first. A blank
    /// metric becomes [`EMPTY_METRIC_SENTINEL`], which is an error when
    /// `fail_on_empty` is set.
    pub fn prompts(
        &self,
        template: &str,
        variables: &[AiVariable],
        metrics: &MetricValues,
        fail_on_empty: bool,
    ) -> Result<Vec<(String, String)>, TitleError> {
        let used = referenced_variables(template, variables);
        if used.is_empty() {
            return Ok(Vec::new());
        }

        let replacer = metric_replacer(metrics)?;
        let mut prompts = Vec::with_capacity(used.len());
        for variable in used {
            let raw = build_prompt(&variable.prompt_parts());
            let prompt = replacer.replace(&raw);
            if fail_on_empty && prompt.contains(EMPTY_METRIC_SENTINEL) {
                return Err(TitleError::EmptyVariable {
                    variable: blank_metric_name(&raw, metrics, &variable.name),
                });
            }
            debug!("Prompt for {}: {:?}", variable.name, prompt);
            prompts.push((variable.placeholder(), prompt));
        }
        Ok(prompts)
    }

    /// Resolves every AI variable referenced by `template`.
    ///
    /// Returns responses keyed by placeholder, or the first failure. Calls are
    /// made concurrently and each one is bounded by the per-call timeout and
    /// by the cycle deadline. Remaining calls are cancelled once one fails.
    pub async fn resolve(
        &self,
        ctx: &CycleContext,
        template: &str,
        variables: &[AiVariable],
        metrics: &MetricValues,
        fail_on_empty: bool,
    ) -> Result<HashMap<String, String>, CoreError> {
        let prompts = self.prompts(template, variables, metrics, fail_on_empty)?;
        if prompts.is_empty() {
            debug!("Template references no AI variables");
            return Ok(HashMap::new());
        }

        let started = Instant::now();
        let count = prompts.len();
        let mut tasks = JoinSet::new();

        for (key, prompt) in prompts {
            let llm = Arc::clone(&self.llm);
            let limit = ctx.bounded(self.per_call_timeout);

            tasks.spawn(async move {
                let response = match tokio::time::timeout(limit, llm.get_response_text(&prompt, limit))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => Err(CoreError::timeout(format!("LLM call for {}", key), limit)),
                };
                (key, response)
            });
        }

        let mut responses = HashMap::with_capacity(count);
        while let Some(joined) = tasks.join_next().await {
            let (key, response) = match joined {
                Ok(pair) => pair,
                Err(e) => {
                    tasks.abort_all();
                    return Err(CoreError::Internal {
                        message: format!("LLM task ended abnormally: {}", e),
                    });
                }
            };
            match response {
                Ok(text) => {
                    debug!("{} resolved to {:?}", key, text);
                    responses.insert(key, text);
                }
                Err(err) => {
                    error!("Unable to resolve {}: {}", key, err);
                    tasks.abort_all();
                    return Err(err);
                }
            }
        }

        info!(
            "Resolved {} AI variable(s) with {} in {:?}",
            count,
            self.llm.provider_name(),
            started.elapsed()
        );
        Ok(responses)
    }
}
