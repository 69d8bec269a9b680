use crate::activity::{ActivityKind, ActivityLog};
use crate::compositor::compose;
use crate::resolver::{referenced_variables, AiVariableResolver};
use llm_interface::{provider_from_config, LlmProvider};
use preferences_store::SharedPreferences;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tidal_core::{
    AppConfig, ConfigError, CoreError, CycleContext, ErrorExt, LlmConfig, MetricValues,
    TitlePolicy,
};
use tokio::time::{timeout_at, Instant};
use tracing::{info, info_span, Instrument};
use twitch_client::{MetricFetcher, MetricsProvider, TokenGuard};
use uuid::Uuid;

/// Where the cycle gets its LLM provider from.
#[derive(Clone)]
pub enum LlmSource {
    Fixed(Arc<dyn LlmProvider>),
    /// Built from the LLM settings in the preferences on every cycle that needs one.
    FromPreferences,
}

impl LlmSource {
    fn provider(&self, config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, CoreError> {
        match self {
            LlmSource::Fixed(provider) => Ok(Arc::clone(provider)),
            LlmSource::FromPreferences => provider_from_config(&config.provider, &config.api_key),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleSettings {
    pub cycle_timeout: Duration,
    pub llm_call_timeout: Duration,
}

impl Default for CycleSettings {
    fn default() -> Self {
        Self {
            cycle_timeout: Duration::from_secs(10),
            llm_call_timeout: Duration::from_secs(5),
        }
    }
}

impl From<&AppConfig> for CycleSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            cycle_timeout: config.cycle_timeout(),
            llm_call_timeout: config.llm_call_timeout(),
        }
    }
}

/// Result of a cycle that published a title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleOutcome {
    pub cycle_id: Uuid,
    pub title: String,
    pub metrics: MetricValues,
    pub ai_values: HashMap<String, String>,
    pub credentials_refreshed: bool,
}

/// One full title update: token check, metric fetch, AI resolution,
/// composition, publish and persist.
pub struct UpdateCycle {
    preferences: SharedPreferences,
    provider: Arc<dyn MetricsProvider>,
    token_guard: TokenGuard,
    fetcher: MetricFetcher,
    llm: LlmSource,
    settings: CycleSettings,
    activity: Arc<ActivityLog>,
}

impl UpdateCycle {
    pub fn new(
        preferences: SharedPreferences,
        provider: Arc<dyn MetricsProvider>,
        llm: LlmSource,
        settings: CycleSettings,
        activity: Arc<ActivityLog>,
    ) -> Self {
        Self {
            preferences,
            token_guard: TokenGuard::new(Arc::clone(&provider)),
            fetcher: MetricFetcher::new(Arc::clone(&provider)),
            provider,
            llm,
            settings,
            activity,
        }
    }

    pub fn preferences(&self) -> &SharedPreferences {
        &self.preferences
    }

    pub fn activity(&self) -> &Arc<ActivityLog> {
        &self.activity
    }

    pub async fn run(&self) -> Result<CycleOutcome, CoreError> {
        let ctx = CycleContext::new(self.settings.cycle_timeout);
        let span = info_span!("update_cycle", cycle_id = %ctx.id);
        let result = self.run_with(&ctx).instrument(span).await;

        if let Err(err) = &result {
            self.activity.record(
                ActivityKind::CycleFailed,
                format!("Title update failed: {}", err.user_friendly_message()),
            );
        }
        result
    }

    async fn run_with(&self, ctx: &CycleContext) -> Result<CycleOutcome, CoreError> {
        let started = Instant::now();
        let snapshot = self.preferences.snapshot().await;

        let missing = snapshot.missing_for_updates();
        if !missing.is_empty() {
            return Err(CoreError::Config(ConfigError::MissingField {
                field: missing.join(", "),
            }));
        }

        let status = self
            .token_guard
            .ensure_fresh(ctx, &snapshot.twitch_config.credentials)
            .await?;
        let credentials_refreshed = status.was_refreshed();
        let credentials = status.into_credentials();
        if credentials_refreshed {
            let refreshed = credentials.clone();
            self.preferences
                .update(move |prefs| {
                    prefs.twitch_config.credentials = refreshed;
                    Ok(())
                })
                .await?;
        }

        let metrics = self.fetcher.fetch(ctx, &credentials).await?;
        let fetched = metrics.clone();
        self.preferences
            .update(move |prefs| {
                prefs.metrics.apply(&fetched);
                Ok(())
            })
            .await?;

        let template = snapshot.title_config.template.as_str();
        let policy = TitlePolicy::from(&snapshot.title_config);

        let ai_responses = if referenced_variables(template, &snapshot.ai_variables).is_empty() {
            HashMap::new()
        } else {
            let llm = self.llm.provider(&snapshot.llm_config)?;
            AiVariableResolver::new(llm, self.settings.llm_call_timeout)
                .resolve(
                    ctx,
                    template,
                    &snapshot.ai_variables,
                    &metrics,
                    policy.fail_on_empty_variable,
                )
                .await?
        };

        let composed = compose(template, &ai_responses, &metrics, policy)?;

        info!("Publishing title {:?}", composed.title);
        timeout_at(
            ctx.deadline,
            self.provider.publish_title(&credentials, &composed.title),
        )
        .await
        .map_err(|_| CoreError::timeout("title publish", started.elapsed()))??;

        let title = composed.title.clone();
        let ai_values = composed.ai_values.clone();
        self.preferences
            .update(move |prefs| {
                prefs.title_config.value = composed.title;
                prefs.apply_ai_values(&composed.ai_values);
                Ok(())
            })
            .await?;

        info!("Title updated in {:?}", started.elapsed());
        self.activity.record(
            ActivityKind::TitleUpdated,
            format!("Title updated to \"{}\"", title),
        );

        Ok(CycleOutcome {
            cycle_id: ctx.id,
            title,
            metrics,
            ai_values,
            credentials_refreshed,
        })
    }
}
