use crate::error::TitleError;
use crate::placeholder;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;

pub const MIN_UPDATE_INTERVAL_MINUTES: u32 = 1;
pub const MAX_UPDATE_INTERVAL_MINUTES: u32 = 1440;

/// Platform limit on broadcast titles, in characters.
pub const MAX_TITLE_LENGTH: usize = 140;

/// Credentials are refreshed when they expire within this many seconds.
pub const TOKEN_REFRESH_SKEW_SECS: i64 = 100;

pub const DEFAULT_PROMPT_SUFFIX: &str = "Ensure that your response only contains text relevant to the above information. \
Do not exceed 100 characters. \
Ensure your response does not contain profanities and cannot be construed as political or divisive.";

/// The fixed set of externally sourced values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MetricKind {
    Category,
    Uptime,
    NumViewers,
    NumSubscribers,
    NumFollowers,
}

impl MetricKind {
    pub const ALL: [MetricKind; 5] = [
        MetricKind::Category,
        MetricKind::Uptime,
        MetricKind::NumViewers,
        MetricKind::NumSubscribers,
        MetricKind::NumFollowers,
    ];

    pub fn name(self) -> &'static str {
        match self {
            MetricKind::Category => "Category",
            MetricKind::Uptime => "Uptime",
            MetricKind::NumViewers => "NumViewers",
            MetricKind::NumSubscribers => "NumSubscribers",
            MetricKind::NumFollowers => "NumFollowers",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            MetricKind::Category => "Game or category currently being streamed",
            MetricKind::Uptime => "Current stream duration, in seconds",
            MetricKind::NumViewers => "Current number of viewers of the stream",
            MetricKind::NumSubscribers => "Current number of subscribers to the channel",
            MetricKind::NumFollowers => "Current number of followers of the channel",
        }
    }

    pub fn placeholder(self) -> String {
        placeholder::encode(self.name())
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Metric {
    pub value: String,
    pub description: String,
}

/// One value per metric kind, as fetched in one cycle. Blank means unavailable.
pub type MetricValues = HashMap<MetricKind, String>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Metrics {
    pub category: Metric,
    pub uptime: Metric,
    pub num_viewers: Metric,
    pub num_subscribers: Metric,
    pub num_followers: Metric,
}

impl Default for Metrics {
    fn default() -> Self {
        let metric = |kind: MetricKind| Metric {
            value: String::new(),
            description: kind.description().to_string(),
        };
        Self {
            category: metric(MetricKind::Category),
            uptime: metric(MetricKind::Uptime),
            num_viewers: metric(MetricKind::NumViewers),
            num_subscribers: metric(MetricKind::NumSubscribers),
            num_followers: metric(MetricKind::NumFollowers),
        }
    }
}

impl Metrics {
    pub fn get(&self, kind: MetricKind) -> &Metric {
        match kind {
            MetricKind::Category => &self.category,
            MetricKind::Uptime => &self.uptime,
            MetricKind::NumViewers => &self.num_viewers,
            MetricKind::NumSubscribers => &self.num_subscribers,
            MetricKind::NumFollowers => &self.num_followers,
        }
    }

    pub fn get_mut(&mut self, kind: MetricKind) -> &mut Metric {
        match kind {
            MetricKind::Category => &mut self.category,
            MetricKind::Uptime => &mut self.uptime,
            MetricKind::NumViewers => &mut self.num_viewers,
            MetricKind::NumSubscribers => &mut self.num_subscribers,
            MetricKind::NumFollowers => &mut self.num_followers,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (MetricKind, &Metric)> {
        MetricKind::ALL.into_iter().map(move |kind| (kind, self.get(kind)))
    }

    /// Overwrites the kinds present in `values`; other kinds keep their value.
    pub fn apply(&mut self, values: &MetricValues) {
        for (kind, value) in values {
            self.get_mut(*kind).value = value.clone();
        }
    }

    pub fn values(&self) -> MetricValues {
        self.iter()
            .map(|(kind, metric)| (kind, metric.value.clone()))
            .collect()
    }
}

/// A user-authored prompt whose value is produced by the LLM.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiVariable {
    pub name: String,
    pub value: String,
    pub prompt_main: String,
    pub prompt_suffix: String,
}

impl AiVariable {
    pub fn placeholder(&self) -> String {
        placeholder::encode(&self.name)
    }

    /// The main prompt, then the suffix when one is set.
    pub fn prompt_parts(&self) -> Vec<&str> {
        let mut parts = vec![self.prompt_main.as_str()];
        if !self.prompt_suffix.is_empty() {
            parts.push(self.prompt_suffix.as_str());
        }
        parts
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TitleConfig {
    pub template: String,
    pub update_interval_minutes: u32,
    pub run_immediately_on_start: bool,
    pub fail_on_empty_variable: bool,
    pub fail_on_unknown_variable: bool,
    pub fail_on_over_length: bool,
    /// Last successfully published title.
    pub value: String,
}

impl Default for TitleConfig {
    fn default() -> Self {
        Self {
            template: String::new(),
            update_interval_minutes: MIN_UPDATE_INTERVAL_MINUTES,
            run_immediately_on_start: true,
            fail_on_empty_variable: true,
            fail_on_unknown_variable: true,
            fail_on_over_length: true,
            value: String::new(),
        }
    }
}

/// The subset of [`TitleConfig`] that decides whether a composed title is acceptable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TitlePolicy {
    pub fail_on_empty_variable: bool,
    pub fail_on_unknown_variable: bool,
    pub fail_on_over_length: bool,
}

impl Default for TitlePolicy {
    fn default() -> Self {
        Self {
            fail_on_empty_variable: true,
            fail_on_unknown_variable: true,
            fail_on_over_length: true,
        }
    }
}

impl From<&TitleConfig> for TitlePolicy {
    fn from(config: &TitleConfig) -> Self {
        Self {
            fail_on_empty_variable: config.fail_on_empty_variable,
            fail_on_unknown_variable: config.fail_on_unknown_variable,
            fail_on_over_length: config.fail_on_over_length,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    pub access_token: String,
    pub refresh_token: String,
    pub scopes: Vec<String>,
    pub expiry_unix_timestamp: i64,
}

impl Credentials {
    pub fn needs_refresh(&self, now_unix: i64) -> bool {
        now_unix + TOKEN_REFRESH_SKEW_SECS > self.expiry_unix_timestamp
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TwitchConfig {
    pub user_name: String,
    pub user_id: String,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub credentials: Credentials,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: String,
    pub api_key: String,
    pub default_prompt_suffix: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "Google Gemini".to_string(),
            api_key: String::new(),
            default_prompt_suffix: DEFAULT_PROMPT_SUFFIX.to_string(),
        }
    }
}

pub fn is_valid_redirect_uri(uri: &str) -> bool {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^https?://localhost:\d+$").expect("Invalid redirect URI regex"))
        .is_match(uri)
}

/// The preferences document shared by the engine and any presentation layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub twitch_config: TwitchConfig,
    pub metrics: Metrics,
    pub llm_config: LlmConfig,
    pub ai_variables: Vec<AiVariable>,
    pub title_config: TitleConfig,
}

impl Preferences {
    /// Names of the fields that still need filling in before title updates can start.
    pub fn missing_for_updates(&self) -> Vec<&'static str> {
        let twitch = &self.twitch_config;
        let mut missing = Vec::new();
        if twitch.user_name.is_empty() {
            missing.push("twitch user name");
        }
        if twitch.user_id.is_empty() {
            missing.push("twitch user id");
        }
        if twitch.client_id.is_empty() {
            missing.push("twitch client id");
        }
        if twitch.client_secret.is_empty() {
            missing.push("twitch client secret");
        }
        if !is_valid_redirect_uri(&twitch.redirect_uri) {
            missing.push("twitch redirect uri");
        }
        if twitch.credentials.access_token.is_empty()
            || twitch.credentials.refresh_token.is_empty()
            || twitch.credentials.scopes.is_empty()
        {
            missing.push("twitch credentials");
        }
        if self.title_config.template.trim().is_empty() {
            missing.push("title template");
        }
        let interval = self.title_config.update_interval_minutes;
        if !(MIN_UPDATE_INTERVAL_MINUTES..=MAX_UPDATE_INTERVAL_MINUTES).contains(&interval) {
            missing.push("update interval");
        }
        missing
    }

    pub fn is_ready_for_updates(&self) -> bool {
        self.missing_for_updates().is_empty()
    }

    pub fn ai_variable(&self, name: &str) -> Option<&AiVariable> {
        self.ai_variables.iter().find(|v| v.name == name)
    }

    /// Every declared variable name, metrics first.
    pub fn variable_names(&self) -> Vec<String> {
        MetricKind::ALL
            .iter()
            .map(|kind| kind.name().to_string())
            .chain(self.ai_variables.iter().map(|v| v.name.clone()))
            .collect()
    }

    fn validate_new_name(&self, name: &str) -> Result<(), TitleError> {
        if !placeholder::is_valid_name(name) {
            return Err(TitleError::InvalidVariableName {
                name: name.to_string(),
                reason: "use only letters, digits and underscores".to_string(),
            });
        }
        let lowered = name.to_lowercase();
        if self
            .variable_names()
            .iter()
            .any(|existing| existing.to_lowercase() == lowered)
        {
            return Err(TitleError::DuplicateVariableName {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    fn validate_prompt(name: &str, prompt_main: &str) -> Result<(), TitleError> {
        if prompt_main.is_empty() {
            return Err(TitleError::InvalidVariableName {
                name: name.to_string(),
                reason: "main prompt must not be empty".to_string(),
            });
        }
        Ok(())
    }

    pub fn add_ai_variable(
        &mut self,
        name: &str,
        prompt_main: &str,
        prompt_suffix: &str,
    ) -> Result<(), TitleError> {
        let name = name.trim();
        let prompt_main = prompt_main.trim();
        let prompt_suffix = prompt_suffix.trim();

        self.validate_new_name(name)?;
        Self::validate_prompt(name, prompt_main)?;

        let prompt_suffix = if prompt_suffix.is_empty() {
            self.llm_config.default_prompt_suffix.clone()
        } else {
            prompt_suffix.to_string()
        };
        self.ai_variables.push(AiVariable {
            name: name.to_string(),
            value: String::new(),
            prompt_main: prompt_main.to_string(),
            prompt_suffix,
        });
        Ok(())
    }

    /// Replaces the prompts of an existing variable and clears its stale value.
    pub fn update_ai_variable(
        &mut self,
        name: &str,
        prompt_main: &str,
        prompt_suffix: &str,
    ) -> Result<(), TitleError> {
        let prompt_main = prompt_main.trim();
        Self::validate_prompt(name, prompt_main)?;

        let variable = self
            .ai_variables
            .iter_mut()
            .find(|v| v.name == name)
            .ok_or_else(|| TitleError::VariableNotFound {
                name: name.to_string(),
            })?;
        variable.prompt_main = prompt_main.to_string();
        variable.prompt_suffix = prompt_suffix.trim().to_string();
        variable.value.clear();
        Ok(())
    }

    pub fn remove_ai_variable(&mut self, name: &str) -> Result<AiVariable, TitleError> {
        let index = self
            .ai_variables
            .iter()
            .position(|v| v.name == name)
            .ok_or_else(|| TitleError::VariableNotFound {
                name: name.to_string(),
            })?;
        Ok(self.ai_variables.remove(index))
    }

    /// Stores freshly resolved values, keyed by placeholder.
    pub fn apply_ai_values(&mut self, values: &HashMap<String, String>) {
        for variable in &mut self.ai_variables {
            if let Some(value) = values.get(&variable.placeholder()) {
                variable.value = value.clone();
            }
        }
    }
}
