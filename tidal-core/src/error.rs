use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Twitch API error: {0}")]
    TwitchApi(#[from] TwitchApiError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Title error: {0}")]
    Title(#[from] TitleError),

    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("{operation} timed out after {elapsed:?}")]
    Timeout { operation: String, elapsed: Duration },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl CoreError {
    pub fn timeout(operation: impl Into<String>, elapsed: Duration) -> Self {
        CoreError::Timeout {
            operation: operation.into(),
            elapsed,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TwitchApiError {
    #[error("Unauthorized: the access token was rejected")]
    Unauthorized,

    #[error("Token refresh failed: {reason}")]
    TokenRefreshFailed { reason: String },

    #[error("Authentication failed: {reason}")]
    AuthenticationFailed { reason: String },

    #[error("Rate limit exceeded. Retry after {retry_after} seconds")]
    RateLimitExceeded { retry_after: u64 },

    #[error("No live stream found for user {user_id}")]
    StreamOffline { user_id: String },

    #[error("User not found: {login}")]
    UserNotFound { login: String },

    #[error("Request timeout")]
    RequestTimeout,

    #[error("Invalid API response: {details}")]
    InvalidResponse { details: String },

    #[error("Server error: {status_code}")]
    ServerError { status_code: u16 },

    #[error("Unexpected status {status_code} from {endpoint}")]
    UnexpectedStatus { status_code: u16, endpoint: String },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LlmError {
    #[error("Unknown LLM provider: {name}")]
    UnknownProvider { name: String },

    #[error("Provider authentication failed: {provider}")]
    AuthenticationFailed { provider: String },

    #[error("API key invalid or missing for {provider}")]
    InvalidApiKey { provider: String },

    #[error("Rate limit exceeded for {provider}. Retry after {retry_after} seconds")]
    RateLimitExceeded { provider: String, retry_after: u64 },

    #[error("Content filtered by provider: {reason}")]
    ContentFiltered { reason: String },

    #[error("Provider service unavailable: {provider}")]
    ServiceUnavailable { provider: String },

    #[error("Invalid response format from {provider}")]
    InvalidResponseFormat { provider: String },
}

/// Why a substitution mapping was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingProblem {
    EmptyKey,
    EmptyValue,
    TooLarge,
}

impl std::fmt::Display for MappingProblem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MappingProblem::EmptyKey => write!(f, "key must not be empty"),
            MappingProblem::EmptyValue => write!(f, "value must not be empty"),
            MappingProblem::TooLarge => write!(f, "mapping is too large to compile"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TitleError {
    #[error("Invalid mapping for {key:?}: {problem}")]
    InvalidMapping { key: String, problem: MappingProblem },

    #[error("Ambiguous replacement: key {key:?} contains key {contained:?}")]
    AmbiguousKey { key: String, contained: String },

    #[error("Conflicting variable: {placeholder} is both a metric and an AI variable")]
    ConflictingVariable { placeholder: String },

    #[error("Variable {variable} has an empty value")]
    EmptyVariable { variable: String },

    #[error("Unknown variables in title: {}", .names.join(", "))]
    UnknownVariable { names: Vec<String> },

    #[error("Title is too long ({length} characters, maximum {max})")]
    TitleTooLong { length: usize, max: usize },

    #[error("Variable name {name:?} is already in use")]
    DuplicateVariableName { name: String },

    #[error("Invalid variable name {name:?}: {reason}")]
    InvalidVariableName { name: String, reason: String },

    #[error("Variable not found: {name}")]
    VariableNotFound { name: String },
}

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Update interval of {minutes} minutes is outside {min}..={max}")]
    InvalidInterval { minutes: u32, min: u32, max: u32 },

    #[error("Scheduler is already running - stop it first")]
    AlreadyRunning,

    #[error("Initial update cycle failed: {source}")]
    StartupCycleFailed {
        #[source]
        source: Box<CoreError>,
    },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("Configuration validation failed: {reason}")]
    ValidationFailed { reason: String },

    #[error("No configuration directory available on this platform")]
    NoConfigDirectory,

    #[error("Configuration parsing error: {0}")]
    Parse(#[from] toml::de::Error),
}
