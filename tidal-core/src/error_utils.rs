use crate::error::*;
use tracing::{error, info, warn};

/// How the scheduler should react to a failed cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Caller misuse, rejected synchronously and never retried.
    Misuse,
    /// Credentials are unusable; stop and ask for re-authentication.
    Reauthenticate,
    /// Retried on the next tick.
    Transient,
}

pub trait ErrorExt {
    fn log_error(&self) -> &Self;
    fn log_warn(&self) -> &Self;
    fn is_retryable(&self) -> bool;
    fn requires_reauth(&self) -> bool;
    fn user_friendly_message(&self) -> String;
    fn error_code(&self) -> String;

    fn classify(&self) -> ErrorClass {
        if self.requires_reauth() {
            ErrorClass::Reauthenticate
        } else if self.is_retryable() {
            ErrorClass::Transient
        } else {
            ErrorClass::Misuse
        }
    }
}

impl ErrorExt for CoreError {
    fn log_error(&self) -> &Self {
        error!("CoreError: {}", self);
        match self {
            CoreError::TwitchApi(e) => {
                error!("Twitch API error details: {:?}", e);
            }
            CoreError::Llm(e) => {
                error!("LLM error details: {:?}", e);
            }
            CoreError::Title(e) => {
                error!("Title error details: {:?}", e);
            }
            CoreError::Config(e) => {
                error!("Configuration error details: {:?}", e);
            }
            _ => {}
        }
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("CoreError (warning): {}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        match self {
            CoreError::TwitchApi(e) => e.is_retryable(),
            CoreError::Llm(e) => e.is_retryable(),
            CoreError::Title(e) => e.is_retryable(),
            CoreError::Scheduler(e) => e.is_retryable(),
            CoreError::Config(_) => false,
            CoreError::InvalidInput { .. } => false,
            CoreError::Io(_)
            | CoreError::Serialization(_)
            | CoreError::Network(_)
            | CoreError::Timeout { .. }
            | CoreError::Internal { .. } => true,
        }
    }

    fn requires_reauth(&self) -> bool {
        match self {
            CoreError::TwitchApi(e) => e.requires_reauth(),
            CoreError::Scheduler(e) => e.requires_reauth(),
            _ => false,
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            CoreError::TwitchApi(e) => e.user_friendly_message(),
            CoreError::Llm(e) => e.user_friendly_message(),
            CoreError::Title(e) => e.user_friendly_message(),
            CoreError::Scheduler(e) => e.user_friendly_message(),
            CoreError::Config(e) => e.user_friendly_message(),
            CoreError::Network(_) => {
                "Network connection error. Please check your internet connection.".to_string()
            }
            CoreError::InvalidInput { message } => format!("Invalid input: {}", message),
            CoreError::Timeout { operation, .. } => {
                format!("{} took too long to complete. It will be retried.", operation)
            }
            _ => "An unexpected error occurred. Please try again later.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            CoreError::TwitchApi(_) => "TWITCH_API".to_string(),
            CoreError::Llm(_) => "LLM".to_string(),
            CoreError::Title(_) => "TITLE".to_string(),
            CoreError::Scheduler(_) => "SCHEDULER".to_string(),
            CoreError::Config(_) => "CONFIG".to_string(),
            CoreError::Io(_) => "IO".to_string(),
            CoreError::Serialization(_) => "SERIALIZATION".to_string(),
            CoreError::Network(_) => "NETWORK".to_string(),
            CoreError::InvalidInput { .. } => "INVALID_INPUT".to_string(),
            CoreError::Timeout { .. } => "TIMEOUT".to_string(),
            CoreError::Internal { .. } => "INTERNAL".to_string(),
        }
    }
}

impl ErrorExt for TwitchApiError {
    fn log_error(&self) -> &Self {
        error!("TwitchApiError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("TwitchApiError (warning): {}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        !self.requires_reauth()
    }

    fn requires_reauth(&self) -> bool {
        matches!(
            self,
            TwitchApiError::Unauthorized
                | TwitchApiError::TokenRefreshFailed { .. }
                | TwitchApiError::AuthenticationFailed { .. }
        )
    }

    fn user_friendly_message(&self) -> String {
        match self {
            TwitchApiError::Unauthorized => {
                "Twitch rejected the access token. Please re-authenticate.".to_string()
            }
            TwitchApiError::TokenRefreshFailed { .. } => {
                "Could not refresh the Twitch access token. Please re-authenticate.".to_string()
            }
            TwitchApiError::AuthenticationFailed { .. } => {
                "Twitch authentication failed. Please check your credentials.".to_string()
            }
            TwitchApiError::RateLimitExceeded { retry_after } => format!(
                "Too many requests. Please wait {} seconds before trying again.",
                retry_after
            ),
            TwitchApiError::StreamOffline { .. } => {
                "The stream is offline, so stream details are unavailable.".to_string()
            }
            TwitchApiError::RequestTimeout => {
                "Request to Twitch timed out. Please try again.".to_string()
            }
            _ => "Twitch API error occurred. Please try again later.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            TwitchApiError::Unauthorized => "TWITCH_UNAUTHORIZED".to_string(),
            TwitchApiError::TokenRefreshFailed { .. } => "TWITCH_TOKEN_REFRESH_FAILED".to_string(),
            TwitchApiError::AuthenticationFailed { .. } => "TWITCH_AUTH_FAILED".to_string(),
            TwitchApiError::RateLimitExceeded { .. } => "TWITCH_RATE_LIMIT".to_string(),
            TwitchApiError::StreamOffline { .. } => "TWITCH_STREAM_OFFLINE".to_string(),
            TwitchApiError::UserNotFound { .. } => "TWITCH_USER_NOT_FOUND".to_string(),
            TwitchApiError::RequestTimeout => "TWITCH_TIMEOUT".to_string(),
            TwitchApiError::InvalidResponse { .. } => "TWITCH_INVALID_RESPONSE".to_string(),
            TwitchApiError::ServerError { .. } => "TWITCH_SERVER_ERROR".to_string(),
            TwitchApiError::UnexpectedStatus { .. } => "TWITCH_UNEXPECTED_STATUS".to_string(),
        }
    }
}

impl ErrorExt for LlmError {
    fn log_error(&self) -> &Self {
        error!("LlmError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("LlmError (warning): {}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        !matches!(self, LlmError::UnknownProvider { .. })
    }

    fn requires_reauth(&self) -> bool {
        false
    }

    fn user_friendly_message(&self) -> String {
        match self {
            LlmError::UnknownProvider { name } => {
                format!("'{}' is not a supported AI provider.", name)
            }
            LlmError::AuthenticationFailed { provider } => format!(
                "Authentication failed for {}. Please check your API key.",
                provider
            ),
            LlmError::InvalidApiKey { provider } => format!(
                "Invalid API key for {}. Please update your credentials.",
                provider
            ),
            LlmError::RateLimitExceeded {
                provider,
                retry_after,
            } => format!(
                "Rate limit exceeded for {}. Please wait {} seconds.",
                provider, retry_after
            ),
            LlmError::ContentFiltered { .. } => {
                "Content was filtered by the AI provider's safety systems.".to_string()
            }
            LlmError::ServiceUnavailable { provider } => format!(
                "{} service is temporarily unavailable. Please try again later.",
                provider
            ),
            LlmError::InvalidResponseFormat { .. } => {
                "AI service returned an unreadable response.".to_string()
            }
        }
    }

    fn error_code(&self) -> String {
        match self {
            LlmError::UnknownProvider { .. } => "LLM_UNKNOWN_PROVIDER".to_string(),
            LlmError::AuthenticationFailed { .. } => "LLM_AUTH_FAILED".to_string(),
            LlmError::InvalidApiKey { .. } => "LLM_INVALID_API_KEY".to_string(),
            LlmError::RateLimitExceeded { .. } => "LLM_RATE_LIMIT".to_string(),
            LlmError::ContentFiltered { .. } => "LLM_CONTENT_FILTERED".to_string(),
            LlmError::ServiceUnavailable { .. } => "LLM_SERVICE_UNAVAILABLE".to_string(),
            LlmError::InvalidResponseFormat { .. } => "LLM_INVALID_RESPONSE".to_string(),
        }
    }
}

impl ErrorExt for TitleError {
    fn log_error(&self) -> &Self {
        error!("TitleError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("TitleError (warning): {}", self);
        self
    }

    // A later tick may bring metrics that satisfy the template.
    fn is_retryable(&self) -> bool {
        !matches!(
            self,
            TitleError::DuplicateVariableName { .. }
                | TitleError::InvalidVariableName { .. }
                | TitleError::VariableNotFound { .. }
        )
    }

    fn requires_reauth(&self) -> bool {
        false
    }

    fn user_friendly_message(&self) -> String {
        match self {
            TitleError::EmptyVariable { variable } => format!(
                "Variable '{}' has no value yet, so the title was not updated.",
                variable
            ),
            TitleError::UnknownVariable { names } => format!(
                "The title template uses undefined variables: {}.",
                names.join(", ")
            ),
            TitleError::TitleTooLong { length, max } => format!(
                "The generated title has {} characters but at most {} are allowed.",
                length, max
            ),
            TitleError::DuplicateVariableName { name } => {
                format!("A variable named '{}' already exists.", name)
            }
            TitleError::AmbiguousKey { key, contained } => format!(
                "Variables '{}' and '{}' overlap; rename one of them.",
                key, contained
            ),
            _ => self.to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            TitleError::InvalidMapping { .. } => "TITLE_INVALID_MAPPING".to_string(),
            TitleError::AmbiguousKey { .. } => "TITLE_AMBIGUOUS_KEY".to_string(),
            TitleError::ConflictingVariable { .. } => "TITLE_CONFLICTING_VARIABLE".to_string(),
            TitleError::EmptyVariable { .. } => "TITLE_EMPTY_VARIABLE".to_string(),
            TitleError::UnknownVariable { .. } => "TITLE_UNKNOWN_VARIABLE".to_string(),
            TitleError::TitleTooLong { .. } => "TITLE_TOO_LONG".to_string(),
            TitleError::DuplicateVariableName { .. } => "TITLE_DUPLICATE_NAME".to_string(),
            TitleError::InvalidVariableName { .. } => "TITLE_INVALID_NAME".to_string(),
            TitleError::VariableNotFound { .. } => "TITLE_VARIABLE_NOT_FOUND".to_string(),
        }
    }
}

impl ErrorExt for SchedulerError {
    fn log_error(&self) -> &Self {
        error!("SchedulerError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("SchedulerError (warning): {}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        match self {
            SchedulerError::StartupCycleFailed { source } => source.is_retryable(),
            _ => false,
        }
    }

    fn requires_reauth(&self) -> bool {
        match self {
            SchedulerError::StartupCycleFailed { source } => source.requires_reauth(),
            _ => false,
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            SchedulerError::InvalidInterval { min, max, .. } => format!(
                "The update interval must be between {} and {} minutes.",
                min, max
            ),
            SchedulerError::AlreadyRunning => "Title updates are already running.".to_string(),
            SchedulerError::StartupCycleFailed { source } => source.user_friendly_message(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            SchedulerError::InvalidInterval { .. } => "SCHEDULER_INVALID_INTERVAL".to_string(),
            SchedulerError::AlreadyRunning => "SCHEDULER_ALREADY_RUNNING".to_string(),
            SchedulerError::StartupCycleFailed { .. } => "SCHEDULER_STARTUP_FAILED".to_string(),
        }
    }
}

impl ErrorExt for ConfigError {
    fn log_error(&self) -> &Self {
        error!("ConfigError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("ConfigError (warning): {}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        false // Config errors need user intervention
    }

    fn requires_reauth(&self) -> bool {
        false
    }

    fn user_friendly_message(&self) -> String {
        match self {
            ConfigError::MissingField { field } => {
                format!("Required configuration field '{}' is missing.", field)
            }
            ConfigError::InvalidValue { field, .. } => {
                format!("Invalid value for configuration field '{}'.", field)
            }
            _ => "Configuration error occurred. Please check your settings.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            ConfigError::MissingField { .. } => "CONFIG_MISSING_FIELD".to_string(),
            ConfigError::InvalidValue { .. } => "CONFIG_INVALID_VALUE".to_string(),
            ConfigError::ValidationFailed { .. } => "CONFIG_VALIDATION_FAILED".to_string(),
            ConfigError::NoConfigDirectory => "CONFIG_NO_DIRECTORY".to_string(),
            ConfigError::Parse(_) => "CONFIG_PARSE_ERROR".to_string(),
        }
    }
}

/// Logs a failed operation together with its code, user message and class.
#[derive(Debug, Default, Clone, Copy)]
pub struct ErrorReporter;

impl ErrorReporter {
    pub fn new() -> Self {
        Self
    }

    pub fn report_error(&self, error: &CoreError) {
        error.log_error();
        info!("Error code: {}", error.error_code());
        info!("User message: {}", error.user_friendly_message());
        info!("Error class: {:?}", error.classify());
    }
}
