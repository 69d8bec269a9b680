use async_trait::async_trait;
use serde::Deserialize;
use tidal_core::{CoreError, Credentials, TwitchApiError};

/// The live-stream fields the engine turns into metrics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamInfo {
    pub viewer_count: u64,
    pub category: String,
    /// RFC 3339 timestamp as reported by the platform.
    pub started_at: String,
}

/// Response of the OAuth token endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub scope: Vec<String>,
    pub expires_in: i64,
}

impl TokenGrant {
    pub fn into_credentials(self, now_unix: i64) -> Credentials {
        Credentials {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            scopes: self.scope,
            expiry_unix_timestamp: now_unix + self.expires_in,
        }
    }
}

/// Everything the engine needs from the streaming platform.
///
/// Implementations report a rejected access token as
/// [`TwitchApiError::Unauthorized`] so callers can tell it apart from other
/// failures.
#[async_trait]
pub trait MetricsProvider: Send + Sync {
    async fn fetch_stream_info(&self, credentials: &Credentials) -> Result<StreamInfo, CoreError>;

    async fn fetch_subscriber_count(&self, credentials: &Credentials) -> Result<u64, CoreError>;

    async fn fetch_follower_count(&self, credentials: &Credentials) -> Result<u64, CoreError>;

    async fn refresh_token(&self, credentials: &Credentials) -> Result<TokenGrant, CoreError>;

    async fn publish_title(&self, credentials: &Credentials, title: &str)
        -> Result<(), CoreError>;
}

pub fn is_unauthorized(error: &CoreError) -> bool {
    matches!(error, CoreError::TwitchApi(TwitchApiError::Unauthorized))
}
