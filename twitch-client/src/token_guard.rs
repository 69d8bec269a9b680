use crate::provider::MetricsProvider;
use chrono::Utc;
use std::sync::Arc;
use tidal_core::{CoreError, Credentials, CycleContext, TwitchApiError};
use tokio::time::{timeout_at, Instant};
use tracing::{error, info};

/// Outcome of a freshness check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenStatus {
    Fresh(Credentials),
    /// New credentials that must be persisted before they are used.
    Refreshed(Credentials),
}

impl TokenStatus {
    pub fn credentials(&self) -> &Credentials {
        match self {
            TokenStatus::Fresh(credentials) | TokenStatus::Refreshed(credentials) => credentials,
        }
    }

    pub fn into_credentials(self) -> Credentials {
        match self {
            TokenStatus::Fresh(credentials) | TokenStatus::Refreshed(credentials) => credentials,
        }
    }

    pub fn was_refreshed(&self) -> bool {
        matches!(self, TokenStatus::Refreshed(_))
    }
}

pub struct TokenGuard {
    provider: Arc<dyn MetricsProvider>,
}

impl TokenGuard {
    pub fn new(provider: Arc<dyn MetricsProvider>) -> Self {
        Self { provider }
    }

    pub async fn ensure_fresh(
        &self,
        ctx: &CycleContext,
        credentials: &Credentials,
    ) -> Result<TokenStatus, CoreError> {
        self.ensure_fresh_at(ctx, credentials, Utc::now().timestamp())
            .await
    }

    pub async fn ensure_fresh_at(
        &self,
        ctx: &CycleContext,
        credentials: &Credentials,
        now_unix: i64,
    ) -> Result<TokenStatus, CoreError> {
        if !credentials.needs_refresh(now_unix) {
            return Ok(TokenStatus::Fresh(credentials.clone()));
        }

        info!(
            "Access token expires at {}, refreshing",
            credentials.expiry_unix_timestamp
        );
        let started = Instant::now();
        let grant = match timeout_at(ctx.deadline, self.provider.refresh_token(credentials)).await
        {
            Err(_) => {
                error!("Token refresh hit the cycle deadline");
                return Err(CoreError::timeout("token refresh", started.elapsed()));
            }
            Ok(Err(CoreError::TwitchApi(err @ TwitchApiError::TokenRefreshFailed { .. }))) => {
                error!("Token refresh failed: {}", err);
                return Err(CoreError::TwitchApi(err));
            }
            Ok(Err(err)) => {
                error!("Token refresh failed: {}", err);
                return Err(CoreError::TwitchApi(TwitchApiError::TokenRefreshFailed {
                    reason: err.to_string(),
                }));
            }
            Ok(Ok(grant)) => grant,
        };

        if grant.access_token.is_empty() {
            return Err(CoreError::TwitchApi(TwitchApiError::TokenRefreshFailed {
                reason: "token endpoint returned an empty access token".to_string(),
            }));
        }

        let refreshed = grant.into_credentials(now_unix);
        info!(
            "Access token refreshed, valid until {}",
            refreshed.expiry_unix_timestamp
        );
        Ok(TokenStatus::Refreshed(refreshed))
    }
}
