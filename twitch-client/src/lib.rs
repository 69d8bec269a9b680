pub mod api;
pub mod auth;
pub mod fetcher;
pub mod provider;
pub mod token_guard;


pub use api::TwitchApiClient;
pub use auth::{TwitchAuth, TwitchClientConfig, REQUIRED_SCOPES};
pub use fetcher::{uptime_seconds, MetricFetcher, MetricSource};
pub use provider::{is_unauthorized, MetricsProvider, StreamInfo, TokenGrant};
pub use token_guard::{TokenGuard, TokenStatus};
