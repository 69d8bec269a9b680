use crate::auth::{TwitchAuth, TwitchClientConfig};
use crate::provider::{MetricsProvider, StreamInfo, TokenGrant};
use async_trait::async_trait;
use reqwest::header::HeaderValue;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tidal_core::{CoreError, Credentials, TwitchApiError};
use tracing::{debug, error, info, warn};

const DEFAULT_RETRY_AFTER_SECS: u64 = 60;
const STREAMS_ENDPOINT: &str = "/streams";

#[derive(Debug, Clone, Deserialize)]
struct HelixData<T> {
    data: Vec<T>,
}

#[derive(Debug, Clone, Deserialize)]
struct HelixStream {
    viewer_count: u64,
    #[serde(default)]
    game_name: String,
    started_at: String,
}

#[derive(Debug, Clone, Deserialize)]
struct HelixTotal {
    total: u64,
}

/// Maps a non-success Helix status to the error the engine acts on.
pub fn status_error(
    status: StatusCode,
    retry_after: Option<&HeaderValue>,
    endpoint: &str,
) -> TwitchApiError {
    match status {
        StatusCode::UNAUTHORIZED => TwitchApiError::Unauthorized,
        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after = retry_after
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.trim().parse::<u64>().ok())
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
            TwitchApiError::RateLimitExceeded { retry_after }
        }
        status if status.is_server_error() => TwitchApiError::ServerError {
            status_code: status.as_u16(),
        },
        status => TwitchApiError::UnexpectedStatus {
            status_code: status.as_u16(),
            endpoint: endpoint.to_string(),
        },
    }
}

/// Helix client for the broadcaster configured in [`TwitchClientConfig`].
#[derive(Debug, Clone)]
pub struct TwitchApiClient {
    http_client: Client,
    auth: TwitchAuth,
}

impl TwitchApiClient {
    pub fn new(config: TwitchClientConfig, request_timeout: Duration) -> Result<Self, CoreError> {
        let http_client = Client::builder()
            .user_agent(concat!("tidal/", env!("CARGO_PKG_VERSION")))
            .timeout(request_timeout)
            .build()?;

        Ok(Self {
            auth: TwitchAuth::new(config, http_client.clone()),
            http_client,
        })
    }

    pub fn auth(&self) -> &TwitchAuth {
        &self.auth
    }

    fn config(&self) -> &TwitchClientConfig {
        self.auth.config()
    }

    fn broadcaster_query(&self) -> [(&'static str, &str); 1] {
        [("broadcaster_id", self.config().broadcaster_id.as_str())]
    }

    fn build_request(
        &self,
        method: Method,
        endpoint: &str,
        access_token: &str,
        query: &[(&str, &str)],
        body: Option<serde_json::Value>,
    ) -> RequestBuilder {
        let url = format!("{}{}", self.config().helix_url, endpoint);
        let request_builder = self
            .http_client
            .request(method, &url)
            .bearer_auth(access_token)
            .header("Client-Id", &self.config().client_id)
            .query(query);

        match body {
            Some(body) => request_builder.json(&body),
            None => request_builder,
        }
    }

    /// Sends an authenticated Helix request and maps failures to [`TwitchApiError`].
    pub async fn make_request(
        &self,
        method: Method,
        endpoint: &str,
        access_token: &str,
        query: &[(&str, &str)],
        body: Option<serde_json::Value>,
    ) -> Result<Response, CoreError> {
        let start_time = Instant::now();
        let request_builder =
            self.build_request(method.clone(), endpoint, access_token, query, body);

        debug!("Making Twitch API request: {} {}", method, endpoint);
        let response = match request_builder.send().await {
            Ok(response) => response,
            Err(e) => {
                error!("Network error for {} {}: {}", method, endpoint, e);
                if e.is_timeout() {
                    return Err(CoreError::TwitchApi(TwitchApiError::RequestTimeout));
                }
                return Err(CoreError::Network(e));
            }
        };

        let status = response.status();
        if !status.is_success() {
            let err = status_error(status, response.headers().get("retry-after"), endpoint);
            match &err {
                TwitchApiError::RateLimitExceeded { retry_after } => {
                    warn!("Rate limited, retry after {} seconds", retry_after)
                }
                _ => error!(
                    "Request failed with status: {} for {}",
                    status, endpoint
                ),
            }
            return Err(CoreError::TwitchApi(err));
        }

        debug!(
            "Request successful: {} {} in {:?}",
            status,
            endpoint,
            start_time.elapsed()
        );
        Ok(response)
    }

    async fn parse<T: serde::de::DeserializeOwned>(
        response: Response,
        what: &str,
    ) -> Result<T, CoreError> {
        response.json().await.map_err(|e| {
            error!("Failed to parse {}: {}", what, e);
            CoreError::TwitchApi(TwitchApiError::InvalidResponse {
                details: format!("Failed to parse {}", what),
            })
        })
    }

    async fn fetch_total(&self, endpoint: &str, access_token: &str) -> Result<u64, CoreError> {
        let response = self
            .make_request(
                Method::GET,
                endpoint,
                access_token,
                &self.broadcaster_query(),
                None,
            )
            .await?;
        let total: HelixTotal = Self::parse(response, endpoint).await?;
        debug!("{} total: {}", endpoint, total.total);
        Ok(total.total)
    }
}

fn single_stream(
    mut streams: Vec<HelixStream>,
    broadcaster_id: &str,
) -> Result<HelixStream, TwitchApiError> {
    match streams.len() {
        0 => Err(TwitchApiError::StreamOffline {
            user_id: broadcaster_id.to_string(),
        }),
        1 => Ok(streams.remove(0)),
        n => Err(TwitchApiError::InvalidResponse {
            details: format!("{} streams returned for user {}", n, broadcaster_id),
        }),
    }
}

#[async_trait]
impl MetricsProvider for TwitchApiClient {
    async fn fetch_stream_info(&self, credentials: &Credentials) -> Result<StreamInfo, CoreError> {
        // /streams filters by user_id rather than broadcaster_id.
        let response = self
            .make_request(
                Method::GET,
                STREAMS_ENDPOINT,
                &credentials.access_token,
                &[("user_id", self.config().broadcaster_id.as_str())],
                None,
            )
            .await?;

        let streams: HelixData<HelixStream> = Self::parse(response, "stream info").await?;
        let stream = single_stream(streams.data, &self.config().broadcaster_id)?;

        Ok(StreamInfo {
            viewer_count: stream.viewer_count,
            category: stream.game_name,
            started_at: stream.started_at,
        })
    }

    async fn fetch_subscriber_count(&self, credentials: &Credentials) -> Result<u64, CoreError> {
        self.fetch_total("/subscriptions", &credentials.access_token)
            .await
    }

    async fn fetch_follower_count(&self, credentials: &Credentials) -> Result<u64, CoreError> {
        self.fetch_total("/channels/followers", &credentials.access_token)
            .await
    }

    async fn refresh_token(&self, credentials: &Credentials) -> Result<TokenGrant, CoreError> {
        self.auth.refresh(&credentials.refresh_token).await
    }

    async fn publish_title(&self, credentials: &Credentials, title: &str) -> Result<(), CoreError> {
        let response = self
            .make_request(
                Method::PATCH,
                "/channels",
                &credentials.access_token,
                &self.broadcaster_query(),
                Some(serde_json::json!({ "title": title })),
            )
            .await?;

        if response.status() != StatusCode::NO_CONTENT {
            return Err(CoreError::TwitchApi(TwitchApiError::UnexpectedStatus {
                status_code: response.status().as_u16(),
                endpoint: "/channels".to_string(),
            }));
        }

        info!("Published new title: {}", title);
        Ok(())
    }
}
