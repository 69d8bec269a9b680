use crate::provider::TokenGrant;
use oauth2::basic::BasicClient;
use oauth2::{AuthUrl, ClientId, ClientSecret, CsrfToken, RedirectUrl, Scope, TokenUrl};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tidal_core::{ConfigError, CoreError, TwitchApiError, TwitchConfig};
use tracing::{debug, error, info};
use url::Url;

pub const TWITCH_AUTHORIZE_URL: &str = "https://id.twitch.tv/oauth2/authorize";
pub const TWITCH_TOKEN_URL: &str = "https://id.twitch.tv/oauth2/token";
pub const TWITCH_HELIX_URL: &str = "https://api.twitch.tv/helix";

/// Scopes needed to read every metric and to change the channel title.
pub const REQUIRED_SCOPES: [&str; 3] = [
    "channel:read:subscriptions",
    "moderator:read:followers",
    "channel:manage:broadcast",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TwitchClientConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub broadcaster_id: String,
    pub authorize_url: String,
    pub token_url: String,
    pub helix_url: String,
}

impl TwitchClientConfig {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
        broadcaster_id: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: redirect_uri.into(),
            broadcaster_id: broadcaster_id.into(),
            authorize_url: TWITCH_AUTHORIZE_URL.to_string(),
            token_url: TWITCH_TOKEN_URL.to_string(),
            helix_url: TWITCH_HELIX_URL.to_string(),
        }
    }

    pub fn from_preferences(config: &TwitchConfig) -> Self {
        Self::new(
            &config.client_id,
            &config.client_secret,
            &config.redirect_uri,
            &config.user_id,
        )
    }

    pub fn with_base_urls(
        mut self,
        authorize_url: impl Into<String>,
        token_url: impl Into<String>,
        helix_url: impl Into<String>,
    ) -> Self {
        self.authorize_url = authorize_url.into();
        self.token_url = token_url.into();
        self.helix_url = helix_url.into();
        self
    }
}

#[derive(Debug, Deserialize)]
struct TokenErrorBody {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct UsersResponse {
    data: Vec<UserData>,
}

#[derive(Debug, Deserialize)]
struct UserData {
    id: String,
}

/// OAuth helpers for the authorization-code flow and token refresh.
///
/// Token endpoint calls are plain form posts because Twitch returns `scope`
/// as a JSON array, which the generic OAuth token response cannot parse.
#[derive(Debug, Clone)]
pub struct TwitchAuth {
    config: TwitchClientConfig,
    http_client: Client,
}

impl TwitchAuth {
    pub fn new(config: TwitchClientConfig, http_client: Client) -> Self {
        Self {
            config,
            http_client,
        }
    }

    pub fn config(&self) -> &TwitchClientConfig {
        &self.config
    }

    fn oauth_client(&self) -> Result<BasicClient, CoreError> {
        let invalid = |field: &str, value: &str| {
            CoreError::Config(ConfigError::InvalidValue {
                field: field.to_string(),
                value: value.to_string(),
            })
        };

        let auth_url = AuthUrl::new(self.config.authorize_url.clone())
            .map_err(|_| invalid("authorize_url", &self.config.authorize_url))?;
        let token_url = TokenUrl::new(self.config.token_url.clone())
            .map_err(|_| invalid("token_url", &self.config.token_url))?;
        let redirect_url = RedirectUrl::new(self.config.redirect_uri.clone())
            .map_err(|_| invalid("redirect_uri", &self.config.redirect_uri))?;

        Ok(BasicClient::new(
            ClientId::new(self.config.client_id.clone()),
            Some(ClientSecret::new(self.config.client_secret.clone())),
            auth_url,
            Some(token_url),
        )
        .set_redirect_uri(redirect_url))
    }

    /// Builds the browser URL for the consent page and the CSRF state it carries.
    pub fn authorize_url(&self, scopes: &[&str]) -> Result<(String, CsrfToken), CoreError> {
        let client = self.oauth_client()?;
        let (url, csrf_token) = client
            .authorize_url(CsrfToken::new_random)
            .add_scopes(scopes.iter().map(|s| Scope::new(s.to_string())))
            .add_extra_param("force_verify", "true")
            .url();

        info!("Generated Twitch authorization URL");
        Ok((url.to_string(), csrf_token))
    }

    /// Extracts the authorization code from the redirect the browser was sent to.
    pub fn parse_callback(callback_url: &str, expected_state: &str) -> Result<String, CoreError> {
        let url = Url::parse(callback_url).map_err(|e| {
            CoreError::TwitchApi(TwitchApiError::AuthenticationFailed {
                reason: format!("invalid callback URL: {}", e),
            })
        })?;

        let mut code = None;
        let mut state = None;
        let mut denied = None;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "code" => code = Some(value.into_owned()),
                "state" => state = Some(value.into_owned()),
                "error" => denied = Some(value.into_owned()),
                _ => {}
            }
        }

        if let Some(reason) = denied {
            error!("Authorization was denied: {}", reason);
            return Err(CoreError::TwitchApi(TwitchApiError::AuthenticationFailed {
                reason,
            }));
        }
        if state.as_deref() != Some(expected_state) {
            return Err(CoreError::TwitchApi(TwitchApiError::AuthenticationFailed {
                reason: "state parameter does not match".to_string(),
            }));
        }
        match code {
            Some(code) if !code.is_empty() => Ok(code),
            _ => Err(CoreError::TwitchApi(TwitchApiError::AuthenticationFailed {
                reason: "missing authorization code".to_string(),
            })),
        }
    }

    pub async fn exchange_code(&self, code: &str) -> Result<TokenGrant, CoreError> {
        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", self.config.redirect_uri.as_str()),
        ];
        self.request_token(&params)
            .await
            .map_err(|reason| {
                CoreError::TwitchApi(TwitchApiError::AuthenticationFailed { reason })
            })
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, CoreError> {
        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];
        self.request_token(&params)
            .await
            .map_err(|reason| CoreError::TwitchApi(TwitchApiError::TokenRefreshFailed { reason }))
    }

    async fn request_token(&self, params: &[(&str, &str)]) -> Result<TokenGrant, String> {
        debug!("Requesting token from {}", self.config.token_url);
        let response = self
            .http_client
            .post(&self.config.token_url)
            .form(params)
            .send()
            .await
            .map_err(|e| format!("token request failed: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            let body: TokenErrorBody = response.json().await.unwrap_or(TokenErrorBody {
                message: String::new(),
            });
            error!("Token endpoint returned {}: {}", status, body.message);
            return Err(format!("token endpoint returned {} {}", status, body.message)
                .trim_end()
                .to_string());
        }

        response
            .json::<TokenGrant>()
            .await
            .map_err(|e| format!("unable to decode token response: {}", e))
    }

    pub async fn fetch_user_id(&self, login: &str, access_token: &str) -> Result<String, CoreError> {
        if login.is_empty() {
            return Err(CoreError::InvalidInput {
                message: "user name must be populated".to_string(),
            });
        }

        let url = format!("{}/users", self.config.helix_url);
        let response = self
            .http_client
            .get(&url)
            .query(&[("login", login)])
            .bearer_auth(access_token)
            .header("Client-Id", &self.config.client_id)
            .send()
            .await?;

        match response.status() {
            StatusCode::UNAUTHORIZED => {
                return Err(CoreError::TwitchApi(TwitchApiError::Unauthorized))
            }
            status if !status.is_success() => {
                return Err(CoreError::TwitchApi(TwitchApiError::UnexpectedStatus {
                    status_code: status.as_u16(),
                    endpoint: "/users".to_string(),
                }))
            }
            _ => {}
        }

        let users: UsersResponse = response.json().await.map_err(|e| {
            error!("Failed to parse users response: {}", e);
            CoreError::TwitchApi(TwitchApiError::InvalidResponse {
                details: "Failed to parse users response".to_string(),
            })
        })?;

        match users.data.into_iter().next() {
            Some(user) if !user.id.is_empty() => {
                info!("Resolved Twitch user {} to id {}", login, user.id);
                Ok(user.id)
            }
            _ => Err(CoreError::TwitchApi(TwitchApiError::UserNotFound {
                login: login.to_string(),
            })),
        }
    }
}
