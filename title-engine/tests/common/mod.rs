#![allow(dead_code)]

use async_trait::async_trait;
use llm_interface::LlmProvider;
use preferences_store::{MemoryStore, SharedPreferences};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tidal_core::{CoreError, Credentials, LlmError, Preferences, TwitchApiError};
use title_engine::{ActivityLog, CycleSettings, LlmSource, UpdateCycle};
use twitch_client::{MetricsProvider, StreamInfo, TokenGrant};

/// Year 2100, far enough that no refresh is ever needed.
pub const FAR_FUTURE: i64 = 4_102_444_800;

pub struct FakeTwitch {
    pub stream: Result<StreamInfo, TwitchApiError>,
    pub subscribers: Result<u64, TwitchApiError>,
    pub followers: Result<u64, TwitchApiError>,
    pub refresh: Result<TokenGrant, TwitchApiError>,
    pub publish: Result<(), TwitchApiError>,
    pub publish_delay: Duration,
    pub fetch_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    pub published: Mutex<Vec<String>>,
}

impl Default for FakeTwitch {
    fn default() -> Self {
        Self {
            stream: Ok(StreamInfo {
                viewer_count: 42,
                category: "Chess".to_string(),
                started_at: "2020-01-01T00:00:00Z".to_string(),
            }),
            subscribers: Ok(7),
            followers: Ok(1337),
            refresh: Ok(TokenGrant {
                access_token: "new-access".to_string(),
                refresh_token: "new-refresh".to_string(),
                scope: vec!["channel:manage:broadcast".to_string()],
                expires_in: 14_400,
            }),
            publish: Ok(()),
            publish_delay: Duration::ZERO,
            fetch_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            published: Mutex::new(Vec::new()),
        }
    }
}

impl FakeTwitch {
    pub fn published(&self) -> Vec<String> {
        self.published.lock().unwrap().clone()
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetricsProvider for FakeTwitch {
    async fn fetch_stream_info(&self, _: &Credentials) -> Result<StreamInfo, CoreError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.stream.clone().map_err(CoreError::TwitchApi)
    }

    async fn fetch_subscriber_count(&self, _: &Credentials) -> Result<u64, CoreError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.subscribers.clone().map_err(CoreError::TwitchApi)
    }

    async fn fetch_follower_count(&self, _: &Credentials) -> Result<u64, CoreError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.followers.clone().map_err(CoreError::TwitchApi)
    }

    async fn refresh_token(&self, _: &Credentials) -> Result<TokenGrant, CoreError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        self.refresh.clone().map_err(CoreError::TwitchApi)
    }

    async fn publish_title(&self, _: &Credentials, title: &str) -> Result<(), CoreError> {
        tokio::time::sleep(self.publish_delay).await;
        self.publish.clone().map_err(CoreError::TwitchApi)?;
        self.published.lock().unwrap().push(title.to_string());
        Ok(())
    }
}

pub struct FakeLlm {
    pub reply: Result<String, LlmError>,
    /// Prompts containing this text fail with the given error instead.
    pub fail_on: Option<(&'static str, LlmError)>,
    pub delay: Duration,
    pub prompts: Mutex<Vec<String>>,
}

impl FakeLlm {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Ok(reply.to_string()),
            fail_on: None,
            delay: Duration::ZERO,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl LlmProvider for FakeLlm {
    fn provider_name(&self) -> &str {
        "fake"
    }

    async fn get_response_text(&self, prompt: &str, _: Duration) -> Result<String, CoreError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        tokio::time::sleep(self.delay).await;
        match &self.fail_on {
            Some((marker, err)) if prompt.contains(marker) => Err(CoreError::Llm(err.clone())),
            _ => self.reply.clone().map_err(CoreError::Llm),
        }
    }
}

pub fn ready_preferences(template: &str) -> Preferences {
    let mut preferences = Preferences::default();
    let twitch = &mut preferences.twitch_config;
    twitch.user_name = "streamer".to_string();
    twitch.user_id = "1234".to_string();
    twitch.client_id = "client".to_string();
    twitch.client_secret = "secret".to_string();
    twitch.redirect_uri = "http://localhost:3000".to_string();
    twitch.credentials = Credentials {
        access_token: "access".to_string(),
        refresh_token: "refresh".to_string(),
        scopes: vec!["channel:manage:broadcast".to_string()],
        expiry_unix_timestamp: FAR_FUTURE,
    };
    preferences.title_config.template = template.to_string();
    preferences
}

pub struct Harness {
    pub twitch: Arc<FakeTwitch>,
    pub llm: Arc<FakeLlm>,
    pub store: Arc<MemoryStore>,
    pub preferences: SharedPreferences,
    pub activity: Arc<ActivityLog>,
}

impl Harness {
    pub fn new(preferences: Preferences, twitch: FakeTwitch, llm: FakeLlm) -> Self {
        let store = Arc::new(MemoryStore::new(preferences.clone()));
        Self {
            twitch: Arc::new(twitch),
            llm: Arc::new(llm),
            preferences: SharedPreferences::new(preferences, store.clone()),
            store,
            activity: Arc::new(ActivityLog::new(50)),
        }
    }

    pub fn cycle(&self) -> UpdateCycle {
        UpdateCycle::new(
            self.preferences.clone(),
            self.twitch.clone(),
            LlmSource::Fixed(self.llm.clone()),
            CycleSettings::default(),
            self.activity.clone(),
        )
    }
}
