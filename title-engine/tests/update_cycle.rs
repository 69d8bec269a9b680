mod common;

use common::{ready_preferences, FakeLlm, FakeTwitch, Harness};
use std::time::Duration;
use tidal_core::{
    ConfigError, CoreError, ErrorClass, ErrorExt, LlmError, MetricKind, TitleError,
    TwitchApiError,
};
use title_engine::{ActivityKind, CycleSettings, LlmSource, UpdateCycle};

fn with_mood(template: &str, prompt: &str) -> tidal_core::Preferences {
    let mut preferences = ready_preferences(template);
    preferences.add_ai_variable("Mood", prompt, "Be brief.").unwrap();
    preferences
}

#[tokio::test]
async fn test_publishes_and_persists_title() {
    let harness = Harness::new(
        ready_preferences("Playing $$Category with $$NumViewers viewers"),
        FakeTwitch::default(),
        FakeLlm::replying("unused"),
    );

    let outcome = harness.cycle().run().await.unwrap();

    assert_eq!(outcome.title, "Playing Chess with 42 viewers");
    assert!(!outcome.credentials_refreshed);
    assert_eq!(harness.twitch.published(), vec![outcome.title.clone()]);
    assert_eq!(harness.llm.calls(), 0);

    let stored = harness.store.stored().await;
    assert_eq!(stored.title_config.value, "Playing Chess with 42 viewers");
    assert_eq!(stored.metrics.category.value, "Chess");
    assert_eq!(stored.metrics.num_followers.value, "1337");

    let latest = harness.activity.latest().unwrap();
    assert_eq!(latest.kind, ActivityKind::TitleUpdated);
    assert!(latest.message.contains("Playing Chess with 42 viewers"));
}

#[tokio::test]
async fn test_resolves_referenced_ai_variables() {
    let mut preferences = with_mood("$$Mood | $$Category", "Describe a $$Category stream");
    preferences.add_ai_variable("Joke", "Tell a joke", "").unwrap();
    let harness = Harness::new(preferences, FakeTwitch::default(), FakeLlm::replying("  Calm  "));

    let outcome = harness.cycle().run().await.unwrap();

    assert_eq!(outcome.title, "Calm   | Chess");
    let prompts = harness.llm.prompts.lock().unwrap().clone();
    assert_eq!(prompts, vec!["Describe a Chess stream\nBe brief.".to_string()]);

    let stored = harness.store.stored().await;
    assert_eq!(stored.ai_variable("Mood").unwrap().value, "  Calm  ");
    assert_eq!(stored.ai_variable("Joke").unwrap().value, "");
}

#[tokio::test]
async fn test_empty_metric_in_prompt_skips_llm() {
    let twitch = FakeTwitch {
        stream: Err(TwitchApiError::StreamOffline {
            user_id: "1234".to_string(),
        }),
        ..Default::default()
    };
    let harness = Harness::new(
        with_mood("$$Mood", "Describe a $$Category stream"),
        twitch,
        FakeLlm::replying("Calm"),
    );

    let err = harness.cycle().run().await.unwrap_err();

    assert!(matches!(
        err,
        CoreError::Title(TitleError::EmptyVariable { ref variable }) if variable == "Category"
    ));
    assert_eq!(err.classify(), ErrorClass::Transient);
    assert_eq!(harness.llm.calls(), 0);
    assert!(harness.twitch.published().is_empty());
    assert_eq!(
        harness.activity.latest().unwrap().kind,
        ActivityKind::CycleFailed
    );
}

#[tokio::test(start_paused = true)]
async fn test_llm_timeout_persists_nothing() {
    let llm = FakeLlm {
        delay: Duration::from_secs(6),
        ..FakeLlm::replying("too late")
    };
    let mut preferences = with_mood("$$Mood", "How is it going?");
    preferences.title_config.value = "Old title".to_string();
    let harness = Harness::new(preferences, FakeTwitch::default(), llm);

    let err = harness.cycle().run().await.unwrap_err();

    assert!(matches!(err, CoreError::Timeout { .. }));
    assert_eq!(err.classify(), ErrorClass::Transient);
    assert!(harness.twitch.published().is_empty());

    let stored = harness.store.stored().await;
    assert_eq!(stored.ai_variable("Mood").unwrap().value, "");
    assert_eq!(stored.title_config.value, "Old title");
}

#[tokio::test]
async fn test_llm_failure_aborts_cycle() {
    let llm = FakeLlm {
        reply: Err(LlmError::ServiceUnavailable {
            provider: "fake".to_string(),
        }),
        ..FakeLlm::replying("")
    };
    let harness = Harness::new(with_mood("$$Mood", "How is it going?"), FakeTwitch::default(), llm);

    let err = harness.cycle().run().await.unwrap_err();

    assert!(matches!(err, CoreError::Llm(LlmError::ServiceUnavailable { .. })));
    assert!(harness.twitch.published().is_empty());
}

#[tokio::test]
async fn test_refreshed_credentials_are_persisted() {
    let mut preferences = ready_preferences("$$Category");
    preferences.twitch_config.credentials.expiry_unix_timestamp = 0;
    let harness = Harness::new(preferences, FakeTwitch::default(), FakeLlm::replying(""));

    let outcome = harness.cycle().run().await.unwrap();

    assert!(outcome.credentials_refreshed);
    let credentials = harness.store.stored().await.twitch_config.credentials;
    assert_eq!(credentials.access_token, "new-access");
    assert_eq!(credentials.refresh_token, "new-refresh");
    assert!(credentials.expiry_unix_timestamp > 14_400);
}

#[tokio::test]
async fn test_refresh_failure_stops_before_fetch() {
    let mut preferences = ready_preferences("$$Category");
    preferences.twitch_config.credentials.expiry_unix_timestamp = 0;
    let twitch = FakeTwitch {
        refresh: Err(TwitchApiError::TokenRefreshFailed {
            reason: "invalid refresh token".to_string(),
        }),
        ..Default::default()
    };
    let harness = Harness::new(preferences, twitch, FakeLlm::replying(""));

    let err = harness.cycle().run().await.unwrap_err();

    assert!(err.requires_reauth());
    assert_eq!(harness.twitch.fetch_calls(), 0);
    assert!(harness.twitch.published().is_empty());
}

#[tokio::test]
async fn test_unauthorized_fetch_requires_reauth() {
    let twitch = FakeTwitch {
        followers: Err(TwitchApiError::Unauthorized),
        ..Default::default()
    };
    let harness = Harness::new(ready_preferences("$$Category"), twitch, FakeLlm::replying(""));

    let err = harness.cycle().run().await.unwrap_err();

    assert!(matches!(err, CoreError::TwitchApi(TwitchApiError::Unauthorized)));
    assert_eq!(err.classify(), ErrorClass::Reauthenticate);
    assert!(harness.twitch.published().is_empty());
}

#[tokio::test]
async fn test_partial_metrics_still_publish() {
    let twitch = FakeTwitch {
        subscribers: Err(TwitchApiError::ServerError { status_code: 503 }),
        ..Default::default()
    };
    let harness = Harness::new(ready_preferences("$$Category"), twitch, FakeLlm::replying(""));

    let outcome = harness.cycle().run().await.unwrap();

    assert_eq!(outcome.title, "Chess");
    assert_eq!(outcome.metrics[&MetricKind::NumSubscribers], "");
}

#[tokio::test]
async fn test_metrics_are_saved_even_when_composition_fails() {
    let harness = Harness::new(
        ready_preferences("$$Category $$Unknown"),
        FakeTwitch::default(),
        FakeLlm::replying(""),
    );

    let err = harness.cycle().run().await.unwrap_err();

    assert!(matches!(err, CoreError::Title(TitleError::UnknownVariable { .. })));
    assert_eq!(harness.store.stored().await.metrics.category.value, "Chess");
    assert!(harness.twitch.published().is_empty());
}

#[tokio::test]
async fn test_incomplete_preferences_are_rejected() {
    let harness = Harness::new(
        tidal_core::Preferences::default(),
        FakeTwitch::default(),
        FakeLlm::replying(""),
    );

    let err = harness.cycle().run().await.unwrap_err();

    assert!(matches!(err, CoreError::Config(ConfigError::MissingField { .. })));
    assert_eq!(harness.twitch.fetch_calls(), 0);
}

#[tokio::test]
async fn test_configured_provider_needs_api_key() {
    let harness = Harness::new(
        with_mood("$$Mood", "How is it going?"),
        FakeTwitch::default(),
        FakeLlm::replying(""),
    );
    let cycle = UpdateCycle::new(
        harness.preferences.clone(),
        harness.twitch.clone(),
        LlmSource::FromPreferences,
        CycleSettings::default(),
        harness.activity.clone(),
    );

    let err = cycle.run().await.unwrap_err();

    assert!(matches!(err, CoreError::Llm(LlmError::InvalidApiKey { .. })));
}

#[tokio::test]
async fn test_failed_save_keeps_old_title() {
    let mut preferences = ready_preferences("$$Category");
    preferences.title_config.value = "Old title".to_string();
    let harness = Harness::new(preferences, FakeTwitch::default(), FakeLlm::replying(""));
    harness.store.set_fail_saves(true);

    let err = harness.cycle().run().await.unwrap_err();

    assert!(matches!(err, CoreError::Io(_)));
    assert_eq!(
        harness.preferences.snapshot().await.title_config.value,
        "Old title"
    );
}

fn with_four_variables(template: &str) -> tidal_core::Preferences {
    let mut preferences = ready_preferences(template);
    for (name, prompt) in [
        ("Mood", "Describe the mood"),
        ("Joke", "Tell a joke"),
        ("Vibe", "Describe the vibe"),
        ("Hype", "Hype up the chat"),
    ] {
        preferences.add_ai_variable(name, prompt, "").unwrap();
    }
    for variable in &mut preferences.ai_variables {
        variable.value = format!("old {}", variable.name);
    }
    preferences.title_config.value = "Old title".to_string();
    preferences
}

#[tokio::test(start_paused = true)]
async fn test_one_failing_variable_fails_the_cycle() {
    let llm = FakeLlm {
        fail_on: Some((
            "joke",
            LlmError::ContentFiltered {
                reason: "unsafe".to_string(),
            },
        )),
        delay: Duration::from_secs(1),
        ..FakeLlm::replying("fine")
    };
    let harness = Harness::new(
        with_four_variables("$$Mood $$Joke $$Vibe $$Hype"),
        FakeTwitch::default(),
        llm,
    );

    let err = harness.cycle().run().await.unwrap_err();

    assert!(matches!(err, CoreError::Llm(LlmError::ContentFiltered { .. })));
    assert!(harness.twitch.published().is_empty());

    let stored = harness.store.stored().await;
    assert_eq!(stored.title_config.value, "Old title");
    for variable in &stored.ai_variables {
        assert_eq!(variable.value, format!("old {}", variable.name));
    }
    assert_eq!(
        harness.activity.latest().unwrap().kind,
        ActivityKind::CycleFailed
    );
}

#[tokio::test(start_paused = true)]
async fn test_ai_variables_are_resolved_concurrently() {
    // Four 3s calls back to back would take 12s, past the 10s cycle timeout.
    let llm = FakeLlm {
        delay: Duration::from_secs(3),
        ..FakeLlm::replying("ok")
    };
    let harness = Harness::new(
        with_four_variables("$$Mood $$Joke $$Vibe $$Hype"),
        FakeTwitch::default(),
        llm,
    );
    let settings = CycleSettings::default();
    assert!(settings.llm_call_timeout < Duration::from_secs(6));

    let started = tokio::time::Instant::now();
    let outcome = harness.cycle().run().await.unwrap();

    assert!(started.elapsed() < settings.llm_call_timeout);
    assert_eq!(outcome.title, "ok ok ok ok");
    assert_eq!(harness.llm.calls(), 4);
    let stored = harness.store.stored().await;
    assert!(stored.ai_variables.iter().all(|v| v.value == "ok"));
}
