mod logging;

use anyhow::{bail, Context, Result};
use llm_interface::LlmProviderKind;
use preferences_store::{JsonFileStore, SharedPreferences};
use std::sync::Arc;
use tidal_core::AppConfig;
use title_engine::{
    signals, ActivityLog, CycleSettings, LlmSource, Scheduler, SignalReceivers, UpdateCycle,
};
use twitch_client::{TwitchApiClient, TwitchClientConfig};

/// Logs what a presentation layer would redraw on each signal.
async fn watch_signals(mut receivers: SignalReceivers, activity: Arc<ActivityLog>) {
    loop {
        tokio::select! {
            Some(()) = receivers.dashboard_changed.recv() => {
                if let Some(entry) = activity.latest() {
                    tracing::debug!("Dashboard changed: {}", entry);
                }
            }
            Some(()) = receivers.variables_changed.recv() => {
                tracing::debug!("AI variable values changed");
            }
            else => break,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = AppConfig::resolve_path()?;
    let config = AppConfig::load(&config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;
    config.validate()?;

    let _guard = logging::setup_logging(
        &config.log_dir(&config_path),
        &config.log_level,
        config.log_to_console,
    )?;
    tracing::info!("Starting Tidal title updater");

    let store = Arc::new(JsonFileStore::new(config.preferences_path(&config_path)));
    let preferences = SharedPreferences::load(store).await?;
    let snapshot = preferences.snapshot().await;

    let missing = snapshot.missing_for_updates();
    if !missing.is_empty() {
        bail!(
            "Preferences are incomplete, please fill in: {}",
            missing.join(", ")
        );
    }
    let provider = LlmProviderKind::from_name(&snapshot.llm_config.provider)?;
    tracing::info!("Using {} for AI variables", provider);

    let twitch = TwitchApiClient::new(
        TwitchClientConfig::from_preferences(&snapshot.twitch_config),
        config.http_timeout(),
    )?;
    let activity = Arc::new(ActivityLog::new(config.activity_log_capacity));
    let cycle = UpdateCycle::new(
        preferences,
        Arc::new(twitch),
        LlmSource::FromPreferences,
        CycleSettings::from(&config),
        Arc::clone(&activity),
    );

    let (signals, receivers) = signals::channel();
    let watcher = tokio::spawn(watch_signals(receivers, Arc::clone(&activity)));
    let scheduler = Scheduler::new(cycle, signals);

    let title_config = &snapshot.title_config;
    scheduler
        .start(
            title_config.update_interval_minutes,
            title_config.run_immediately_on_start,
        )
        .await
        .context("Unable to start title updates")?;

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    tracing::info!("Shutting down");

    scheduler.stop().await?;
    watcher.abort();
    Ok(())
}
