use crate::activity::{ActivityKind, ActivityLog};
use crate::cycle::{CycleOutcome, UpdateCycle};
use crate::signals::UpdateSignals;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tidal_core::{
    CoreError, ErrorClass, ErrorExt, ErrorReporter, SchedulerError, MAX_UPDATE_INTERVAL_MINUTES,
    MIN_UPDATE_INTERVAL_MINUTES,
};
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerOptions {
    /// Stop ticking after a cycle fails with an authorization error.
    pub stop_on_reauth: bool,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            stop_on_reauth: true,
        }
    }
}

/// The most recent cycle failure, cleared by the next success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastError {
    pub at: DateTime<Utc>,
    pub class: ErrorClass,
    pub code: String,
    pub message: String,
}

pub fn validate_interval(minutes: u32) -> Result<Duration, SchedulerError> {
    if !(MIN_UPDATE_INTERVAL_MINUTES..=MAX_UPDATE_INTERVAL_MINUTES).contains(&minutes) {
        return Err(SchedulerError::InvalidInterval {
            minutes,
            min: MIN_UPDATE_INTERVAL_MINUTES,
            max: MAX_UPDATE_INTERVAL_MINUTES,
        });
    }
    Ok(Duration::from_secs(u64::from(minutes) * 60))
}

#[derive(Debug)]
struct TickLoop {
    stop_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

/// State shared between the scheduler handle and its tick loop.
struct Runner {
    cycle: UpdateCycle,
    cycle_lock: Mutex<()>,
    signals: UpdateSignals,
    reporter: ErrorReporter,
    last_error: std::sync::Mutex<Option<LastError>>,
}

impl Runner {
    /// Runs a cycle unless one is already in flight.
    async fn try_run(&self) -> Option<Result<CycleOutcome, CoreError>> {
        let _guard = self.cycle_lock.try_lock().ok()?;
        Some(self.execute().await)
    }

    async fn run(&self) -> Result<CycleOutcome, CoreError> {
        let _guard = self.cycle_lock.lock().await;
        self.execute().await
    }

    async fn execute(&self) -> Result<CycleOutcome, CoreError> {
        let result = self.cycle.run().await;
        let mut last_error = self.last_error.lock().unwrap_or_else(|e| e.into_inner());
        match &result {
            Ok(_) => {
                *last_error = None;
                self.signals.notify_all();
            }
            Err(err) => {
                self.reporter.report_error(err);
                *last_error = Some(LastError {
                    at: Utc::now(),
                    class: err.classify(),
                    code: err.error_code(),
                    message: err.user_friendly_message(),
                });
            }
        }
        result
    }
}

/// Drives update cycles on a fixed interval.
///
/// Only one cycle runs at a time: a tick that arrives while a cycle is still
/// running is skipped. Stopping prevents further ticks but lets an in-flight
/// cycle finish.
pub struct Scheduler {
    runner: Arc<Runner>,
    options: SchedulerOptions,
    /// Serializes `start` calls. Held across the startup cycle.
    starting: Mutex<()>,
    /// Only held for short state changes, never across a cycle.
    tick_loop: Mutex<Option<TickLoop>>,
    /// Bumped by every `stop`, so a start that overlaps a stop does not tick.
    stop_generation: AtomicU64,
}

impl Scheduler {
    pub fn new(cycle: UpdateCycle, signals: UpdateSignals) -> Self {
        Self::with_options(cycle, signals, SchedulerOptions::default())
    }

    pub fn with_options(
        cycle: UpdateCycle,
        signals: UpdateSignals,
        options: SchedulerOptions,
    ) -> Self {
        Self {
            runner: Arc::new(Runner {
                cycle,
                cycle_lock: Mutex::new(()),
                signals,
                reporter: ErrorReporter::new(),
                last_error: std::sync::Mutex::new(None),
            }),
            options,
            starting: Mutex::new(()),
            tick_loop: Mutex::new(None),
            stop_generation: AtomicU64::new(0),
        }
    }

    pub fn activity(&self) -> &Arc<ActivityLog> {
        self.runner.cycle.activity()
    }

    pub fn last_error(&self) -> Option<LastError> {
        self.runner
            .last_error
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub async fn is_running(&self) -> bool {
        self.tick_loop
            .lock()
            .await
            .as_ref()
            .map_or(false, |tick_loop| !tick_loop.task.is_finished())
    }

    /// Starts ticking every `interval_minutes`.
    ///
    /// With `run_immediately`, one cycle runs before this returns and its
    /// failure is returned as [`SchedulerError::StartupCycleFailed`], leaving
    /// the scheduler stopped. The status and `stop` stay responsive during
    /// that cycle; a `stop` issued meanwhile keeps the loop from starting.
    pub async fn start(&self, interval_minutes: u32, run_immediately: bool) -> Result<(), CoreError> {
        let period = validate_interval(interval_minutes)?;

        let _starting = self.starting.lock().await;
        let generation = {
            let mut tick_loop = self.tick_loop.lock().await;
            if let Some(existing) = tick_loop.as_ref() {
                if !existing.task.is_finished() {
                    return Err(SchedulerError::AlreadyRunning.into());
                }
            }
            *tick_loop = None;
            self.stop_generation.load(Ordering::SeqCst)
        };

        if run_immediately {
            info!("Running initial update cycle");
            if let Err(err) = self.runner.run().await {
                return Err(SchedulerError::StartupCycleFailed {
                    source: Box::new(err),
                }
                .into());
            }
        }

        let mut tick_loop = self.tick_loop.lock().await;
        if self.stop_generation.load(Ordering::SeqCst) != generation {
            info!("Stopped during startup, not scheduling title updates");
            return Ok(());
        }

        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let runner = Arc::clone(&self.runner);
        let options = self.options;
        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    biased;

                    _ = &mut stop_rx => break,
                    _ = ticker.tick() => {
                        match runner.try_run().await {
                            None => {
                                warn!("Previous update cycle still running, skipping tick");
                                runner.cycle.activity().record(
                                    ActivityKind::TickSkipped,
                                    "Skipped an update because the previous one is still running",
                                );
                            }
                            Some(Err(err))
                                if options.stop_on_reauth && err.requires_reauth() =>
                            {
                                error!("Authorization failed, stopping title updates");
                                runner.cycle.activity().record(
                                    ActivityKind::SchedulerStopped,
                                    "Title updates stopped: re-authentication required",
                                );
                                break;
                            }
                            Some(_) => {}
                        }
                    }
                }
            }
        });

        *tick_loop = Some(TickLoop {
            stop_tx: Some(stop_tx),
            task,
        });
        info!("Title updates scheduled every {} minute(s)", interval_minutes);
        self.activity().record(
            ActivityKind::SchedulerStarted,
            format!("Title updates started, every {} minute(s)", interval_minutes),
        );
        Ok(())
    }

    /// Stops ticking. Stopping a stopped scheduler does nothing.
    pub async fn stop(&self) -> Result<(), CoreError> {
        let state = {
            let mut tick_loop = self.tick_loop.lock().await;
            self.stop_generation.fetch_add(1, Ordering::SeqCst);
            tick_loop.take()
        };

        if let Some(mut state) = state {
            let was_running = !state.task.is_finished();
            if let Some(stop_tx) = state.stop_tx.take() {
                let _ = stop_tx.send(());
            }
            state.task.await.map_err(|e| CoreError::Internal {
                message: format!("tick loop join failed: {}", e),
            })?;
            if was_running {
                info!("Title updates stopped");
                self.activity()
                    .record(ActivityKind::SchedulerStopped, "Title updates stopped");
            }
        }
        Ok(())
    }

    /// Runs one cycle now, waiting for any in-flight cycle to finish first.
    pub async fn run_once(&self) -> Result<CycleOutcome, CoreError> {
        self.runner.run().await
    }
}
