use crate::provider::{is_unauthorized, MetricsProvider};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tidal_core::{CoreError, Credentials, CycleContext, MetricKind, MetricValues};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, warn};

/// An independent upstream call that yields a fixed subset of the metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricSource {
    StreamInfo,
    Subscribers,
    Followers,
}

impl MetricSource {
    pub const ALL: [MetricSource; 3] = [
        MetricSource::StreamInfo,
        MetricSource::Subscribers,
        MetricSource::Followers,
    ];

    pub fn name(self) -> &'static str {
        match self {
            MetricSource::StreamInfo => "stream info",
            MetricSource::Subscribers => "subscribers",
            MetricSource::Followers => "followers",
        }
    }

    pub fn metrics(self) -> &'static [MetricKind] {
        match self {
            MetricSource::StreamInfo => &[
                MetricKind::Category,
                MetricKind::Uptime,
                MetricKind::NumViewers,
            ],
            MetricSource::Subscribers => &[MetricKind::NumSubscribers],
            MetricSource::Followers => &[MetricKind::NumFollowers],
        }
    }

    fn blank(self) -> Vec<(MetricKind, String)> {
        self.metrics()
            .iter()
            .map(|kind| (*kind, String::new()))
            .collect()
    }

    async fn fetch(
        self,
        provider: &dyn MetricsProvider,
        credentials: &Credentials,
    ) -> Result<Vec<(MetricKind, String)>, CoreError> {
        match self {
            MetricSource::StreamInfo => {
                let info = provider.fetch_stream_info(credentials).await?;
                Ok(vec![
                    (MetricKind::Category, info.category),
                    (
                        MetricKind::Uptime,
                        uptime_seconds(&info.started_at, Utc::now()),
                    ),
                    (MetricKind::NumViewers, info.viewer_count.to_string()),
                ])
            }
            MetricSource::Subscribers => {
                let total = provider.fetch_subscriber_count(credentials).await?;
                Ok(vec![(MetricKind::NumSubscribers, total.to_string())])
            }
            MetricSource::Followers => {
                let total = provider.fetch_follower_count(credentials).await?;
                Ok(vec![(MetricKind::NumFollowers, total.to_string())])
            }
        }
    }
}

/// Whole seconds elapsed since `started_at`, or blank when it cannot be parsed.
pub fn uptime_seconds(started_at: &str, now: DateTime<Utc>) -> String {
    match DateTime::parse_from_rfc3339(started_at) {
        Ok(started) => {
            let elapsed = now.signed_duration_since(started.with_timezone(&Utc));
            elapsed.num_seconds().max(0).to_string()
        }
        Err(e) => {
            debug!("Unable to parse stream start time {:?}: {}", started_at, e);
            String::new()
        }
    }
}

/// Fetches every metric source concurrently.
pub struct MetricFetcher {
    provider: Arc<dyn MetricsProvider>,
}

impl MetricFetcher {
    pub fn new(provider: Arc<dyn MetricsProvider>) -> Self {
        Self { provider }
    }

    /// Returns one value per metric kind. A source that fails for any reason
    /// other than authorization leaves its metrics blank.
    ///
    /// An unauthorized response from any source aborts the whole fetch with
    /// that error, and reaching the cycle deadline aborts it with
    /// [`CoreError::Timeout`]. In both cases outstanding calls are cancelled
    /// and partial results are discarded.
    pub async fn fetch(
        &self,
        ctx: &CycleContext,
        credentials: &Credentials,
    ) -> Result<MetricValues, CoreError> {
        let started = Instant::now();
        let results = Arc::new(Mutex::new(MetricValues::new()));
        // One unauthorized signal is enough; later ones are dropped.
        let (abort_tx, mut abort_rx) = mpsc::channel::<CoreError>(1);
        let mut tasks = JoinSet::new();

        for source in MetricSource::ALL {
            let provider = Arc::clone(&self.provider);
            let credentials = credentials.clone();
            let results = Arc::clone(&results);
            let abort_tx = abort_tx.clone();

            tasks.spawn(async move {
                let values = match source.fetch(provider.as_ref(), &credentials).await {
                    Ok(values) => {
                        debug!("Fetched {}", source.name());
                        values
                    }
                    Err(err) => {
                        if is_unauthorized(&err) {
                            let _ = abort_tx.try_send(err);
                        } else {
                            warn!("Unable to fetch {}: {}", source.name(), err);
                        }
                        source.blank()
                    }
                };
                results.lock().await.extend(values);
            });
        }
        drop(abort_tx);

        loop {
            tokio::select! {
                biased;

                Some(err) = abort_rx.recv() => {
                    error!("Unauthorized response, abandoning metric fetch");
                    tasks.abort_all();
                    return Err(err);
                }
                _ = sleep_until(ctx.deadline) => {
                    error!("Metric fetch hit the cycle deadline");
                    tasks.abort_all();
                    return Err(CoreError::timeout("metric fetch", started.elapsed()));
                }
                joined = tasks.join_next() => match joined {
                    Some(Ok(())) => {}
                    Some(Err(e)) => warn!("Metric task ended abnormally: {}", e),
                    None => break,
                },
            }
        }

        let mut values = std::mem::take(&mut *results.lock().await);
        for kind in MetricKind::ALL {
            values.entry(kind).or_default();
        }

        let blank = values.values().filter(|v| v.is_empty()).count();
        info!(
            "Fetched metrics in {:?} ({} of {} blank)",
            started.elapsed(),
            blank,
            values.len()
        );
        Ok(values)
    }
}
