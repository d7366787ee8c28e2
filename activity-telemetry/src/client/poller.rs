//! Fixed-cadence stats polling, independent of the stream connection.

use crate::{
    client::api::ActivityApi,
    stats::{DEFAULT_WINDOW_MS, RollingStats},
};
use std::time::Duration;
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{Interval, MissedTickBehavior},
};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct StatsPollerConfig {
    /// Delay between polls
    pub interval: Duration,
    /// Trailing window requested on each poll
    pub window_ms: i64,
}

impl Default for StatsPollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            window_ms: DEFAULT_WINDOW_MS,
        }
    }
}

impl StatsPollerConfig {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_window_ms(mut self, window_ms: i64) -> Self {
        self.window_ms = window_ms;
        self
    }
}

/// Running stats poller. The latest successful result stays available on failure.
#[derive(Debug)]
pub struct StatsPoller {
    stats_rx: watch::Receiver<RollingStats>,
    shutdown_tx: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl StatsPoller {
    pub fn start(api: ActivityApi, config: StatsPollerConfig) -> Self {
        let (stats_tx, stats_rx) = watch::channel(RollingStats::default());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(run_poll_loop(api, config, stats_tx, shutdown_rx));

        Self {
            stats_rx,
            shutdown_tx,
            task: Some(task),
        }
    }

    /// Most recent stats, or the zero default before the first successful poll
    pub fn latest(&self) -> RollingStats {
        self.stats_rx.borrow().clone()
    }

    /// Receiver notified on every successful poll
    pub fn subscribe(&self) -> watch::Receiver<RollingStats> {
        self.stats_rx.clone()
    }

    pub async fn shutdown(mut self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(task) = self.task.take() {
            if let Err(error) = task.await {
                error!(%error, "stats poller task failed");
            }
        }
    }
}

impl Drop for StatsPoller {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn run_poll_loop(
    api: ActivityApi,
    config: StatsPollerConfig,
    stats_tx: watch::Sender<RollingStats>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    info!(
        base_url = api.base_url(),
        interval = ?config.interval,
        "Starting stats poller"
    );

    let mut ticker = tokio::time::interval(config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => break,
            _ = poll_once(&api, config.window_ms, &stats_tx, &mut ticker) => {}
        }
    }

    info!("Stats poller stopped");
}

async fn poll_once(
    api: &ActivityApi,
    window_ms: i64,
    stats_tx: &watch::Sender<RollingStats>,
    ticker: &mut Interval,
) {
    ticker.tick().await;

    match api.stats(window_ms).await {
        Ok(stats) => {
            debug!(total_logs = stats.total_logs, "Polled activity stats");
            stats_tx.send_replace(stats);
        }
        Err(error) => {
            warn!(%error, "Stats poll failed, keeping previous stats");
        }
    }
}
