//! Periodic Refresh Scheduler: keeps the weather cache fresh and the
//! availability heartbeat going.
//!
//! Two timers:
//! - **refresh** (10 min): publish `online`, then re-fetch the weather
//!   unless the source is in backoff
//! - **error recheck** (30 min): only while in backoff; retry the fetch and
//!   leave backoff on success
//!
//! A failed fetch sets the backoff flag and leaves the cached image alone.
//! Recovery wakes the orchestrator through `recovered` so ambient content
//! can resume without waiting for the next announcement.

use crate::bus::StatusPublisher;
use crate::config::Timing;
use crate::state::SharedState;
use crate::weather::AmbientSource;
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;

pub struct RefreshScheduler {
    state: Arc<SharedState>,
    source: Arc<dyn AmbientSource>,
    publisher: Arc<dyn StatusPublisher>,
    timing: Timing,
    recovered: Arc<Notify>,
}

impl RefreshScheduler {
    pub fn new(
        state: Arc<SharedState>,
        source: Arc<dyn AmbientSource>,
        publisher: Arc<dyn StatusPublisher>,
        timing: Timing,
        recovered: Arc<Notify>,
    ) -> Self {
        Self {
            state,
            source,
            publisher,
            timing,
            recovered,
        }
    }

    /// Fetch the first weather image. A failure here starts in backoff
    /// rather than aborting startup.
    pub async fn prime(&self) {
        if self.fetch().await {
            tracing::info!("Weather image loaded");
        }
    }

    /// Run both timers until `shutdown`.
    pub async fn run(self, shutdown: CancellationToken) {
        let start = Instant::now();
        let mut refresh = interval_at(start + self.timing.refresh, self.timing.refresh);
        let mut recheck = interval_at(start + self.timing.error_recheck, self.timing.error_recheck);
        refresh.set_missed_tick_behavior(MissedTickBehavior::Delay);
        recheck.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = refresh.tick() => {
                    let was_failing = self.state.ambient_failing();
                    self.refresh().await;
                    if !was_failing && self.state.ambient_failing() {
                        // Give the source a full recheck period before retrying.
                        recheck.reset();
                    }
                }
                _ = recheck.tick(), if self.state.ambient_failing() => self.recheck().await,
            }
        }

        tracing::info!("Refresh scheduler stopped");
    }

    /// One refresh tick: heartbeat, then fetch unless in backoff. The
    /// heartbeat never waits on the bus.
    pub async fn refresh(&self) {
        tracing::info!("Ticker: publishing availability and refreshing weather");
        if let Err(e) = self.publisher.publish_availability(true) {
            tracing::warn!("Failed to publish availability: {}", e);
        }

        if self.state.ambient_failing() {
            tracing::debug!("Weather source in backoff, leaving fetch to the recheck timer");
            return;
        }
        self.fetch().await;
    }

    /// One recheck tick: retry the fetch while in backoff.
    pub async fn recheck(&self) {
        if !self.state.ambient_failing() {
            return;
        }

        if self.fetch().await {
            self.state.set_ambient_failing(false);
            tracing::info!("Weather source recovered");
            self.recovered.notify_one();
        } else {
            tracing::warn!(
                "Weather source still failing, next attempt in {} min",
                self.timing.error_recheck.as_secs() / 60
            );
        }
    }

    /// Fetch and cache the weather image. Returns whether it succeeded.
    async fn fetch(&self) -> bool {
        match self.source.fetch().await {
            Ok(image) => {
                self.state.ambient().store(image);
                true
            }
            Err(e) => {
                tracing::warn!("Weather fetch failed: {}", e);
                if !self.state.ambient_failing() {
                    tracing::warn!("Entering weather backoff");
                    self.state.set_ambient_failing(true);
                }
                false
            }
        }
    }
}
