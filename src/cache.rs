//! Single-slot cache for the latest speedtest result.
//!
//! A speedtest takes tens of seconds while a Prometheus scrape must answer
//! quickly, so only the very first scrape (nothing cached yet) waits for a
//! measurement. Afterwards a stale result is served immediately and a refresh
//! runs in the background. At most one measurement runs at any time.

use crate::error::{Result, SpeedtestError};
use crate::traits::Measure;
use crate::types::MeasurementResult;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info};

struct CacheEntry {
    result: MeasurementResult,
    stored_at: Instant,
}

impl CacheEntry {
    fn new(result: MeasurementResult) -> Self {
        Self {
            result,
            stored_at: Instant::now(),
        }
    }
}

#[derive(Default)]
struct CacheState {
    entry: Option<CacheEntry>,
    /// A background refresh is in flight.
    refreshing: bool,
}

/// Owns the cached result and coordinates refreshes.
///
/// Cloning is cheap and every clone shares the same slot.
#[derive(Clone)]
pub struct ResultCache {
    runner: Arc<dyn Measure>,
    interval: Duration,
    state: Arc<Mutex<CacheState>>,
}

impl ResultCache {
    pub fn new(runner: Arc<dyn Measure>, interval: Duration) -> Self {
        Self {
            runner,
            interval,
            state: Arc::new(Mutex::new(CacheState::default())),
        }
    }

    /// Return the cached result, measuring first if nothing is cached yet.
    ///
    /// Errors are only returned while the cache is empty. Once a result has
    /// been stored, a failed background refresh is logged and the previous
    /// result keeps being served.
    pub async fn get_or_refresh(&self) -> Result<MeasurementResult> {
        let mut state = self.state.clone().lock_owned().await;

        let cached = state
            .entry
            .as_ref()
            .map(|entry| (entry.result.clone(), entry.stored_at.elapsed()));

        let Some((result, age)) = cached else {
            debug!("nothing cached yet, running speedtest in the foreground");
            let runner = self.runner.clone();
            // The guard moves into the task: if this caller goes away the
            // measurement still commits and nobody can start a second one.
            let task = tokio::spawn(async move {
                let outcome = runner.measure().await;
                if let Ok(result) = &outcome {
                    state.entry = Some(CacheEntry::new(result.clone()));
                }
                outcome
            });
            return join_measurement(task).await;
        };

        if age <= self.interval {
            debug!(?age, "returning result from cache");
            return Ok(result);
        }

        if state.refreshing {
            debug!(?age, "refresh already running, returning stale result");
        } else {
            debug!(?age, "cached result is stale, refreshing in the background");
            state.refreshing = true;
            self.spawn_refresh();
        }

        Ok(result)
    }

    fn spawn_refresh(&self) {
        let runner = self.runner.clone();
        let state = self.state.clone();

        tokio::spawn(async move {
            // Measuring in its own task turns a panic into a JoinError, so
            // the flag below is cleared on every path.
            let task = tokio::spawn(async move { runner.measure().await });
            let outcome = join_measurement(task).await;

            let mut state = state.lock().await;
            match outcome {
                Ok(result) => {
                    state.entry = Some(CacheEntry::new(result));
                    info!("speedtest cache refreshed");
                }
                Err(e) => error!(error = %e, "failed to update cache in background"),
            }
            state.refreshing = false;
        });
    }

    #[cfg(test)]
    fn seeded(
        runner: Arc<dyn Measure>,
        interval: Duration,
        result: MeasurementResult,
        age: Duration,
    ) -> Self {
        let stored_at = Instant::now().checked_sub(age).unwrap_or_else(Instant::now);
        let cache = Self::new(runner, interval);
        cache.state.try_lock().expect("fresh cache is unlocked").entry =
            Some(CacheEntry { result, stored_at });
        cache
    }

    #[cfg(test)]
    async fn peek(&self) -> Option<MeasurementResult> {
        self.state.lock().await.entry.as_ref().map(|e| e.result.clone())
    }

    #[cfg(test)]
    async fn is_refreshing(&self) -> bool {
        self.state.lock().await.refreshing
    }
}

async fn join_measurement(
    task: JoinHandle<Result<MeasurementResult>>,
) -> Result<MeasurementResult> {
    match task.await {
        Ok(outcome) => outcome,
        Err(e) => Err(SpeedtestError::ExecutionFailed(format!(
            "measurement task aborted: {}",
            e
        ))),
    }
}
