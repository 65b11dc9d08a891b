//! Expiration sweep worker.
//!
//! Periodically walks the `expiration-sets` registry and removes members
//! whose score TTL has elapsed from both the leaderboard and its TTL set.
//! One pass runs at a time; ticks that fire while a pass is still running
//! are skipped. Stopping takes effect between passes.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};

use crate::store::{LeaderboardStore, StoreError, leaderboard_from_ttl_key};

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Time between two passes.
    pub interval: Duration,
    /// Maximum members removed from one leaderboard per pass.
    pub limit_per_run: i64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            limit_per_run: 1000,
        }
    }
}

/// What one pass did to one TTL set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpirationResult {
    pub set: String,
    pub deleted_members: i64,
    pub deleted_set: bool,
}

impl fmt::Display for ExpirationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.deleted_set {
            write!(f, "{}: set no longer exists, unregistered", self.set)
        } else {
            write!(f, "{}: {} members expired", self.set, self.deleted_members)
        }
    }
}

/// Requests a running worker to stop after its current pass.
#[derive(Clone)]
pub struct StopHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.tx.send_replace(true);
    }
}

/// Releases the in-flight flag when a pass ends, even if it is cancelled.
struct PassGuard<'a>(&'a AtomicBool);

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct ExpirationWorker {
    store: Arc<dyn LeaderboardStore>,
    config: WorkerConfig,
    in_flight: AtomicBool,
    stop: Arc<watch::Sender<bool>>,
}

impl ExpirationWorker {
    /// Fails when the store cannot be reached.
    pub async fn new(
        store: Arc<dyn LeaderboardStore>,
        config: WorkerConfig,
    ) -> Result<Self, StoreError> {
        store.healthcheck().await?;

        let (stop, _) = watch::channel(false);
        Ok(Self {
            store,
            config,
            in_flight: AtomicBool::new(false),
            stop: Arc::new(stop),
        })
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            tx: self.stop.clone(),
        }
    }

    /// Runs passes on every tick until stopped. Per-leaderboard outcomes go
    /// to `results`, failures to `errors`; neither ends the loop.
    pub async fn run(
        &self,
        results: mpsc::Sender<ExpirationResult>,
        errors: mpsc::Sender<StoreError>,
    ) {
        let mut ticker = interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut stop = self.stop.subscribe();

        info!(
            interval_secs = self.config.interval.as_secs(),
            limit = self.config.limit_per_run,
            "expiration worker started"
        );

        loop {
            if *stop.borrow_and_update() {
                break;
            }

            tokio::select! {
                _ = ticker.tick() => {}
                _ = stop.changed() => break,
            }

            self.sweep(&results, &errors).await;
        }

        info!("expiration worker stopped");
    }

    /// One pass over every registered TTL set. Returns immediately when
    /// another pass is still running.
    pub async fn sweep(
        &self,
        results: &mpsc::Sender<ExpirationResult>,
        errors: &mpsc::Sender<StoreError>,
    ) {
        if self.in_flight.swap(true, Ordering::AcqRel) {
            debug!("previous expiration pass still running, skipping");
            return;
        }
        let _guard = PassGuard(&self.in_flight);

        let keys = match self.store.get_expiration_sets().await {
            Ok(keys) => keys,
            Err(err) => {
                report(errors, err).await;
                return;
            }
        };

        for key in keys {
            let Some(leaderboard) = leaderboard_from_ttl_key(&key) else {
                warn!(key = %key, "registered key is not a ttl set, skipping");
                continue;
            };

            match self
                .store
                .expire_members(leaderboard, self.config.limit_per_run, Utc::now())
                .await
            {
                Ok(outcome) => {
                    let result = ExpirationResult {
                        set: key.clone(),
                        deleted_members: outcome.deleted_members,
                        deleted_set: outcome.deleted_set,
                    };
                    if results.send(result).await.is_err() {
                        debug!("expiration results receiver dropped");
                    }
                }
                Err(err) => report(errors, err).await,
            }
        }
    }
}

async fn report(errors: &mpsc::Sender<StoreError>, err: StoreError) {
    if let Err(mpsc::error::SendError(err)) = errors.send(err).await {
        warn!(error = %err, "expiration errors receiver dropped");
    }
}
