//! `--worker` mode: runs expiration passes until stopped and logs what each
//! pass did.

use leaderboard::{ExpirationResult, ExpirationWorker, StoreError};
use tokio::sync::mpsc;

const CHANNEL_CAPACITY: usize = 1024;

/// Returns once the worker has been stopped and every outcome is logged.
pub async fn run(worker: ExpirationWorker) {
    let (results_tx, results_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (errors_tx, errors_rx) = mpsc::channel(CHANNEL_CAPACITY);

    let logger = tokio::spawn(log_outcomes(results_rx, errors_rx));
    worker.run(results_tx, errors_tx).await;

    if let Err(err) = logger.await {
        tracing::warn!(error = %err, "expiration log task failed");
    }
}

/// Drains both channels until every sender is gone.
async fn log_outcomes(
    mut results: mpsc::Receiver<ExpirationResult>,
    mut errors: mpsc::Receiver<StoreError>,
) {
    loop {
        tokio::select! {
            Some(result) = results.recv() => log_result(&result),
            Some(err) = errors.recv() => {
                tracing::error!(error = %err, "expiration pass failed");
                sentry::capture_error(&err);
            }
            else => break,
        }
    }
}

fn log_result(result: &ExpirationResult) {
    if result.deleted_members > 0 || result.deleted_set {
        tracing::info!(
            set = %result.set,
            deleted = result.deleted_members,
            deleted_set = result.deleted_set,
            "{result}"
        );
    } else {
        tracing::debug!(set = %result.set, "{result}");
    }
}
