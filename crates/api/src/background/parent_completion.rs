//! Sweep for replies and forwards whose parent was never completed.
//!
//! A child row keeps `pending_parent_completion` set when the second step
//! of its create fails or the process dies in between. This job retries
//! that step for children older than a grace period, so requests still in
//! flight are not raced.

use std::time::Duration;

use chrono::Utc;
use phasetrack_db::repositories::HistoryRepo;
use phasetrack_db::DbPool;
use tokio_util::sync::CancellationToken;

/// Children handled per tick.
const BATCH_SIZE: i64 = 100;

/// Counts from one sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepOutcome {
    pub completed: usize,
    /// Pending markers cleared without a parent to complete.
    pub cleared: usize,
    pub failed: usize,
}

/// Retry the parent-completion step for one batch of stale children.
pub async fn sweep_once(pool: &DbPool, min_age: Duration) -> Result<SweepOutcome, sqlx::Error> {
    let min_age = chrono::Duration::from_std(min_age).unwrap_or(chrono::Duration::zero());
    let cutoff = Utc::now() - min_age;
    let pending = HistoryRepo::list_pending_parent_completion(pool, cutoff, BATCH_SIZE).await?;

    let mut outcome = SweepOutcome::default();
    for child in pending {
        match HistoryRepo::complete_parent(pool, child.id).await {
            Ok(Some(parent)) => {
                tracing::info!(
                    entry_id = child.id,
                    parent_id = parent.id,
                    "Sweep completed parent"
                );
                outcome.completed += 1;
            }
            Ok(None) => outcome.cleared += 1,
            Err(e) => {
                tracing::warn!(entry_id = child.id, error = %e, "Sweep could not complete parent");
                outcome.failed += 1;
                // Requeue behind the other pending children.
                if let Err(e) = HistoryRepo::touch_pending(pool, child.id).await {
                    tracing::warn!(
                        entry_id = child.id,
                        error = %e,
                        "Could not requeue pending child"
                    );
                }
            }
        }
    }
    Ok(outcome)
}

/// Run the sweep every `interval` until `cancel` fires.
pub async fn run(pool: DbPool, cancel: CancellationToken, interval: Duration, min_age: Duration) {
    tracing::info!(
        interval_secs = interval.as_secs(),
        min_age_secs = min_age.as_secs(),
        "Parent completion sweep started"
    );

    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Parent completion sweep stopping");
                break;
            }
            _ = ticker.tick() => {
                match sweep_once(&pool, min_age).await {
                    Ok(outcome) if outcome == SweepOutcome::default() => {
                        tracing::debug!("Parent completion sweep: nothing pending");
                    }
                    Ok(outcome) => {
                        tracing::info!(
                            completed = outcome.completed,
                            cleared = outcome.cleared,
                            failed = outcome.failed,
                            "Parent completion sweep finished"
                        );
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Parent completion sweep failed");
                    }
                }
            }
        }
    }
}
