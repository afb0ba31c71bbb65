//! Background snapshot refresher.
//!
//! Once per tick the refresher looks at every tracked app, picks the one whose
//! snapshot was written longest ago and, if that snapshot is past the freshness
//! window, refetches it. At most one refresh runs at a time: a tick is awaited
//! to completion before the next one is taken.
//!
//! ```ignore
//! let (shutdown_tx, shutdown_rx) = watch::channel(false);
//! let handle = tokio::spawn(Refresher::new(cache, Duration::from_secs(1)).run(shutdown_rx));
//!
//! // On shutdown; a refresh already in progress is allowed to finish.
//! let _ = shutdown_tx.send(true);
//! handle.await?;
//! ```

use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, trace, warn};

use super::layer::ReviewCache;
use super::policy::FreshnessPolicy;
use crate::error::{CacheError, Result};

/// What a single tick did.
#[derive(Debug)]
pub enum TickOutcome {
  /// The stalest snapshot was refetched and rewritten
  Refreshed { app_id: String, reviews: usize },
  /// No snapshot is due for a refresh
  NothingToRefresh,
  /// The stalest snapshot could not be refreshed; it is retried on a later tick
  Failed { app_id: String, error: CacheError },
}

/// Choose the app whose snapshot was written longest ago, if it is due for a refresh.
///
/// Returns `NoRefreshCandidate` when there are no candidates or the oldest one is
/// still inside the freshness window.
pub fn select_oldest<I>(candidates: I, policy: &FreshnessPolicy, now: DateTime<Utc>) -> Result<String>
where
  I: IntoIterator<Item = (String, DateTime<Utc>)>,
{
  let (app_id, written_at) = candidates
    .into_iter()
    .min_by_key(|(_, written_at)| *written_at)
    .ok_or(CacheError::NoRefreshCandidate)?;

  if !policy.refresh_eligible(now - written_at) {
    return Err(CacheError::NoRefreshCandidate);
  }

  Ok(app_id)
}

/// Periodically refreshes the stalest cached snapshot.
pub struct Refresher {
  cache: ReviewCache,
  tick_interval: Duration,
}

impl Refresher {
  pub fn new(cache: ReviewCache, tick_interval: Duration) -> Self {
    Self {
      cache,
      tick_interval,
    }
  }

  /// The app to refresh next, looked up from the snapshot store.
  ///
  /// Snapshots that cannot be inspected are logged and skipped.
  pub fn next_app(&self, now: DateTime<Utc>) -> Result<String> {
    let storage = self.cache.storage();

    let candidates: Vec<(String, DateTime<Utc>)> = storage
      .list_tracked()?
      .into_iter()
      .filter_map(|app_id| match storage.last_written(&app_id) {
        Ok(written_at) => Some((app_id, written_at)),
        Err(e) => {
          warn!(app_id, error = %e, "Skipping cached reviews");
          None
        }
      })
      .collect();

    select_oldest(candidates, &self.cache.policy(), now)
  }

  /// Run one refresh cycle.
  pub async fn tick(&self) -> TickOutcome {
    let app_id = match self.next_app(Utc::now()) {
      Ok(app_id) => app_id,
      Err(CacheError::NoRefreshCandidate) => {
        trace!("No cached reviews due for a refresh");
        return TickOutcome::NothingToRefresh;
      }
      Err(e) => {
        warn!(error = %e, "Failed to list cached reviews");
        return TickOutcome::NothingToRefresh;
      }
    };

    info!(app_id, "Refreshing cached reviews");
    match self.cache.refresh(&app_id).await {
      Ok(reviews) => {
        info!(app_id, count = reviews.len(), "Finished refreshing cached reviews");
        TickOutcome::Refreshed {
          app_id,
          reviews: reviews.len(),
        }
      }
      Err(error) => {
        warn!(app_id, error = %error, "Failed to refresh cached reviews");
        TickOutcome::Failed { app_id, error }
      }
    }
  }

  /// Tick until the shutdown signal is received. A tick in progress always completes first.
  pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
    let mut ticker = interval(self.tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(tick_ms = self.tick_interval.as_millis() as u64, "Review refresher started");

    loop {
      tokio::select! {
        changed = shutdown_rx.changed() => {
          if changed.is_err() || *shutdown_rx.borrow() {
            break;
          }
        }
        _ = ticker.tick() => {
          self.tick().await;
        }
      }
    }

    info!("Review refresher stopped");
  }
}
