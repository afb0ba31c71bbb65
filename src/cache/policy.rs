//! Snapshot freshness rules.

use chrono::Duration;

use crate::config::CacheConfig;

/// Decides whether a snapshot of a given age may be served or should be refreshed.
///
/// Both predicates use the same window, so a request and a refresher tick looking
/// at the same snapshot at the same instant always agree on its state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreshnessPolicy {
  window: Duration,
}

impl FreshnessPolicy {
  pub fn new(window: Duration) -> Self {
    Self { window }
  }

  pub fn window(&self) -> Duration {
    self.window
  }

  /// A snapshot no older than the window is served as-is.
  pub fn servable(&self, age: Duration) -> bool {
    age <= self.window
  }

  /// A snapshot older than the window is due for a refresh.
  pub fn refresh_eligible(&self, age: Duration) -> bool {
    !self.servable(age)
  }
}

impl From<&CacheConfig> for FreshnessPolicy {
  fn from(config: &CacheConfig) -> Self {
    Self::new(config.freshness_window())
  }
}
