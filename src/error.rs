//! Error taxonomy for the review cache.

use thiserror::Error;

/// Errors raised by the record model, snapshot store, fetch pipeline and refresher.
#[derive(Debug, Error)]
pub enum CacheError {
  /// An upstream entry could not be flattened into a `Review`.
  #[error("malformed review entry: {0}")]
  MalformedRecord(String),

  /// The upstream could not be reached at all. Nothing fetched so far may be persisted.
  #[error("failed to fetch reviews for app {app_id}: {reason}")]
  FetchFailed { app_id: String, reason: String },

  /// No snapshot exists yet for this app.
  #[error("no cached reviews for app {0}")]
  NotFound(String),

  /// A snapshot exists but could not be read back.
  #[error("cached reviews for app {app_id} are unreadable: {reason}")]
  Unreadable { app_id: String, reason: String },

  /// The refresher found no snapshot that is due for a refresh.
  #[error("could not find an app to refresh")]
  NoRefreshCandidate,

  /// A snapshot could not be persisted.
  #[error("failed to write cached reviews for app {app_id}: {source}")]
  Write {
    app_id: String,
    #[source]
    source: std::io::Error,
  },

  #[error(transparent)]
  Io(#[from] std::io::Error),
}

impl CacheError {
  pub(crate) fn fetch_failed(app_id: &str, reason: impl ToString) -> Self {
    Self::FetchFailed {
      app_id: app_id.to_string(),
      reason: reason.to_string(),
    }
  }

  pub(crate) fn unreadable(app_id: &str, reason: impl ToString) -> Self {
    Self::Unreadable {
      app_id: app_id.to_string(),
      reason: reason.to_string(),
    }
  }
}

pub type Result<T, E = CacheError> = std::result::Result<T, E>;
