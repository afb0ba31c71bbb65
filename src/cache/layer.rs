//! Cache layer that serves snapshots and refetches them from the upstream feed.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, error, info};

use super::policy::FreshnessPolicy;
use super::result::CacheResult;
use super::storage::SnapshotStore;
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::feed::{fetch_reviews, FetchSettings, ReviewFeed};
use crate::reviews::Review;

/// Review cache shared by request handlers and the background refresher.
///
/// Cloning is cheap; clones share the same storage and feed.
#[derive(Clone)]
pub struct ReviewCache {
  storage: Arc<dyn SnapshotStore>,
  feed: Arc<dyn ReviewFeed>,
  policy: FreshnessPolicy,
  fetch: FetchSettings,
}

impl ReviewCache {
  pub fn new(storage: Arc<dyn SnapshotStore>, feed: Arc<dyn ReviewFeed>, config: &Config) -> Self {
    Self {
      storage,
      feed,
      policy: FreshnessPolicy::from(&config.cache),
      fetch: FetchSettings::from(config),
    }
  }

  pub fn storage(&self) -> &dyn SnapshotStore {
    self.storage.as_ref()
  }

  pub fn policy(&self) -> FreshnessPolicy {
    self.policy
  }

  /// Get the reviews for an app.
  ///
  /// 1. Read the snapshot - if still servable, return it
  /// 2. If stale, missing or unreadable, fetch from upstream
  /// 3. Write the fetched reviews back as the new snapshot
  ///
  /// A failed fetch is returned as an error; a stale snapshot is never served instead.
  pub async fn get_reviews(&self, app_id: &str) -> Result<CacheResult<Vec<Review>>> {
    let now = Utc::now();

    match self.storage.read(app_id) {
      Ok(snapshot) => {
        let age = now - snapshot.written_at;
        if self.policy.servable(age) {
          debug!(app_id, age_secs = age.num_seconds(), "Serving cached reviews");
          return Ok(CacheResult::from_cache(snapshot.reviews, snapshot.written_at));
        }
        debug!(app_id, age_secs = age.num_seconds(), "Cached reviews are stale");
      }
      Err(CacheError::NotFound(_)) => {
        debug!(app_id, "No cached reviews");
      }
      Err(e) => {
        error!(app_id, error = %e, "Cached reviews could not be read, refetching");
      }
    }

    let reviews = self.fetch(app_id, now).await?;

    // The fetched reviews are complete even if caching them fails.
    if let Err(e) = self.storage.write(app_id, &reviews) {
      error!(app_id, error = %e, "Failed to cache fetched reviews");
    }

    Ok(CacheResult::from_network(reviews))
  }

  /// Fetch the reviews for an app and replace its snapshot, even when nothing was fetched.
  ///
  /// Nothing is written when the fetch fails.
  pub async fn refresh(&self, app_id: &str) -> Result<Vec<Review>> {
    let reviews = self.fetch(app_id, Utc::now()).await?;
    self.storage.write(app_id, &reviews)?;
    Ok(reviews)
  }

  async fn fetch(&self, app_id: &str, now: DateTime<Utc>) -> Result<Vec<Review>> {
    let reviews = fetch_reviews(self.feed.as_ref(), app_id, self.fetch, now).await?;
    info!(app_id, count = reviews.len(), "Fetched reviews");
    Ok(reviews)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::result::CacheSource;
  use crate::cache::storage::{FileStorage, Snapshot};
  use crate::config::CacheConfig;
  use crate::feed::testing::{entry, ScriptedFeed};
  use crate::feed::FeedPage;
  use crate::reviews::types::tests::review;
  use chrono::Duration;
  use filetime::FileTime;
  use std::io;
  use tempfile::TempDir;

  struct Fixture {
    _dir: TempDir,
    storage: Arc<FileStorage>,
    feed: Arc<ScriptedFeed>,
    cache: ReviewCache,
  }

  fn fixture(responses: Vec<Result<FeedPage>>) -> Fixture {
    let dir = TempDir::new().unwrap();
    let config = Config {
      cache: CacheConfig {
        dir: dir.path().to_path_buf(),
        ..CacheConfig::default()
      },
      ..Config::default()
    };
    let storage = Arc::new(FileStorage::open(&config.cache).unwrap());
    let feed = Arc::new(ScriptedFeed::new(responses));
    let cache = ReviewCache::new(storage.clone(), feed.clone(), &config);
    Fixture {
      _dir: dir,
      storage,
      feed,
      cache,
    }
  }

  /// A store with no snapshots that refuses every write.
  struct ReadOnlyStore;

  impl SnapshotStore for ReadOnlyStore {
    fn read(&self, app_id: &str) -> Result<Snapshot> {
      Err(CacheError::NotFound(app_id.to_string()))
    }

    fn write(&self, app_id: &str, _reviews: &[Review]) -> Result<()> {
      Err(CacheError::Write {
        app_id: app_id.to_string(),
        source: io::Error::new(io::ErrorKind::PermissionDenied, "read-only file system"),
      })
    }

    fn list_tracked(&self) -> Result<Vec<String>> {
      Ok(Vec::new())
    }

    fn last_written(&self, app_id: &str) -> Result<DateTime<Utc>> {
      Err(CacheError::NotFound(app_id.to_string()))
    }
  }

  fn age_snapshot(storage: &FileStorage, app_id: &str, age: Duration) {
    let at = Utc::now() - age;
    let mtime = FileTime::from_unix_time(at.timestamp(), 0);
    filetime::set_file_mtime(storage.path_for(app_id), mtime).unwrap();
  }

  #[tokio::test]
  async fn serves_fresh_snapshot_without_fetching() {
    let f = fixture(vec![]);
    let cached = vec![review("1", "2024-03-13T04:25:02-07:00")];
    f.storage.write("42", &cached).unwrap();

    let result = f.cache.get_reviews("42").await.unwrap();
    assert_eq!(result.source, CacheSource::CacheFresh);
    assert_eq!(result.data, cached);
    assert!(result.cached_at.is_some());
    assert!(f.feed.requested_pages().is_empty());
  }

  #[tokio::test]
  async fn fetches_and_stores_when_missing() {
    let now = Utc::now();
    let f = fixture(vec![
      Ok(FeedPage::Entries(vec![entry("a", now - Duration::hours(1))])),
      Ok(FeedPage::End),
    ]);

    let result = f.cache.get_reviews("42").await.unwrap();
    assert_eq!(result.source, CacheSource::Network);
    assert_eq!(result.data.len(), 1);
    assert_eq!(f.feed.requested_apps(), vec!["42", "42"]);
    assert_eq!(f.storage.read("42").unwrap().reviews, result.data);
  }

  #[tokio::test]
  async fn refetches_stale_snapshot() {
    let now = Utc::now();
    let f = fixture(vec![Ok(FeedPage::Entries(vec![entry("new", now - Duration::hours(1))]))]);
    f.storage.write("42", &[review("old", "2024-03-13T04:25:02-07:00")]).unwrap();
    age_snapshot(&f.storage, "42", Duration::minutes(11));

    let result = f.cache.get_reviews("42").await.unwrap();
    assert_eq!(result.source, CacheSource::Network);
    assert_eq!(result.data[0].id, "new");
    assert_eq!(f.storage.read("42").unwrap().reviews[0].id, "new");
  }

  #[tokio::test]
  async fn unreadable_snapshot_is_refetched() {
    let now = Utc::now();
    let f = fixture(vec![Ok(FeedPage::Entries(vec![entry("a", now - Duration::hours(1))]))]);
    std::fs::write(f.storage.path_for("42"), b"not json").unwrap();

    let result = f.cache.get_reviews("42").await.unwrap();
    assert_eq!(result.source, CacheSource::Network);
    assert_eq!(f.storage.read("42").unwrap().reviews.len(), 1);
  }

  #[tokio::test]
  async fn failed_fetch_keeps_stale_snapshot_and_errors() {
    let f = fixture(vec![Err(CacheError::fetch_failed("42", "connection refused"))]);
    let stale = vec![review("old", "2024-03-13T04:25:02-07:00")];
    f.storage.write("42", &stale).unwrap();
    age_snapshot(&f.storage, "42", Duration::hours(1));

    let err = f.cache.get_reviews("42").await.unwrap_err();
    assert!(matches!(err, CacheError::FetchFailed { .. }));
    assert_eq!(f.storage.read("42").unwrap().reviews, stale);
  }

  #[tokio::test]
  async fn empty_fetch_overwrites_previous_snapshot() {
    let f = fixture(vec![Ok(FeedPage::Entries(vec![]))]);
    f.storage.write("42", &[review("old", "2024-03-13T04:25:02-07:00")]).unwrap();

    let reviews = f.cache.refresh("42").await.unwrap();
    assert!(reviews.is_empty());
    assert!(f.storage.read("42").unwrap().reviews.is_empty());
  }

  #[tokio::test]
  async fn fetched_reviews_are_served_when_caching_fails() {
    let now = Utc::now();
    let feed = Arc::new(ScriptedFeed::new(vec![Ok(FeedPage::Entries(vec![entry(
      "a",
      now - Duration::hours(1),
    )]))]));
    let cache = ReviewCache::new(Arc::new(ReadOnlyStore), feed.clone(), &Config::default());

    let result = cache.get_reviews("42").await.unwrap();
    assert_eq!(result.source, CacheSource::Network);
    assert_eq!(result.data.len(), 1);
    assert_eq!(result.data[0].id, "a");
    assert!(!feed.requested_pages().is_empty());
  }

  #[tokio::test]
  async fn refresh_reports_write_failure() {
    let feed = Arc::new(ScriptedFeed::new(vec![Ok(FeedPage::Entries(vec![]))]));
    let cache = ReviewCache::new(Arc::new(ReadOnlyStore), feed, &Config::default());

    let err = cache.refresh("42").await.unwrap_err();
    assert!(matches!(err, CacheError::Write { app_id, .. } if app_id == "42"));
  }
}
