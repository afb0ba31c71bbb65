//! Paginated review fetch.
//!
//! Pages are requested newest first until one of these holds:
//! - the upstream answers with a non-success status, or a page body cannot be decoded
//! - a page contributes no review that was not already seen
//! - the oldest review held so far already precedes the retention cutoff
//! - `max_pages` pages have been requested
//!
//! The accumulated reviews are then deduplicated, sorted newest first and trimmed
//! to the retention window. A transport failure on any page fails the whole fetch.

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, warn};

use super::client::{FeedPage, ReviewFeed};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::reviews::{dedupe, normalize, sort_descending_by_updated, window_after, Review};

/// Limits applied to a single fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchSettings {
  /// Reviews older than this are dropped
  pub retention: Duration,
  pub max_pages: u32,
}

impl From<&Config> for FetchSettings {
  fn from(config: &Config) -> Self {
    Self {
      retention: config.cache.retention_window(),
      max_pages: config.upstream.max_pages,
    }
  }
}

/// Fetch every review for `app_id` updated within the retention window before `now`.
pub async fn fetch_reviews(
  feed: &dyn ReviewFeed,
  app_id: &str,
  settings: FetchSettings,
  now: DateTime<Utc>,
) -> Result<Vec<Review>> {
  let cutoff = now - settings.retention;
  let mut accumulated: Vec<Review> = Vec::new();
  let mut seen: HashSet<String> = HashSet::new();

  for page in 1..=settings.max_pages {
    let entries = match feed.fetch_page(app_id, page).await {
      Ok(FeedPage::Entries(entries)) => entries,
      Ok(FeedPage::End) => break,
      Err(CacheError::MalformedRecord(reason)) => {
        warn!(app_id, page, %reason, "Skipping undecodable review page");
        break;
      }
      Err(e) => return Err(e),
    };

    let reviews = normalize_page(app_id, page, &entries);
    let new_reviews = reviews
      .iter()
      .filter(|review| seen.insert(review.id.clone()))
      .count();
    if new_reviews == 0 {
      debug!(app_id, page, "Review page added nothing new");
      break;
    }

    accumulated.extend(reviews);
    sort_descending_by_updated(&mut accumulated);
    debug!(app_id, page, count = accumulated.len(), "Fetched review page");

    let reached_cutoff = accumulated
      .last()
      .is_some_and(|oldest| oldest.is_before(cutoff));
    if reached_cutoff {
      break;
    }
  }

  let mut reviews = dedupe(accumulated);
  sort_descending_by_updated(&mut reviews);
  Ok(window_after(&reviews, cutoff).to_vec())
}

/// Normalize every entry on a page, skipping the ones that are not reviews.
fn normalize_page(app_id: &str, page: u32, entries: &[Value]) -> Vec<Review> {
  entries
    .iter()
    .filter_map(|entry| match normalize(entry) {
      Ok(review) => Some(review),
      Err(e) => {
        debug!(app_id, page, error = %e, "Skipping feed entry");
        None
      }
    })
    .collect()
}
