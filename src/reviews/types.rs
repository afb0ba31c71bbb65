use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Review author
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
  pub name: String,
  pub uri: String,
}

/// A single customer review, flattened from the upstream feed.
///
/// This is also the on-disk shape of a cached snapshot entry. `updated` keeps the
/// offset the upstream reported so a snapshot reads back exactly as written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
  pub author: Author,
  pub updated: DateTime<FixedOffset>,
  pub rating: i32,
  pub version: String,
  pub id: String,
  pub title: String,
  pub content: String,
  pub link: String,
}

impl Review {
  /// Returns true if this review was last updated strictly before `cutoff`.
  pub fn is_before(&self, cutoff: DateTime<Utc>) -> bool {
    self.updated.with_timezone(&Utc) < cutoff
  }
}

/// Keep the first occurrence of every review id, preserving input order.
pub fn dedupe(reviews: Vec<Review>) -> Vec<Review> {
  let mut seen = HashSet::with_capacity(reviews.len());
  reviews
    .into_iter()
    .filter(|review| seen.insert(review.id.clone()))
    .collect()
}

/// Sort newest first. Reviews updated at the same instant keep their relative order.
pub fn sort_descending_by_updated(reviews: &mut [Review]) {
  reviews.sort_by(|a, b| b.updated.cmp(&a.updated));
}

/// Returns the leading run of `reviews` updated at or after `cutoff`.
///
/// `reviews` must already be sorted newest first; this stops at the first review
/// older than `cutoff` and never looks past it.
pub fn window_after(reviews: &[Review], cutoff: DateTime<Utc>) -> &[Review] {
  let end = reviews
    .iter()
    .position(|review| review.is_before(cutoff))
    .unwrap_or(reviews.len());
  &reviews[..end]
}
