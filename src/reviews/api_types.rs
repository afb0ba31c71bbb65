//! Serde-deserializable types matching the App Store customer review RSS feed.
//!
//! The feed wraps every scalar as `{"label": value}` and every link as
//! `{"attributes": {"href": value}}`. These types mirror that shape; `normalize`
//! flattens one entry into a domain `Review`.

use chrono::DateTime;
use serde::Deserialize;
use serde_json::Value;

use super::types::{Author, Review};
use crate::error::{CacheError, Result};

// ============================================================================
// Wrapped field types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiLabel {
  pub label: String,
}

#[derive(Debug, Deserialize)]
pub struct ApiLinkAttributes {
  pub href: String,
}

#[derive(Debug, Deserialize)]
pub struct ApiLink {
  pub attributes: ApiLinkAttributes,
}

#[derive(Debug, Deserialize)]
pub struct ApiAuthor {
  pub name: ApiLabel,
  pub uri: ApiLabel,
}

// ============================================================================
// Feed entry
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiEntry {
  pub author: ApiAuthor,
  pub updated: ApiLabel,
  #[serde(rename = "im:rating")]
  pub rating: ApiLabel,
  #[serde(rename = "im:version")]
  pub version: ApiLabel,
  pub id: ApiLabel,
  pub title: ApiLabel,
  pub content: ApiLabel,
  pub link: ApiLink,
}

// ============================================================================
// Feed page
// ============================================================================

/// `entry` is an object rather than an array when a page holds a single entry.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ApiEntries {
  Many(Vec<Value>),
  One(Value),
}

impl Default for ApiEntries {
  fn default() -> Self {
    ApiEntries::Many(Vec::new())
  }
}

#[derive(Debug, Default, Deserialize)]
pub struct ApiFeed {
  #[serde(default)]
  pub entry: ApiEntries,
}

/// One page of the review feed. Entries stay untyped so a single bad entry
/// can be skipped without losing the rest of the page.
#[derive(Debug, Deserialize)]
pub struct ApiFeedPage {
  #[serde(default)]
  pub feed: ApiFeed,
}

impl ApiFeedPage {
  pub fn into_entries(self) -> Vec<Value> {
    match self.feed.entry {
      ApiEntries::Many(entries) => entries,
      ApiEntries::One(entry) => vec![entry],
    }
  }
}

// ============================================================================
// Conversion to domain type
// ============================================================================

/// Flatten one wire entry into a `Review`.
pub fn normalize(entry: &Value) -> Result<Review> {
  let api =
    ApiEntry::deserialize(entry).map_err(|e| CacheError::MalformedRecord(e.to_string()))?;

  let rating = api.rating.label.trim().parse::<i32>().map_err(|e| {
    CacheError::MalformedRecord(format!(
      "rating {:?} for review {}: {}",
      api.rating.label, api.id.label, e
    ))
  })?;

  let updated = DateTime::parse_from_rfc3339(&api.updated.label).map_err(|e| {
    CacheError::MalformedRecord(format!(
      "updated {:?} for review {}: {}",
      api.updated.label, api.id.label, e
    ))
  })?;

  Ok(Review {
    author: Author {
      name: api.author.name.label,
      uri: api.author.uri.label,
    },
    updated,
    rating,
    version: api.version.label,
    id: api.id.label,
    title: api.title.label,
    content: api.content.label,
    link: api.link.attributes.href,
  })
}
