use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result as EyreResult};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::config::UpstreamConfig;
use crate::error::{CacheError, Result};
use crate::reviews::ApiFeedPage;

/// One page of the upstream review feed.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedPage {
  /// Raw feed entries, not yet normalized. May be empty.
  Entries(Vec<Value>),
  /// The upstream answered with a non-success status: there is nothing more to page through.
  End,
}

/// Source of paginated reviews for an app.
///
/// Errors: `FetchFailed` when the upstream cannot be reached, `MalformedRecord`
/// when a page body is not a feed document.
#[async_trait]
pub trait ReviewFeed: Send + Sync {
  async fn fetch_page(&self, app_id: &str, page: u32) -> Result<FeedPage>;
}

/// App Store customer review RSS client
#[derive(Clone)]
pub struct ItunesClient {
  client: reqwest::Client,
  base_url: Url,
  country: String,
}

impl ItunesClient {
  pub fn new(config: &UpstreamConfig) -> EyreResult<Self> {
    let mut base_url = Url::parse(&config.base_url)
      .map_err(|e| eyre!("Invalid upstream base url {}: {}", config.base_url, e))?;
    // Url::join replaces the last path segment unless the base ends in a slash.
    if !base_url.path().ends_with('/') {
      let path = format!("{}/", base_url.path());
      base_url.set_path(&path);
    }

    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .user_agent(concat!("app-reviews/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      client,
      base_url,
      country: config.country.clone(),
    })
  }

  /// URL of one page of the most-recent-first review feed for an app.
  pub fn page_url(&self, app_id: &str, page: u32) -> Result<Url> {
    let path = format!(
      "{}/rss/customerreviews/id={}/sortBy=mostRecent/page={}/json",
      self.country, app_id, page
    );
    self
      .base_url
      .join(&path)
      .map_err(|e| CacheError::fetch_failed(app_id, e))
  }
}

#[async_trait]
impl ReviewFeed for ItunesClient {
  async fn fetch_page(&self, app_id: &str, page: u32) -> Result<FeedPage> {
    let url = self.page_url(app_id, page)?;

    let response = self
      .client
      .get(url)
      .send()
      .await
      .map_err(|e| CacheError::fetch_failed(app_id, e))?;

    let status = response.status();
    if !status.is_success() {
      debug!(app_id, page, %status, "Review feed has no more pages");
      return Ok(FeedPage::End);
    }

    let body = response
      .bytes()
      .await
      .map_err(|e| CacheError::fetch_failed(app_id, e))?;

    let feed: ApiFeedPage = serde_json::from_slice(&body).map_err(|e| {
      CacheError::MalformedRecord(format!("page {} for app {}: {}", page, app_id, e))
    })?;

    Ok(FeedPage::Entries(feed.into_entries()))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use wiremock::matchers::{method, path};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  const FEED: &str = include_str!("../../tests/fixtures/app-feed.json");

  fn client(base_url: &str) -> ItunesClient {
    ItunesClient::new(&UpstreamConfig {
      base_url: base_url.to_string(),
      ..UpstreamConfig::default()
    })
    .unwrap()
  }

  #[test]
  fn builds_feed_page_url() {
    let url = client("https://itunes.apple.com").page_url("595068606", 3).unwrap();
    assert_eq!(
      url.as_str(),
      "https://itunes.apple.com/us/rss/customerreviews/id=595068606/sortBy=mostRecent/page=3/json"
    );

    let url = client("http://localhost:9000/proxy").page_url("1", 1).unwrap();
    assert_eq!(
      url.as_str(),
      "http://localhost:9000/proxy/us/rss/customerreviews/id=1/sortBy=mostRecent/page=1/json"
    );
  }

  #[tokio::test]
  async fn returns_entries_for_a_feed_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/us/rss/customerreviews/id=595068606/sortBy=mostRecent/page=1/json"))
      .respond_with(ResponseTemplate::new(200).set_body_string(FEED))
      .mount(&server)
      .await;

    let page = client(&server.uri()).fetch_page("595068606", 1).await.unwrap();
    match page {
      FeedPage::Entries(entries) => assert_eq!(entries.len(), 6),
      FeedPage::End => panic!("expected entries"),
    }
  }

  #[tokio::test]
  async fn non_success_status_ends_paging() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .respond_with(ResponseTemplate::new(400))
      .mount(&server)
      .await;

    let page = client(&server.uri()).fetch_page("595068606", 11).await.unwrap();
    assert_eq!(page, FeedPage::End);
  }

  #[tokio::test]
  async fn undecodable_body_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .respond_with(ResponseTemplate::new(200).set_body_string("<html>busy</html>"))
      .mount(&server)
      .await;

    let err = client(&server.uri()).fetch_page("595068606", 1).await.unwrap_err();
    assert!(matches!(err, CacheError::MalformedRecord(_)));
  }

  #[tokio::test]
  async fn unreachable_upstream_fails_the_fetch() {
    let server = MockServer::start().await;
    let uri = server.uri();
    drop(server);

    let err = client(&uri).fetch_page("595068606", 1).await.unwrap_err();
    assert!(matches!(err, CacheError::FetchFailed { ref app_id, .. } if app_id == "595068606"));
  }
}
