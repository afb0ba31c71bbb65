//! Upstream review feed: the HTTP client and the paginated fetch built on it.

pub mod client;
pub mod pipeline;

pub use client::{FeedPage, ItunesClient, ReviewFeed};
pub use pipeline::{fetch_reviews, FetchSettings};
