//! Review record model.
//!
//! `api_types` mirrors the verbose upstream feed; `types` holds the flattened
//! `Review` that is cached and served, plus the ordering and windowing helpers
//! the fetch pipeline is built from.

pub mod api_types;
pub mod types;

pub use api_types::{normalize, ApiFeedPage};
pub use types::{dedupe, sort_descending_by_updated, window_after, Author, Review};
