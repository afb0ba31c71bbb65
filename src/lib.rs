pub mod cache;
pub mod config;
pub mod error;
pub mod feed;
pub mod logging;
pub mod reviews;
pub mod server;
