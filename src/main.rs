use app_reviews::cache::{FileStorage, Refresher, ReviewCache};
use app_reviews::config::Config;
use app_reviews::feed::ItunesClient;
use app_reviews::{logging, server};
use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "app-reviews")]
#[command(about = "Serves recent App Store reviews from a local cache")]
#[command(version)]
struct Args {
  /// Path to config file (default: ./app-reviews.yaml or $XDG_CONFIG_HOME/app-reviews/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Port to listen on
  #[arg(short, long)]
  port: Option<u16>,

  /// Directory holding cached review snapshots
  #[arg(long)]
  cache_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let mut config = Config::load(args.config.as_deref())?;

  // Override from command line
  if let Some(port) = args.port {
    config.server.port = port;
  }
  if let Some(dir) = args.cache_dir {
    config.cache.dir = dir;
  }

  let _log_guard = logging::init(&config.logging)?;

  let storage = FileStorage::open(&config.cache)
    .map_err(|e| eyre!("Failed to open cache directory {}: {}", config.cache.dir.display(), e))?;
  let feed = ItunesClient::new(&config.upstream)?;
  let cache = ReviewCache::new(Arc::new(storage), Arc::new(feed), &config);

  // Background refresher
  let (shutdown_tx, shutdown_rx) = watch::channel(false);
  let refresher = Refresher::new(cache.clone(), config.refresh.tick_interval());
  let refresher_handle = tokio::spawn(refresher.run(shutdown_rx));

  let addr = format!("{}:{}", config.server.host, config.server.port);
  let listener = tokio::net::TcpListener::bind(&addr)
    .await
    .map_err(|e| eyre!("Failed to listen on {}: {}", addr, e))?;
  info!(%addr, cache_dir = %config.cache.dir.display(), "Serving app reviews");

  axum::serve(listener, server::router(cache))
    .with_graceful_shutdown(shutdown_signal())
    .await?;

  // Let a refresh in progress finish writing before exiting
  let _ = shutdown_tx.send(true);
  refresher_handle.await?;

  info!("Shut down");
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(error = %e, "Failed to listen for shutdown signal");
    std::future::pending::<()>().await;
  }
  info!("Shutdown requested");
}
