use chrono::Duration;
use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub server: ServerConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub refresh: RefreshConfig,
  #[serde(default)]
  pub upstream: UpstreamConfig,
  #[serde(default)]
  pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
  pub host: String,
  pub port: u16,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host: "0.0.0.0".to_string(),
      port: 8000,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  /// Directory holding one snapshot file per app
  pub dir: PathBuf,
  pub file_prefix: String,
  pub file_suffix: String,
  /// How long a snapshot may be served before it must be refetched
  pub freshness_minutes: i64,
  /// How far back reviews are kept in a snapshot
  pub retention_hours: i64,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      dir: PathBuf::from("."),
      file_prefix: "App-".to_string(),
      file_suffix: ".json".to_string(),
      freshness_minutes: 10,
      retention_hours: 48,
    }
  }
}

impl CacheConfig {
  pub fn freshness_window(&self) -> Duration {
    Duration::minutes(self.freshness_minutes)
  }

  pub fn retention_window(&self) -> Duration {
    Duration::hours(self.retention_hours)
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
  /// Seconds between background refresh ticks
  pub tick_secs: u64,
}

impl Default for RefreshConfig {
  fn default() -> Self {
    Self { tick_secs: 1 }
  }
}

impl RefreshConfig {
  pub fn tick_interval(&self) -> std::time::Duration {
    std::time::Duration::from_secs(self.tick_secs.max(1))
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
  pub base_url: String,
  /// App Store storefront country code
  pub country: String,
  pub timeout_secs: u64,
  /// The feed never serves more than ten pages
  pub max_pages: u32,
}

impl Default for UpstreamConfig {
  fn default() -> Self {
    Self {
      base_url: "https://itunes.apple.com".to_string(),
      country: "us".to_string(),
      timeout_secs: 30,
      max_pages: 10,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
  /// Default filter when RUST_LOG is unset
  pub level: String,
  /// Also write daily-rotated log files here
  pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
  fn default() -> Self {
    Self {
      level: "info".to_string(),
      dir: None,
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./app-reviews.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/app-reviews/config.yaml
  ///
  /// Falls back to defaults when no file is found.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    let config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => Config::default(),
    };
    config.validate()?;

    Ok(config)
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("app-reviews.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("app-reviews").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::from_yaml(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  pub fn from_yaml(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents)?;
    Ok(config)
  }

  fn validate(&self) -> Result<()> {
    if self.cache.freshness_minutes <= 0 {
      return Err(eyre!("cache.freshness_minutes must be positive"));
    }
    if self.cache.retention_hours <= 0 {
      return Err(eyre!("cache.retention_hours must be positive"));
    }
    if self.upstream.max_pages == 0 {
      return Err(eyre!("upstream.max_pages must be at least 1"));
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_match_service_constants() {
    let config = Config::default();
    assert_eq!(config.server.port, 8000);
    assert_eq!(config.cache.freshness_window(), Duration::minutes(10));
    assert_eq!(config.cache.retention_window(), Duration::hours(48));
    assert_eq!(config.cache.file_prefix, "App-");
    assert_eq!(config.cache.file_suffix, ".json");
    assert_eq!(config.refresh.tick_interval(), std::time::Duration::from_secs(1));
  }

  #[test]
  fn partial_yaml_keeps_other_defaults() {
    let config = Config::from_yaml(
      "cache:\n  dir: /var/cache/reviews\n  freshness_minutes: 5\nupstream:\n  country: gb\n",
    )
    .unwrap();
    assert_eq!(config.cache.dir, PathBuf::from("/var/cache/reviews"));
    assert_eq!(config.cache.freshness_window(), Duration::minutes(5));
    assert_eq!(config.cache.retention_hours, 48);
    assert_eq!(config.upstream.country, "gb");
    assert_eq!(config.upstream.base_url, "https://itunes.apple.com");
    assert_eq!(config.server.port, 8000);
  }

  #[test]
  fn missing_explicit_path_is_an_error() {
    let err = Config::load(Some(Path::new("/nonexistent/app-reviews.yaml"))).unwrap_err();
    assert!(err.to_string().contains("Config file not found"));
  }

  #[test]
  fn rejects_non_positive_windows() {
    let config = Config::from_yaml("cache:\n  freshness_minutes: 0\n").unwrap();
    assert!(config.validate().is_err());
  }
}
