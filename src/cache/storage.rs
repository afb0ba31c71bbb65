//! Snapshot storage trait and flat-file implementation.

use chrono::{DateTime, Duration, Utc};
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use tempfile::NamedTempFile;

use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::reviews::Review;

/// Unix mode bits given to every snapshot file.
#[cfg(unix)]
const SNAPSHOT_MODE: u32 = 0o644;

/// A cached review set read back from storage.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
  /// Reviews in the order they were written (newest first)
  pub reviews: Vec<Review>,
  /// When the snapshot was last written
  pub written_at: DateTime<Utc>,
}

/// Trait for snapshot storage backends.
///
/// An app is tracked exactly when a snapshot exists for it; there is no separate registry.
pub trait SnapshotStore: Send + Sync {
  /// Read the snapshot for an app.
  fn read(&self, app_id: &str) -> Result<Snapshot>;

  /// Replace the snapshot for an app. Concurrent readers see either the old or the
  /// new snapshot in full.
  fn write(&self, app_id: &str, reviews: &[Review]) -> Result<()>;

  /// Every app that currently has a snapshot, in no particular order.
  fn list_tracked(&self) -> Result<Vec<String>>;

  /// When the snapshot for an app was last written.
  fn last_written(&self, app_id: &str) -> Result<DateTime<Utc>>;

  /// Time elapsed between the last write and `now`.
  fn age_of(&self, app_id: &str, now: DateTime<Utc>) -> Result<Duration> {
    Ok(now - self.last_written(app_id)?)
  }
}

/// Stores each snapshot as `{prefix}{app_id}{suffix}` in one directory.
///
/// The file's modification time is the snapshot's write time.
#[derive(Debug, Clone)]
pub struct FileStorage {
  dir: PathBuf,
  prefix: String,
  suffix: String,
}

impl FileStorage {
  /// Open the snapshot directory, creating it if needed.
  pub fn open(config: &CacheConfig) -> Result<Self> {
    std::fs::create_dir_all(&config.dir)?;

    Ok(Self {
      dir: config.dir.clone(),
      prefix: config.file_prefix.clone(),
      suffix: config.file_suffix.clone(),
    })
  }

  /// Path of the snapshot file for an app.
  pub fn path_for(&self, app_id: &str) -> PathBuf {
    self.dir.join(format!("{}{}{}", self.prefix, app_id, self.suffix))
  }

  /// Extract the app id from a snapshot file name, if it is one.
  fn app_id_from_file_name<'a>(&self, name: &'a str) -> Option<&'a str> {
    let app_id = name
      .strip_prefix(self.prefix.as_str())?
      .strip_suffix(self.suffix.as_str())?;
    is_app_id(app_id).then_some(app_id)
  }
}

impl SnapshotStore for FileStorage {
  fn read(&self, app_id: &str) -> Result<Snapshot> {
    let path = self.path_for(app_id);
    // Metadata and contents come from the same handle, so a concurrent rename
    // cannot pair one snapshot's timestamp with another's reviews.
    let mut file = File::open(&path).map_err(|e| not_found_or(app_id, e))?;
    let metadata = file.metadata()?;
    if !metadata.is_file() {
      return Err(CacheError::unreadable(app_id, "not a regular file"));
    }

    let mut data = Vec::with_capacity(metadata.len() as usize);
    file
      .read_to_end(&mut data)
      .map_err(|e| CacheError::unreadable(app_id, e))?;

    let reviews: Vec<Review> =
      serde_json::from_slice(&data).map_err(|e| CacheError::unreadable(app_id, e))?;

    Ok(Snapshot {
      reviews,
      written_at: metadata.modified()?.into(),
    })
  }

  fn write(&self, app_id: &str, reviews: &[Review]) -> Result<()> {
    let path = self.path_for(app_id);
    let write_err = |source: io::Error| CacheError::Write {
      app_id: app_id.to_string(),
      source,
    };

    let data = serde_json::to_vec(reviews).map_err(|e| write_err(e.into()))?;

    // Temp file in the same directory so the final rename stays on one filesystem.
    let mut tmp = NamedTempFile::new_in(&self.dir).map_err(write_err)?;
    tmp.write_all(&data).map_err(write_err)?;
    // Temp files are created owner-only; snapshots are shared with other readers.
    #[cfg(unix)]
    {
      use std::os::unix::fs::PermissionsExt;
      tmp
        .as_file()
        .set_permissions(std::fs::Permissions::from_mode(SNAPSHOT_MODE))
        .map_err(write_err)?;
    }
    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(&path).map_err(|e| write_err(e.error))?;

    Ok(())
  }

  fn list_tracked(&self) -> Result<Vec<String>> {
    let mut app_ids = Vec::new();
    for entry in std::fs::read_dir(&self.dir)? {
      let entry = entry?;
      let name = entry.file_name();
      if let Some(app_id) = name.to_str().and_then(|n| self.app_id_from_file_name(n)) {
        app_ids.push(app_id.to_string());
      }
    }
    Ok(app_ids)
  }

  fn last_written(&self, app_id: &str) -> Result<DateTime<Utc>> {
    let metadata = std::fs::metadata(self.path_for(app_id)).map_err(|e| not_found_or(app_id, e))?;
    if !metadata.is_file() {
      return Err(CacheError::unreadable(app_id, "not a regular file"));
    }
    Ok(metadata.modified()?.into())
  }
}

/// App Store ids are purely numeric.
pub fn is_app_id(s: &str) -> bool {
  !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn not_found_or(app_id: &str, err: io::Error) -> CacheError {
  if err.kind() == io::ErrorKind::NotFound {
    CacheError::NotFound(app_id.to_string())
  } else {
    CacheError::unreadable(app_id, err)
  }
}
