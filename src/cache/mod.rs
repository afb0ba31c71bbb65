//! Snapshot cache for app reviews.
//!
//! This module provides the disk-backed cache in front of the upstream feed:
//! - One snapshot file per tracked app, replaced atomically on every refresh
//! - Freshness policy deciding when a snapshot may be served or must be refetched
//! - Serving path that refetches stale or missing snapshots on demand
//! - Background refresher that keeps the stalest snapshot up to date

mod layer;
mod policy;
mod result;
mod scheduler;
mod storage;

pub use layer::ReviewCache;
pub use policy::FreshnessPolicy;
pub use result::{CacheResult, CacheSource};
pub use scheduler::{select_oldest, Refresher, TickOutcome};
pub use storage::{is_app_id, FileStorage, Snapshot, SnapshotStore};
