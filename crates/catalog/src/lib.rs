//! Catalog reconciliation: keeps a media index in line with the files under
//! each catalog root.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

mod artwork;
pub mod cache;
pub mod catalogs;
pub mod charset;
pub mod classify;
pub mod config;
pub mod error;
pub mod lock;
pub mod pattern;
pub mod playlist;
pub mod progress;
pub mod reconcile;
pub mod redb_store;
pub mod store;
pub mod walker;

#[cfg(test)]
pub(crate) mod test_support;

pub use cache::IndexCache;
pub use catalogs::{create_catalog, find_catalog_for_path, move_catalog};
pub use classify::{Classification, MediaClassifier};
pub use config::ScanConfig;
pub use error::{CatalogError, Result};
pub use lock::CatalogLocks;
pub use progress::{NoProgress, ProgressSink};
pub use reconcile::{
    AddOptions, AddOutcome, CleanFileOutcome, CleanOutcome, IssueKind, Reconciler,
    ReconciliationStats, ScanIssue, VerifyOutcome,
};
pub use redb_store::RedbStore;
pub use store::{CatalogMarker, CatalogStats, GcStats, IndexStore};
pub use walker::{PathWalker, WalkEntry, WalkError, WalkOptions};

pub(crate) fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0))
        .as_secs()
}
