use std::fs;
use std::path::Path;
use std::time::Instant;

use common::{CatalogId, MediaKind, MediaRecord};
use tracing::{info, warn};

use super::{is_readable, CleanFileOutcome, CleanOutcome, IssueKind, IssueLog, Reconciler};
use crate::error::Result;
use crate::now_secs;
use crate::progress::{ProgressSink, Ticker};
use crate::store::CatalogMarker;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FileState {
    Present,
    Missing,
    Unreadable,
}

/// Missing means the stat fails or the file is empty; a file that exists
/// but can not be opened is kept.
fn file_state(path: &Path) -> FileState {
    match fs::metadata(path) {
        Err(_) => FileState::Missing,
        Ok(meta) if meta.len() < 1 => FileState::Missing,
        Ok(_) if !is_readable(path) => FileState::Unreadable,
        Ok(_) => FileState::Present,
    }
}

/// Whether the dead records of one kind may be deleted. With the root gone
/// and every record of the kind dead, nothing is deleted.
pub fn deletion_allowed(root_exists: bool, dead: usize, total: usize) -> bool {
    root_exists || dead < total
}

impl Reconciler {
    /// Removes records whose files are gone, archiving each one first.
    pub fn clean(&self, catalog_id: CatalogId, progress: &dyn ProgressSink) -> Result<CleanOutcome> {
        let _guard = self.locks.try_lock(catalog_id)?;
        let catalog = self.catalog(catalog_id)?;
        let started = Instant::now();
        let start_time = now_secs();
        let root = self.encoding.to_local(&catalog.path);
        let mut outcome = CleanOutcome::default();
        let mut refusals = IssueLog::default();

        if let Err(err) = fs::read_dir(&root) {
            refusals.report(
                IssueKind::CleanRefused,
                &catalog.path,
                format!("catalog root can not be read, nothing removed: {}", err),
            );
            outcome.refusals = refusals.into_vec();
            return Ok(outcome);
        }
        info!("Cleaning catalog {} ({})", catalog.id, catalog.name);

        let totals = self.store.stats_by_catalog(catalog.id)?;
        let chunk_size = self.chunk_size();
        let mut issues = IssueLog::default();
        let mut ticker = Ticker::new(progress, self.config.progress_interval);

        for kind in MediaKind::ALL {
            let total = totals.count(kind);
            let mut dead_count = 0usize;
            let mut deferred: Vec<MediaRecord> = Vec::new();
            let mut after = None;
            loop {
                let chunk = self.store.records_by_catalog(catalog.id, kind, after, chunk_size)?;
                let last = match chunk.last() {
                    Some(record) => record.id,
                    None => break,
                };
                let full = chunk.len() == chunk_size;

                let mut dead = Vec::new();
                for record in chunk {
                    ticker.bump(&record.path);
                    outcome.stats.files_seen += 1;
                    match file_state(&self.encoding.to_local(&record.path)) {
                        FileState::Present => {}
                        FileState::Missing => dead.push(record),
                        FileState::Unreadable => issues.report(
                            IssueKind::PresentUnreadable,
                            &record.path,
                            "file exists but can not be read, kept",
                        ),
                    }
                }
                dead_count += dead.len();

                if deferred.is_empty() && root.exists() {
                    outcome.removed += self.remove_records(&dead, start_time)?;
                } else {
                    deferred.extend(dead);
                }
                if !full {
                    break;
                }
                after = Some(last);
            }

            if deferred.is_empty() {
                continue;
            }
            if deletion_allowed(root.exists(), dead_count, total) {
                outcome.removed += self.remove_records(&deferred, start_time)?;
            } else {
                warn!(
                    "Catalog {} root is gone and every {} record is dead, keeping them",
                    catalog.id,
                    kind.as_str()
                );
                refusals.report(
                    IssueKind::CleanRefused,
                    &catalog.path,
                    format!(
                        "root missing and all {} {} records dead, nothing removed",
                        total,
                        kind.as_str()
                    ),
                );
            }
        }
        ticker.finish("clean");

        outcome.gc = Some(self.store.collect_garbage()?);
        self.store.touch_catalog(catalog.id, CatalogMarker::Clean, start_time)?;

        outcome.issues = issues.into_vec();
        outcome.refusals = refusals.into_vec();
        outcome.stats.removed = outcome.removed;
        outcome.stats.errors = outcome.issues.len() + outcome.refusals.len();
        outcome.stats.elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            "Catalog {} clean finished: {} removed, {} kept unreadable, {} refused",
            catalog.id,
            outcome.removed,
            outcome.issues.len(),
            outcome.refusals.len()
        );
        Ok(outcome)
    }

    /// Single-record version of Clean for `path` inside the catalog.
    pub fn clean_file(
        &self,
        catalog_id: CatalogId,
        path: &str,
        kind: MediaKind,
    ) -> Result<CleanFileOutcome> {
        let _guard = self.locks.try_lock(catalog_id)?;
        let catalog = self.catalog(catalog_id)?;
        let record = match self.store.find_by_path(catalog.id, path)? {
            Some(record) if record.kind() == kind => record,
            _ => return Ok(CleanFileOutcome::NotIndexed),
        };

        match file_state(&self.encoding.to_local(&record.path)) {
            FileState::Present => Ok(CleanFileOutcome::Present),
            FileState::Unreadable => {
                warn!("{} exists but can not be read, kept", record.path);
                Ok(CleanFileOutcome::Unreadable)
            }
            FileState::Missing => {
                let id = record.id;
                self.remove_records(std::slice::from_ref(&record), now_secs())?;
                info!("Removed {} ({})", record.path, id);
                Ok(CleanFileOutcome::Removed(id))
            }
        }
    }

    /// Archives then deletes. Both steps tolerate a repeat.
    fn remove_records(&self, records: &[MediaRecord], at: u64) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        self.store.archive_deleted(records, at)?;
        let ids: Vec<_> = records.iter().map(|record| record.id).collect();
        self.store.delete_records(&ids)
    }
}
