use std::fs;
use std::time::Instant;

use common::{CatalogId, CatalogRoot, MediaKind, MediaRecord};
use tracing::{debug, info};

use super::draft::{build_record, file_mtime};
use super::{is_readable, IssueKind, IssueLog, Reconciler, ReconciliationStats, VerifyOutcome};
use crate::error::Result;
use crate::now_secs;
use crate::progress::{ProgressSink, Ticker};
use crate::store::{CatalogMarker, RecordChanges};

impl Reconciler {
    /// Re-reads tags for records whose files may have changed and stores the
    /// fields that differ.
    pub fn verify(&self, catalog_id: CatalogId, progress: &dyn ProgressSink) -> Result<VerifyOutcome> {
        let _guard = self.locks.try_lock(catalog_id)?;
        let catalog = self.catalog(catalog_id)?;
        let started = Instant::now();
        let start_time = now_secs();
        let chunk_size = self.chunk_size();
        info!("Verifying catalog {} ({})", catalog.id, catalog.name);

        let mut outcome = VerifyOutcome::default();
        let mut issues = IssueLog::default();
        let mut ticker = Ticker::new(progress, self.config.progress_interval);

        for kind in MediaKind::ALL {
            let mut after = None;
            loop {
                let chunk = self.store.records_by_catalog(catalog.id, kind, after, chunk_size)?;
                let last = match chunk.last() {
                    Some(record) => record.id,
                    None => break,
                };
                for record in &chunk {
                    ticker.bump(&record.path);
                    if !needs_verify(&catalog, record) {
                        continue;
                    }
                    outcome.total_examined += 1;
                    if self.verify_record(&catalog, record, start_time, &mut issues, &mut outcome.stats)? {
                        outcome.total_updated += 1;
                    }
                }
                if chunk.len() < chunk_size {
                    break;
                }
                after = Some(last);
            }
        }
        ticker.finish("verify");

        self.store.touch_catalog(catalog.id, CatalogMarker::Update, start_time)?;

        outcome.issues = issues.into_vec();
        outcome.stats.updated = outcome.total_updated;
        outcome.stats.errors = outcome.issues.len();
        outcome.stats.elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            "Catalog {} verify finished: {} examined, {} updated, {} issues",
            catalog.id,
            outcome.total_examined,
            outcome.total_updated,
            outcome.stats.errors
        );
        Ok(outcome)
    }

    /// Returns whether the stored record changed.
    fn verify_record(
        &self,
        catalog: &CatalogRoot,
        record: &MediaRecord,
        now: u64,
        issues: &mut IssueLog,
        stats: &mut ReconciliationStats,
    ) -> Result<bool> {
        let file = self.encoding.to_local(&record.path);
        stats.files_seen += 1;
        let meta = match fs::metadata(&file) {
            Ok(meta) if is_readable(&file) => meta,
            Ok(_) => {
                issues.report(IssueKind::Unreadable, &record.path, "file can not be opened");
                return Ok(false);
            }
            Err(err) => {
                issues.report(IssueKind::Unreadable, &record.path, err.to_string());
                return Ok(false);
            }
        };

        if self.config.catalog_verify_by_time {
            let mtime = file_mtime(&meta);
            if mtime < catalog.last_update && mtime < record.updated_at {
                debug!("{} unchanged since last update", record.path);
                stats.skipped += 1;
                return Ok(false);
            }
        }

        let tags = match self.read_tags(&file, record.kind()) {
            Ok(tags) => tags,
            Err(err) => {
                issues.report(IssueKind::TagRead, &record.path, err.to_string());
                return Ok(false);
            }
        };
        let fresh = build_record(
            catalog,
            &file,
            &record.path,
            record.kind(),
            &tags,
            &meta,
            record.added_at,
        );
        let changes = RecordChanges::between(record, &fresh);
        if changes.is_empty() {
            return Ok(false);
        }
        debug!("Updating {}: {:?}", record.path, changes);
        self.store.update_record(record.id, &changes, now)
    }
}

/// Records whose file is plausibly newer than the index: stale since the
/// last catalog update, or added after it.
fn needs_verify(catalog: &CatalogRoot, record: &MediaRecord) -> bool {
    record.updated_at < catalog.last_update || record.added_at > catalog.last_update
}
