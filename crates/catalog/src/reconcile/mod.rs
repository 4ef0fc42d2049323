//! Add, Verify and Clean passes that keep the index in line with the
//! filesystem.

mod add;
mod clean;
pub(crate) mod draft;
mod verify;

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use common::{CatalogId, CatalogRoot, MediaKind, RecordId};
use metadata::{MetadataError, MetadataExtractor, TagInfo};
use serde::Serialize;
use tracing::warn;

use crate::charset::PathEncoding;
use crate::classify::MediaClassifier;
use crate::config::ScanConfig;
use crate::error::{CatalogError, Result};
use crate::lock::CatalogLocks;
use crate::playlist::PlaylistImport;
use crate::store::{GcStats, IndexStore};
use crate::walker::WalkError;

pub use clean::deletion_allowed;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    DirUnreadable,
    SymlinkLoop,
    EmptyFile,
    Unreadable,
    EncodingMismatch,
    TagRead,
    MoveFailed,
    PresentUnreadable,
    Playlist,
    Artwork,
    CleanRefused,
}

impl IssueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueKind::DirUnreadable => "dir_unreadable",
            IssueKind::SymlinkLoop => "symlink_loop",
            IssueKind::EmptyFile => "empty_file",
            IssueKind::Unreadable => "unreadable",
            IssueKind::EncodingMismatch => "encoding_mismatch",
            IssueKind::TagRead => "tag_read",
            IssueKind::MoveFailed => "move_failed",
            IssueKind::PresentUnreadable => "present_unreadable",
            IssueKind::Playlist => "playlist",
            IssueKind::Artwork => "artwork",
            IssueKind::CleanRefused => "clean_refused",
        }
    }
}

/// One per-item problem a pass skipped over.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ScanIssue {
    pub kind: IssueKind,
    pub path: String,
    pub message: String,
}

#[derive(Debug, Default)]
pub(crate) struct IssueLog {
    issues: Vec<ScanIssue>,
}

impl IssueLog {
    pub(crate) fn report(&mut self, kind: IssueKind, path: &str, message: impl Into<String>) {
        let issue = ScanIssue {
            kind,
            path: path.to_string(),
            message: message.into(),
        };
        warn!("[{}] {}: {}", kind.as_str(), issue.path, issue.message);
        self.issues.push(issue);
    }

    pub(crate) fn walk_error(&mut self, err: &WalkError) {
        let kind = match err {
            WalkError::SymlinkLoop { .. } => IssueKind::SymlinkLoop,
            WalkError::DirUnreadable { .. } => IssueKind::DirUnreadable,
            WalkError::Entry { .. } => IssueKind::Unreadable,
        };
        let path = err
            .path()
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_default();
        self.report(kind, &path, err.to_string());
    }

    pub(crate) fn into_vec(self) -> Vec<ScanIssue> {
        self.issues
    }
}

/// Counters for one pass.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ReconciliationStats {
    pub files_seen: usize,
    pub added: usize,
    pub updated: usize,
    pub removed: usize,
    pub skipped: usize,
    pub duplicates: usize,
    pub errors: usize,
    pub elapsed_ms: u64,
}

#[derive(Clone, Debug)]
pub struct AddOptions {
    pub gather_art: bool,
    pub parse_playlist: bool,
    /// Walk only this subtree of the catalog root.
    pub subdirectory: Option<PathBuf>,
}

impl Default for AddOptions {
    fn default() -> Self {
        Self {
            gather_art: true,
            parse_playlist: false,
            subdirectory: None,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct AddOutcome {
    pub stats: ReconciliationStats,
    pub issues: Vec<ScanIssue>,
    pub playlists: Vec<PlaylistImport>,
    pub art_gathered: usize,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct VerifyOutcome {
    pub total_examined: usize,
    pub total_updated: usize,
    pub stats: ReconciliationStats,
    pub issues: Vec<ScanIssue>,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct CleanOutcome {
    pub removed: usize,
    /// Scopes the pass declined to touch, with the reason.
    pub refusals: Vec<ScanIssue>,
    pub issues: Vec<ScanIssue>,
    pub gc: Option<GcStats>,
    pub stats: ReconciliationStats,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CleanFileOutcome {
    Removed(RecordId),
    NotIndexed,
    Present,
    Unreadable,
}

/// Runs passes over catalogs. One pass per catalog at a time; different
/// catalogs may be processed concurrently through clones sharing `locks`.
#[derive(Clone)]
pub struct Reconciler {
    store: Arc<dyn IndexStore>,
    extractor: Arc<dyn MetadataExtractor>,
    config: ScanConfig,
    encoding: PathEncoding,
    classifier: MediaClassifier,
    locks: CatalogLocks,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn IndexStore>,
        extractor: Arc<dyn MetadataExtractor>,
        config: ScanConfig,
    ) -> Result<Self> {
        let encoding = PathEncoding::new(&config.site_charset, config.local_charset())?;
        let classifier = MediaClassifier::from_config(&config);
        Ok(Self {
            store,
            extractor,
            config,
            encoding,
            classifier,
            locks: CatalogLocks::new(),
        })
    }

    pub fn with_locks(mut self, locks: CatalogLocks) -> Self {
        self.locks = locks;
        self
    }

    pub fn store(&self) -> &dyn IndexStore {
        self.store.as_ref()
    }

    pub fn locks(&self) -> &CatalogLocks {
        &self.locks
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    fn catalog(&self, id: CatalogId) -> Result<CatalogRoot> {
        self.store
            .get_catalog(id)?
            .ok_or(CatalogError::CatalogNotFound(id))
    }

    fn chunk_size(&self) -> usize {
        self.config.chunk_size.max(1)
    }

    /// Tag read that turns a panicking extractor into an error.
    fn read_tags(&self, path: &Path, kind: MediaKind) -> Result<TagInfo, MetadataError> {
        let extractor = self.extractor.as_ref();
        match panic::catch_unwind(AssertUnwindSafe(|| extractor.extract(path, kind))) {
            Ok(result) => result,
            Err(payload) => Err(MetadataError::Panic(panic_message(payload.as_ref()))),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Whether the file can be opened for reading right now.
fn is_readable(path: &Path) -> bool {
    std::fs::File::open(path).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_payloads_become_messages() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
        let payload: Box<dyn Any + Send> = Box::new(5u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }

    #[test]
    fn issues_keep_their_order() {
        let mut log = IssueLog::default();
        log.report(IssueKind::EmptyFile, "/a", "empty");
        log.walk_error(&WalkError::DirUnreadable {
            path: PathBuf::from("/b"),
            message: "denied".to_string(),
        });
        let issues = log.into_vec();
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[1].kind, IssueKind::DirUnreadable);
        assert_eq!(issues[1].path, "/b");
    }
}
