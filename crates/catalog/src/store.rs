use common::{
    Album, Artist, CatalogId, CatalogRoot, CoverOwner, CoverRef, DeletedRecord, DuplicateKey,
    MediaDetails, MediaKind, MediaRecord, NewCatalog, Playlist, RecordId,
};
use serde::Serialize;

use crate::error::Result;

/// Which per-catalog timestamp a pass advances.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CatalogMarker {
    Add,
    Update,
    Clean,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CatalogStats {
    pub songs: usize,
    pub videos: usize,
    pub episodes: usize,
}

impl CatalogStats {
    pub fn count(&self, kind: MediaKind) -> usize {
        match kind {
            MediaKind::Song => self.songs,
            MediaKind::Video => self.videos,
            MediaKind::PodcastEpisode => self.episodes,
        }
    }

    pub fn items(&self) -> usize {
        self.songs + self.videos + self.episodes
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct GcStats {
    pub albums: usize,
    pub artists: usize,
    pub ratings: usize,
    pub covers: usize,
}

/// Field-level difference between a stored record and a fresh read of its
/// file. `None` means unchanged.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RecordChanges {
    pub size: Option<u64>,
    pub mtime: Option<u64>,
    pub title: Option<String>,
    pub details: Option<MediaDetails>,
}

impl RecordChanges {
    pub fn between(stored: &MediaRecord, fresh: &MediaRecord) -> Self {
        Self {
            size: (stored.size != fresh.size).then_some(fresh.size),
            mtime: (stored.mtime != fresh.mtime).then_some(fresh.mtime),
            title: (stored.title != fresh.title).then(|| fresh.title.clone()),
            details: (stored.details != fresh.details).then(|| fresh.details.clone()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.size.is_none() && self.mtime.is_none() && self.title.is_none() && self.details.is_none()
    }

    pub fn apply(&self, record: &mut MediaRecord) {
        if let Some(size) = self.size {
            record.size = size;
        }
        if let Some(mtime) = self.mtime {
            record.mtime = mtime;
        }
        if let Some(title) = &self.title {
            record.title = title.clone();
        }
        if let Some(details) = &self.details {
            record.details = details.clone();
        }
    }
}

/// Persistent index the reconciliation passes read and write through.
///
/// Implementations serialize their own writes; every method is a complete
/// unit of work, so a pass interrupted between calls leaves the index
/// consistent up to the last call that returned.
pub trait IndexStore: Send + Sync {
    /// Stores a new catalog root. Path validation happens in
    /// [`crate::catalogs::create_catalog`].
    fn create_catalog(&self, catalog: NewCatalog) -> Result<CatalogRoot>;

    fn get_catalog(&self, id: CatalogId) -> Result<Option<CatalogRoot>>;

    fn list_catalogs(&self) -> Result<Vec<CatalogRoot>>;

    fn touch_catalog(&self, id: CatalogId, marker: CatalogMarker, at: u64) -> Result<()>;

    /// Rewrites the root and the matching prefix of every record path.
    fn relocate_catalog(&self, id: CatalogId, new_root: &str) -> Result<CatalogRoot>;

    /// One page of a catalog's records of `kind`, ordered by id and starting
    /// strictly after `after`.
    fn records_by_catalog(
        &self,
        catalog: CatalogId,
        kind: MediaKind,
        after: Option<RecordId>,
        limit: usize,
    ) -> Result<Vec<MediaRecord>>;

    fn get_record(&self, id: RecordId) -> Result<Option<MediaRecord>>;

    /// Case-insensitive path lookup within one catalog.
    fn find_by_path(&self, catalog: CatalogId, path: &str) -> Result<Option<MediaRecord>>;

    fn find_duplicate(&self, key: &DuplicateKey) -> Result<Option<RecordId>>;

    /// Assigns an id and stores the record. Fails with `DuplicatePath` when
    /// the catalog already holds the same path.
    fn insert_record(&self, record: MediaRecord) -> Result<RecordId>;

    /// Returns false when the record no longer exists.
    fn update_record(&self, id: RecordId, changes: &RecordChanges, updated_at: u64)
        -> Result<bool>;

    /// Unknown ids are ignored. Returns how many records were removed.
    fn delete_records(&self, ids: &[RecordId]) -> Result<usize>;

    /// Upserts one tombstone per record.
    fn archive_deleted(&self, records: &[MediaRecord], deleted_at: u64) -> Result<()>;

    fn get_deleted(&self, id: RecordId) -> Result<Option<DeletedRecord>>;

    fn stats_by_catalog(&self, catalog: CatalogId) -> Result<CatalogStats>;

    fn get_artist(&self, id: &str) -> Result<Option<Artist>>;

    fn get_album(&self, id: &str) -> Result<Option<Album>>;

    fn set_rating(&self, record: RecordId, user: &str, rating: u8) -> Result<()>;

    fn ratings_for(&self, record: RecordId) -> Result<Vec<(String, u8)>>;

    fn save_playlist(&self, playlist: &Playlist) -> Result<()>;

    fn get_playlist(&self, id: &str) -> Result<Option<Playlist>>;

    fn set_cover(&self, owner: &CoverOwner, cover: &CoverRef) -> Result<()>;

    fn get_cover(&self, owner: &CoverOwner) -> Result<Option<CoverRef>>;

    /// Drops albums, artists, covers and ratings nothing refers to anymore.
    fn collect_garbage(&self) -> Result<GcStats>;
}
