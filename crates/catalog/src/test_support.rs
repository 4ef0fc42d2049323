//! Fixtures shared by the unit tests.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use common::{
    album_id, artist_id, CatalogId, CatalogRoot, GatherType, MediaDetails, MediaKind, MediaRecord,
    NewCatalog, SongDetails, VideoDetails,
};
use metadata::{
    parse_genres, parse_position, parse_ratings, parse_year, CoverArt, MetadataError,
    MetadataExtractor, TagInfo,
};
use tempfile::TempDir;

use crate::catalogs::create_catalog;
use crate::config::ScanConfig;
use crate::reconcile::Reconciler;
use crate::redb_store::RedbStore;
use crate::store::IndexStore;

/// Reads `key=value` lines from the file body instead of real tags.
/// `error=` fails the read and `panic=` panics.
pub(crate) struct FakeExtractor;

impl MetadataExtractor for FakeExtractor {
    fn extract(&self, path: &Path, _kind: MediaKind) -> Result<TagInfo, MetadataError> {
        let text = fs::read_to_string(path)?;
        let mut tags = TagInfo::default();
        for line in text.lines() {
            let (key, value) = match line.split_once('=') {
                Some((key, value)) => (key.trim(), value.trim()),
                None => continue,
            };
            match key {
                "title" => tags.title = Some(value.to_string()),
                "artist" => tags.artist = Some(value.to_string()),
                "album_artist" => tags.album_artist = Some(value.to_string()),
                "album" => tags.album = Some(value.to_string()),
                "comment" => tags.comment = Some(value.to_string()),
                "podcast" => tags.podcast = Some(value.to_string()),
                "track" => tags.track_no = parse_position(value),
                "disc" => tags.disc_no = parse_position(value),
                "year" => tags.year = parse_year(value),
                "genre" => tags.genres.extend(parse_genres(value)),
                "rating" => tags.ratings.extend(parse_ratings(value)),
                "cover" => tags.has_embedded_cover = value == "1",
                "error" => {
                    return Err(MetadataError::Io(std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        value.to_string(),
                    )))
                }
                "panic" => panic!("{}", value),
                _ => {}
            }
        }
        Ok(tags)
    }

    fn cover(&self, path: &Path) -> Result<Option<CoverArt>, MetadataError> {
        let text = fs::read_to_string(path)?;
        let embedded = text.lines().any(|line| line.trim() == "cover=1");
        Ok(embedded.then(|| CoverArt {
            data: vec![0xFF, 0xD8, 0xFF, 0xE0],
            mime: Some("image/jpeg".to_string()),
        }))
    }
}

/// A catalog rooted at `<tempdir>/music` with its index beside it.
pub(crate) struct TestCatalog {
    pub _dir: TempDir,
    pub root: PathBuf,
    pub store: Arc<RedbStore>,
    pub catalog: CatalogRoot,
}

impl TestCatalog {
    pub fn new(gather_type: GatherType) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("music");
        fs::create_dir(&root).unwrap();
        let store = Arc::new(RedbStore::open(&dir.path().join("index.redb")).unwrap());
        let catalog = create_catalog(
            store.as_ref(),
            NewCatalog {
                name: "test".to_string(),
                path: root.to_string_lossy().to_string(),
                gather_type,
                sort_pattern: String::new(),
                rename_pattern: String::new(),
            },
        )
        .unwrap();
        Self {
            _dir: dir,
            root,
            store,
            catalog,
        }
    }
}

pub(crate) fn reconciler(env: &TestCatalog, configure: impl FnOnce(&mut ScanConfig)) -> Reconciler {
    let mut config = ScanConfig::default();
    configure(&mut config);
    let store: Arc<dyn IndexStore> = env.store.clone();
    Reconciler::new(store, Arc::new(FakeExtractor), config).unwrap()
}

/// Writes `body` to `root/rel`, creating parent folders.
pub(crate) fn write_media(root: &Path, rel: &str, body: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, body).unwrap();
}

/// Store plus a catalog whose root need not exist on disk.
pub(crate) fn temp_store(root: &str, gather_type: GatherType) -> (TempDir, RedbStore, CatalogRoot) {
    let dir = tempfile::tempdir().unwrap();
    let store = RedbStore::open(&dir.path().join("index.redb")).unwrap();
    let catalog = store
        .create_catalog(NewCatalog {
            name: "test".to_string(),
            path: root.to_string(),
            gather_type,
            sort_pattern: String::new(),
            rename_pattern: String::new(),
        })
        .unwrap();
    (dir, store, catalog)
}

pub(crate) fn song_record(catalog: CatalogId, path: &str, title: &str) -> MediaRecord {
    let artist = artist_id("Band");
    MediaRecord {
        id: 0,
        catalog_id: catalog,
        path: path.to_string(),
        size: 100,
        mtime: 1,
        added_at: 1,
        updated_at: 1,
        title: title.to_string(),
        play_count: 0,
        skip_count: 0,
        details: MediaDetails::Song(SongDetails {
            artist: "Band".to_string(),
            album: "Album".to_string(),
            album_id: album_id(&artist, "Album"),
            artist_id: artist,
            track_no: Some(1),
            ..SongDetails::default()
        }),
    }
}

pub(crate) fn video_record(catalog: CatalogId, path: &str, title: &str) -> MediaRecord {
    MediaRecord {
        id: 0,
        catalog_id: catalog,
        path: path.to_string(),
        size: 100,
        mtime: 1,
        added_at: 1,
        updated_at: 1,
        title: title.to_string(),
        play_count: 0,
        skip_count: 0,
        details: MediaDetails::Video(VideoDetails::default()),
    }
}
