use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use common::{
    casefold_path, Album, Artist, CatalogId, CatalogRoot, CoverOwner, CoverRef, DeletedRecord,
    DuplicateKey, MediaKind, MediaRecord, NewCatalog, Playlist, RecordId, SongDetails,
};
use redb::{Database, ReadableTable, Table, TableDefinition};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{CatalogError, Result};
use crate::store::{CatalogMarker, CatalogStats, GcStats, IndexStore, RecordChanges};

const INDEX_VERSION: u32 = 1;
const KEY_SEP: char = '\x1f';

const META_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("meta");
const CATALOGS_TABLE: TableDefinition<u32, &[u8]> = TableDefinition::new("catalogs");
const RECORDS_TABLE: TableDefinition<u64, &[u8]> = TableDefinition::new("records");
const CATALOG_RECORDS_TABLE: TableDefinition<&str, u64> =
    TableDefinition::new("catalog_records");
const RECORD_PATHS_TABLE: TableDefinition<&str, u64> = TableDefinition::new("record_paths");
const DUPLICATES_TABLE: TableDefinition<&str, u64> = TableDefinition::new("duplicates");
const DELETED_TABLE: TableDefinition<u64, &[u8]> = TableDefinition::new("deleted");
const ARTISTS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("artists");
const ALBUMS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("albums");
const RATINGS_TABLE: TableDefinition<&str, u8> = TableDefinition::new("ratings");
const PLAYLISTS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("playlists");
const COVERS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("covers");

const META_VERSION_KEY: &str = "version";
const META_NEXT_CATALOG_KEY: &str = "next_catalog";
const META_NEXT_RECORD_KEY: &str = "next_record";

/// `IndexStore` backed by a single redb database file.
#[derive(Clone)]
pub struct RedbStore {
    db: Arc<Database>,
}

impl RedbStore {
    pub fn open(path: &Path) -> Result<Self> {
        let db = open_or_create_db(path)?;
        let store = Self { db: Arc::new(db) };
        store.init_tables()?;
        Ok(store)
    }

    fn init_tables(&self) -> Result<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut meta = write_txn.open_table(META_TABLE)?;
            let _ = write_txn.open_table(CATALOGS_TABLE)?;
            let _ = write_txn.open_table(RECORDS_TABLE)?;
            let _ = write_txn.open_table(CATALOG_RECORDS_TABLE)?;
            let _ = write_txn.open_table(RECORD_PATHS_TABLE)?;
            let _ = write_txn.open_table(DUPLICATES_TABLE)?;
            let _ = write_txn.open_table(DELETED_TABLE)?;
            let _ = write_txn.open_table(ARTISTS_TABLE)?;
            let _ = write_txn.open_table(ALBUMS_TABLE)?;
            let _ = write_txn.open_table(RATINGS_TABLE)?;
            let _ = write_txn.open_table(PLAYLISTS_TABLE)?;
            let _ = write_txn.open_table(COVERS_TABLE)?;

            let version: Option<u32> = match meta.get(META_VERSION_KEY)? {
                Some(value) => Some(decode_value(value.value())?),
                None => None,
            };
            match version {
                Some(found) if found != INDEX_VERSION => {
                    return Err(CatalogError::VersionMismatch(found));
                }
                Some(_) => {}
                None => {
                    let bytes = encode_value(&INDEX_VERSION)?;
                    meta.insert(META_VERSION_KEY, bytes.as_slice())?;
                    info!("Initialized index schema version {}", INDEX_VERSION);
                }
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    fn put_catalog(&self, catalog: &CatalogRoot) -> Result<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(CATALOGS_TABLE)?;
            let bytes = encode_value(catalog)?;
            table.insert(catalog.id, bytes.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }
}

impl IndexStore for RedbStore {
    fn create_catalog(&self, catalog: NewCatalog) -> Result<CatalogRoot> {
        let write_txn = self.db.begin_write()?;
        let created = {
            let mut meta = write_txn.open_table(META_TABLE)?;
            let mut table = write_txn.open_table(CATALOGS_TABLE)?;
            let next = take_next_id(&mut meta, META_NEXT_CATALOG_KEY)?;
            let id = CatalogId::try_from(next).map_err(|_| CatalogError::IdOverflow(next))?;
            let root = CatalogRoot {
                id,
                name: catalog.name,
                path: catalog.path,
                gather_type: catalog.gather_type,
                sort_pattern: catalog.sort_pattern,
                rename_pattern: catalog.rename_pattern,
                last_add: 0,
                last_update: 0,
                last_clean: 0,
            };
            let bytes = encode_value(&root)?;
            table.insert(id, bytes.as_slice())?;
            root
        };
        write_txn.commit()?;
        Ok(created)
    }

    fn get_catalog(&self, id: CatalogId) -> Result<Option<CatalogRoot>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(CATALOGS_TABLE)?;
        let catalog = match table.get(id)? {
            Some(value) => Some(decode_value(value.value())?),
            None => None,
        };
        Ok(catalog)
    }

    fn list_catalogs(&self) -> Result<Vec<CatalogRoot>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(CATALOGS_TABLE)?;
        let mut items = Vec::new();
        for entry in table.iter()? {
            let entry = entry?;
            let catalog: CatalogRoot = decode_value(entry.1.value())?;
            items.push(catalog);
        }
        Ok(items)
    }

    fn touch_catalog(&self, id: CatalogId, marker: CatalogMarker, at: u64) -> Result<()> {
        let mut catalog = self
            .get_catalog(id)?
            .ok_or(CatalogError::CatalogNotFound(id))?;
        match marker {
            CatalogMarker::Add => catalog.last_add = at,
            CatalogMarker::Update => catalog.last_update = at,
            CatalogMarker::Clean => catalog.last_clean = at,
        }
        self.put_catalog(&catalog)
    }

    fn relocate_catalog(&self, id: CatalogId, new_root: &str) -> Result<CatalogRoot> {
        let write_txn = self.db.begin_write()?;
        let (catalog, moved) = {
            let mut catalogs = write_txn.open_table(CATALOGS_TABLE)?;
            let mut records = write_txn.open_table(RECORDS_TABLE)?;
            let index = write_txn.open_table(CATALOG_RECORDS_TABLE)?;
            let mut paths = write_txn.open_table(RECORD_PATHS_TABLE)?;

            let mut catalog: CatalogRoot = match catalogs.get(id)? {
                Some(value) => decode_value(value.value())?,
                None => return Err(CatalogError::CatalogNotFound(id)),
            };
            let old_root = catalog.path.clone();

            let prefix = catalog_prefix(id);
            let end = range_end(&prefix);
            let mut ids = Vec::new();
            for entry in index.range(prefix.as_str()..end.as_str())? {
                let entry = entry?;
                ids.push(entry.1.value());
            }

            let mut moved = 0usize;
            for record_id in ids {
                let mut record: MediaRecord = match records.get(record_id)? {
                    Some(value) => decode_value(value.value())?,
                    None => continue,
                };
                let rest = match strip_root(&record.path, &old_root) {
                    Some(rest) => rest.to_string(),
                    None => continue,
                };
                paths.remove(path_key(id, &record.path).as_str())?;
                record.path = rejoin_root(new_root, &rest);
                paths.insert(path_key(id, &record.path).as_str(), record_id)?;
                let bytes = encode_value(&record)?;
                records.insert(record_id, bytes.as_slice())?;
                moved += 1;
            }

            catalog.path = new_root.to_string();
            let bytes = encode_value(&catalog)?;
            catalogs.insert(id, bytes.as_slice())?;
            (catalog, moved)
        };
        write_txn.commit()?;
        info!(
            "Relocated catalog {} to {} ({} records)",
            catalog.id, catalog.path, moved
        );
        Ok(catalog)
    }

    fn records_by_catalog(
        &self,
        catalog: CatalogId,
        kind: MediaKind,
        after: Option<RecordId>,
        limit: usize,
    ) -> Result<Vec<MediaRecord>> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(CATALOG_RECORDS_TABLE)?;
        let records = read_txn.open_table(RECORDS_TABLE)?;

        let prefix = kind_prefix(catalog, kind);
        let start = match after {
            Some(id) => catalog_record_key(catalog, kind, id.saturating_add(1)),
            None => prefix.clone(),
        };
        let end = range_end(&prefix);

        let mut items = Vec::new();
        for entry in index.range(start.as_str()..end.as_str())? {
            if items.len() >= limit {
                break;
            }
            let entry = entry?;
            if let Some(value) = records.get(entry.1.value())? {
                let record: MediaRecord = decode_value(value.value())?;
                items.push(record);
            }
        }
        Ok(items)
    }

    fn get_record(&self, id: RecordId) -> Result<Option<MediaRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(RECORDS_TABLE)?;
        let record = match table.get(id)? {
            Some(value) => Some(decode_value(value.value())?),
            None => None,
        };
        Ok(record)
    }

    fn find_by_path(&self, catalog: CatalogId, path: &str) -> Result<Option<MediaRecord>> {
        let read_txn = self.db.begin_read()?;
        let paths = read_txn.open_table(RECORD_PATHS_TABLE)?;
        let records = read_txn.open_table(RECORDS_TABLE)?;
        let id = match paths.get(path_key(catalog, path).as_str())? {
            Some(value) => value.value(),
            None => return Ok(None),
        };
        let record = match records.get(id)? {
            Some(value) => Some(decode_value(value.value())?),
            None => None,
        };
        Ok(record)
    }

    fn find_duplicate(&self, key: &DuplicateKey) -> Result<Option<RecordId>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(DUPLICATES_TABLE)?;
        let prefix = prefix_key(&key.fingerprint());
        let end = range_end(&prefix);
        let mut range = table.range(prefix.as_str()..end.as_str())?;
        let found = match range.next() {
            Some(entry) => Some(entry?.1.value()),
            None => None,
        };
        Ok(found)
    }

    fn insert_record(&self, mut record: MediaRecord) -> Result<RecordId> {
        let write_txn = self.db.begin_write()?;
        let id = {
            let mut meta = write_txn.open_table(META_TABLE)?;
            let mut records = write_txn.open_table(RECORDS_TABLE)?;
            let mut index = write_txn.open_table(CATALOG_RECORDS_TABLE)?;
            let mut paths = write_txn.open_table(RECORD_PATHS_TABLE)?;
            let mut duplicates = write_txn.open_table(DUPLICATES_TABLE)?;
            let mut artists = write_txn.open_table(ARTISTS_TABLE)?;
            let mut albums = write_txn.open_table(ALBUMS_TABLE)?;

            let key = path_key(record.catalog_id, &record.path);
            if paths.get(key.as_str())?.is_some() {
                return Err(CatalogError::DuplicatePath(record.path));
            }

            let id = take_next_id(&mut meta, META_NEXT_RECORD_KEY)?;
            record.id = id;
            let bytes = encode_value(&record)?;
            records.insert(id, bytes.as_slice())?;
            index.insert(
                catalog_record_key(record.catalog_id, record.kind(), id).as_str(),
                id,
            )?;
            paths.insert(key.as_str(), id)?;
            if let Some(song) = record.details.as_song() {
                duplicates.insert(duplicate_entry_key(&record.title, song, id).as_str(), id)?;
                upsert_song_links(&mut artists, &mut albums, song)?;
            }
            id
        };
        write_txn.commit()?;
        Ok(id)
    }

    fn update_record(
        &self,
        id: RecordId,
        changes: &RecordChanges,
        updated_at: u64,
    ) -> Result<bool> {
        let write_txn = self.db.begin_write()?;
        {
            let mut records = write_txn.open_table(RECORDS_TABLE)?;
            let mut duplicates = write_txn.open_table(DUPLICATES_TABLE)?;
            let mut artists = write_txn.open_table(ARTISTS_TABLE)?;
            let mut albums = write_txn.open_table(ALBUMS_TABLE)?;

            let mut record: MediaRecord = match records.get(id)? {
                Some(value) => decode_value(value.value())?,
                None => return Ok(false),
            };
            if let Some(song) = record.details.as_song() {
                duplicates.remove(duplicate_entry_key(&record.title, song, id).as_str())?;
            }
            changes.apply(&mut record);
            record.updated_at = updated_at;
            if let Some(song) = record.details.as_song() {
                duplicates.insert(duplicate_entry_key(&record.title, song, id).as_str(), id)?;
                upsert_song_links(&mut artists, &mut albums, song)?;
            }
            let bytes = encode_value(&record)?;
            records.insert(id, bytes.as_slice())?;
        }
        write_txn.commit()?;
        Ok(true)
    }

    fn delete_records(&self, ids: &[RecordId]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let write_txn = self.db.begin_write()?;
        let removed = {
            let mut records = write_txn.open_table(RECORDS_TABLE)?;
            let mut index = write_txn.open_table(CATALOG_RECORDS_TABLE)?;
            let mut paths = write_txn.open_table(RECORD_PATHS_TABLE)?;
            let mut duplicates = write_txn.open_table(DUPLICATES_TABLE)?;

            let mut removed = 0usize;
            for id in ids {
                let record: MediaRecord = match records.get(*id)? {
                    Some(value) => decode_value(value.value())?,
                    None => continue,
                };
                records.remove(*id)?;
                index.remove(catalog_record_key(record.catalog_id, record.kind(), *id).as_str())?;
                paths.remove(path_key(record.catalog_id, &record.path).as_str())?;
                if let Some(song) = record.details.as_song() {
                    duplicates.remove(duplicate_entry_key(&record.title, song, *id).as_str())?;
                }
                removed += 1;
            }
            removed
        };
        write_txn.commit()?;
        Ok(removed)
    }

    fn archive_deleted(&self, records: &[MediaRecord], deleted_at: u64) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(DELETED_TABLE)?;
            for record in records {
                let tombstone = DeletedRecord::from_record(record, deleted_at);
                let bytes = encode_value(&tombstone)?;
                table.insert(record.id, bytes.as_slice())?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    fn get_deleted(&self, id: RecordId) -> Result<Option<DeletedRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(DELETED_TABLE)?;
        let deleted = match table.get(id)? {
            Some(value) => Some(decode_value(value.value())?),
            None => None,
        };
        Ok(deleted)
    }

    fn stats_by_catalog(&self, catalog: CatalogId) -> Result<CatalogStats> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(CATALOG_RECORDS_TABLE)?;
        let mut stats = CatalogStats::default();
        for kind in MediaKind::ALL {
            let prefix = kind_prefix(catalog, kind);
            let end = range_end(&prefix);
            let mut count = 0usize;
            for entry in index.range(prefix.as_str()..end.as_str())? {
                entry?;
                count += 1;
            }
            match kind {
                MediaKind::Song => stats.songs = count,
                MediaKind::Video => stats.videos = count,
                MediaKind::PodcastEpisode => stats.episodes = count,
            }
        }
        Ok(stats)
    }

    fn get_artist(&self, id: &str) -> Result<Option<Artist>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ARTISTS_TABLE)?;
        let artist = match table.get(id)? {
            Some(value) => Some(decode_value(value.value())?),
            None => None,
        };
        Ok(artist)
    }

    fn get_album(&self, id: &str) -> Result<Option<Album>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ALBUMS_TABLE)?;
        let album = match table.get(id)? {
            Some(value) => Some(decode_value(value.value())?),
            None => None,
        };
        Ok(album)
    }

    fn set_rating(&self, record: RecordId, user: &str, rating: u8) -> Result<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(RATINGS_TABLE)?;
            table.insert(rating_key(record, user).as_str(), rating.min(5))?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn ratings_for(&self, record: RecordId) -> Result<Vec<(String, u8)>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(RATINGS_TABLE)?;
        let prefix = prefix_key(&format!("{:020}", record));
        let end = range_end(&prefix);
        let mut items = Vec::new();
        for entry in table.range(prefix.as_str()..end.as_str())? {
            let entry = entry?;
            let (_, user) = split_key_last(entry.0.value())?;
            items.push((user.to_string(), entry.1.value()));
        }
        Ok(items)
    }

    fn save_playlist(&self, playlist: &Playlist) -> Result<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(PLAYLISTS_TABLE)?;
            let bytes = encode_value(playlist)?;
            table.insert(playlist.id.as_str(), bytes.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn get_playlist(&self, id: &str) -> Result<Option<Playlist>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PLAYLISTS_TABLE)?;
        let playlist = match table.get(id)? {
            Some(value) => Some(decode_value(value.value())?),
            None => None,
        };
        Ok(playlist)
    }

    fn set_cover(&self, owner: &CoverOwner, cover: &CoverRef) -> Result<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(COVERS_TABLE)?;
            let bytes = encode_value(cover)?;
            table.insert(cover_key(owner).as_str(), bytes.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn get_cover(&self, owner: &CoverOwner) -> Result<Option<CoverRef>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(COVERS_TABLE)?;
        let cover = match table.get(cover_key(owner).as_str())? {
            Some(value) => Some(decode_value(value.value())?),
            None => None,
        };
        Ok(cover)
    }

    fn collect_garbage(&self) -> Result<GcStats> {
        let write_txn = self.db.begin_write()?;
        let stats = {
            let records = write_txn.open_table(RECORDS_TABLE)?;
            let mut albums = write_txn.open_table(ALBUMS_TABLE)?;
            let mut artists = write_txn.open_table(ARTISTS_TABLE)?;
            let mut ratings = write_txn.open_table(RATINGS_TABLE)?;
            let mut covers = write_txn.open_table(COVERS_TABLE)?;

            let mut live_records = HashSet::new();
            let mut live_albums = HashSet::new();
            let mut live_artists = HashSet::new();
            for entry in records.iter()? {
                let entry = entry?;
                live_records.insert(entry.0.value());
                let record: MediaRecord = decode_value(entry.1.value())?;
                if let Some(song) = record.details.as_song() {
                    live_albums.insert(song.album_id.clone());
                    live_artists.insert(song.artist_id.clone());
                }
            }

            let mut dead_albums = Vec::new();
            for entry in albums.iter()? {
                let entry = entry?;
                let id = entry.0.value().to_string();
                if live_albums.contains(&id) {
                    let album: Album = decode_value(entry.1.value())?;
                    live_artists.insert(album.artist_id);
                } else {
                    dead_albums.push(id);
                }
            }
            for id in &dead_albums {
                albums.remove(id.as_str())?;
            }

            let mut dead_artists = Vec::new();
            for entry in artists.iter()? {
                let entry = entry?;
                let id = entry.0.value();
                if !live_artists.contains(id) {
                    dead_artists.push(id.to_string());
                }
            }
            for id in &dead_artists {
                artists.remove(id.as_str())?;
            }

            let mut dead_ratings = Vec::new();
            for entry in ratings.iter()? {
                let entry = entry?;
                let key = entry.0.value();
                let (record, _) = split_key_last(key)?;
                let record: RecordId = record
                    .parse()
                    .map_err(|_| CatalogError::KeyParse(key.to_string()))?;
                if !live_records.contains(&record) {
                    dead_ratings.push(key.to_string());
                }
            }
            for key in &dead_ratings {
                ratings.remove(key.as_str())?;
            }

            let mut dead_covers = Vec::new();
            for entry in covers.iter()? {
                let entry = entry?;
                let key = entry.0.value();
                let live = match parse_cover_key(key)? {
                    CoverOwner::Album(id) => live_albums.contains(&id),
                    CoverOwner::Video(id) => live_records.contains(&id),
                };
                if !live {
                    dead_covers.push(key.to_string());
                }
            }
            for key in &dead_covers {
                covers.remove(key.as_str())?;
            }

            GcStats {
                albums: dead_albums.len(),
                artists: dead_artists.len(),
                ratings: dead_ratings.len(),
                covers: dead_covers.len(),
            }
        };
        write_txn.commit()?;
        Ok(stats)
    }
}

fn open_or_create_db(path: &Path) -> Result<Database> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    if path.exists() {
        Ok(Database::open(path)?)
    } else {
        Ok(Database::create(path)?)
    }
}

fn take_next_id(meta: &mut Table<&str, &[u8]>, key: &str) -> Result<u64> {
    let current: u64 = match meta.get(key)? {
        Some(value) => decode_value(value.value())?,
        None => 1,
    };
    let bytes = encode_value(&(current + 1))?;
    meta.insert(key, bytes.as_slice())?;
    Ok(current)
}

fn upsert_song_links(
    artists: &mut Table<&str, &[u8]>,
    albums: &mut Table<&str, &[u8]>,
    song: &SongDetails,
) -> Result<()> {
    let artist = Artist {
        id: song.artist_id.clone(),
        name: song.artist.clone(),
    };
    let bytes = encode_value(&artist)?;
    artists.insert(artist.id.as_str(), bytes.as_slice())?;

    let album_artist_name = if song.album_artist.is_empty() {
        &song.artist
    } else {
        &song.album_artist
    };
    let album_artist_id = common::artist_id(album_artist_name);
    if album_artist_id != artist.id {
        let owner = Artist {
            id: album_artist_id.clone(),
            name: album_artist_name.clone(),
        };
        let bytes = encode_value(&owner)?;
        artists.insert(owner.id.as_str(), bytes.as_slice())?;
    }

    let existing_year = match albums.get(song.album_id.as_str())? {
        Some(value) => decode_value::<Album>(value.value())?.year,
        None => None,
    };
    let album = Album {
        id: song.album_id.clone(),
        artist_id: album_artist_id,
        title: song.album.clone(),
        year: existing_year.or(song.year),
    };
    let bytes = encode_value(&album)?;
    albums.insert(album.id.as_str(), bytes.as_slice())?;
    Ok(())
}

const SEPARATORS: &[char] = &['/', '\\'];

/// Remainder of `path` below `root`, without a leading separator.
fn strip_root<'a>(path: &'a str, root: &str) -> Option<&'a str> {
    let rest = path.strip_prefix(root)?;
    if rest.is_empty() || root.ends_with(SEPARATORS) {
        return Some(rest);
    }
    rest.strip_prefix(SEPARATORS)
}

fn rejoin_root(root: &str, rest: &str) -> String {
    if rest.is_empty() {
        root.to_string()
    } else if root.ends_with(SEPARATORS) {
        format!("{}{}", root, rest)
    } else {
        format!("{}/{}", root, rest)
    }
}

fn catalog_prefix(catalog: CatalogId) -> String {
    prefix_key(&format!("{:010}", catalog))
}

fn kind_prefix(catalog: CatalogId, kind: MediaKind) -> String {
    let mut out = catalog_prefix(catalog);
    out.push_str(kind.as_str());
    out.push(KEY_SEP);
    out
}

fn catalog_record_key(catalog: CatalogId, kind: MediaKind, id: RecordId) -> String {
    format!("{}{:020}", kind_prefix(catalog, kind), id)
}

fn path_key(catalog: CatalogId, path: &str) -> String {
    let mut out = catalog_prefix(catalog);
    out.push_str(&casefold_path(path));
    out
}

fn duplicate_entry_key(title: &str, song: &SongDetails, id: RecordId) -> String {
    let fingerprint = DuplicateKey::from_song(title, song).fingerprint();
    format!("{}{:020}", prefix_key(&fingerprint), id)
}

fn rating_key(record: RecordId, user: &str) -> String {
    format!("{}{}", prefix_key(&format!("{:020}", record)), user)
}

fn cover_key(owner: &CoverOwner) -> String {
    match owner {
        CoverOwner::Album(id) => format!("album{}{}", KEY_SEP, id),
        CoverOwner::Video(id) => format!("video{}{:020}", KEY_SEP, id),
    }
}

fn parse_cover_key(key: &str) -> Result<CoverOwner> {
    let parse_error = || CatalogError::KeyParse(key.to_string());
    let (kind, id) = key.split_once(KEY_SEP).ok_or_else(parse_error)?;
    match kind {
        "album" => Ok(CoverOwner::Album(id.to_string())),
        "video" => Ok(CoverOwner::Video(id.parse().map_err(|_| parse_error())?)),
        _ => Err(parse_error()),
    }
}

fn prefix_key(prefix: &str) -> String {
    let mut out = String::new();
    out.push_str(prefix);
    out.push(KEY_SEP);
    out
}

fn range_end(prefix: &str) -> String {
    let mut end = prefix.to_string();
    end.push('\u{10ffff}');
    end
}

fn split_key_last(value: &str) -> Result<(&str, &str)> {
    let idx = value
        .rfind(KEY_SEP)
        .ok_or_else(|| CatalogError::KeyParse(value.to_string()))?;
    let next = idx + KEY_SEP.len_utf8();
    Ok((&value[..idx], &value[next..]))
}

fn encode_value<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(bincode::serialize(value)?)
}

fn decode_value<T: for<'de> Deserialize<'de>>(bytes: &[u8]) -> Result<T> {
    Ok(bincode::deserialize(bytes)?)
}
