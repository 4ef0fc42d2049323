use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

pub type CatalogId = u32;
pub type RecordId = u64;

const KEY_SEP: char = '\x1f';

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatherType {
    Music,
    Video,
    Podcast,
}

impl GatherType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GatherType::Music => "music",
            GatherType::Video => "video",
            GatherType::Podcast => "podcast",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "music" => Some(GatherType::Music),
            "video" => Some(GatherType::Video),
            "podcast" => Some(GatherType::Podcast),
            _ => None,
        }
    }
}

/// One configured filesystem root tracked as a unit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CatalogRoot {
    pub id: CatalogId,
    pub name: String,
    pub path: String,
    pub gather_type: GatherType,
    pub sort_pattern: String,
    pub rename_pattern: String,
    pub last_add: u64,
    pub last_update: u64,
    pub last_clean: u64,
}

impl CatalogRoot {
    pub fn root(&self) -> &Path {
        Path::new(&self.path)
    }

    /// Path of `file` relative to the catalog root, or the input unchanged
    /// when it lives elsewhere.
    pub fn relative_path(&self, file: &str) -> String {
        relpath_from(self.root(), Path::new(file)).unwrap_or_else(|| file.to_string())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewCatalog {
    pub name: String,
    pub path: String,
    pub gather_type: GatherType,
    pub sort_pattern: String,
    pub rename_pattern: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Song,
    Video,
    PodcastEpisode,
}

impl MediaKind {
    /// Order in which bulk passes visit the media tables.
    pub const ALL: [MediaKind; 3] = [MediaKind::Video, MediaKind::Song, MediaKind::PodcastEpisode];

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Song => "song",
            MediaKind::Video => "video",
            MediaKind::PodcastEpisode => "podcast_episode",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "song" => Some(MediaKind::Song),
            "video" => Some(MediaKind::Video),
            "podcast_episode" | "podcast" | "episode" => Some(MediaKind::PodcastEpisode),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MediaRecord {
    pub id: RecordId,
    pub catalog_id: CatalogId,
    pub path: String,
    pub size: u64,
    pub mtime: u64,
    pub added_at: u64,
    pub updated_at: u64,
    pub title: String,
    pub play_count: u32,
    pub skip_count: u32,
    pub details: MediaDetails,
}

impl MediaRecord {
    pub fn kind(&self) -> MediaKind {
        self.details.kind()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaDetails {
    Song(SongDetails),
    Video(VideoDetails),
    PodcastEpisode(EpisodeDetails),
}

impl MediaDetails {
    pub fn kind(&self) -> MediaKind {
        match self {
            MediaDetails::Song(_) => MediaKind::Song,
            MediaDetails::Video(_) => MediaKind::Video,
            MediaDetails::PodcastEpisode(_) => MediaKind::PodcastEpisode,
        }
    }

    pub fn as_song(&self) -> Option<&SongDetails> {
        match self {
            MediaDetails::Song(song) => Some(song),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SongDetails {
    pub artist: String,
    pub album_artist: String,
    pub album: String,
    pub artist_id: String,
    pub album_id: String,
    pub track_no: Option<u16>,
    pub disc_no: Option<u16>,
    pub year: Option<i32>,
    pub duration_ms: u32,
    pub bitrate: Option<u32>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u8>,
    pub genres: Vec<String>,
    pub comment: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoDetails {
    pub duration_ms: u32,
    pub bitrate: Option<u32>,
    pub year: Option<i32>,
    pub genres: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EpisodeDetails {
    pub podcast: String,
    pub duration_ms: u32,
    pub year: Option<i32>,
    pub description: Option<String>,
}

/// Tombstone left behind when a record is removed from the index.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeletedRecord {
    pub id: RecordId,
    pub catalog_id: CatalogId,
    pub kind: MediaKind,
    pub path: String,
    pub title: String,
    pub added_at: u64,
    pub deleted_at: u64,
    pub play_count: u32,
    pub skip_count: u32,
    pub album_id: Option<String>,
    pub artist_id: Option<String>,
    pub podcast: Option<String>,
}

impl DeletedRecord {
    pub fn from_record(record: &MediaRecord, deleted_at: u64) -> Self {
        let (album_id, artist_id, podcast) = match &record.details {
            MediaDetails::Song(song) => (
                Some(song.album_id.clone()),
                Some(song.artist_id.clone()),
                None,
            ),
            MediaDetails::Video(_) => (None, None, None),
            MediaDetails::PodcastEpisode(episode) => (None, None, Some(episode.podcast.clone())),
        };
        Self {
            id: record.id,
            catalog_id: record.catalog_id,
            kind: record.kind(),
            path: record.path.clone(),
            title: record.title.clone(),
            added_at: record.added_at,
            deleted_at,
            play_count: record.play_count,
            skip_count: record.skip_count,
            album_id,
            artist_id,
            podcast,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Artist {
    pub id: String,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Album {
    pub id: String,
    pub artist_id: String,
    pub title: String,
    pub year: Option<i32>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoverRef {
    Embedded { record_id: RecordId },
    File { path: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CoverOwner {
    Album(String),
    Video(RecordId),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Playlist {
    pub id: String,
    pub catalog_id: CatalogId,
    pub name: String,
    pub source_path: String,
    pub public: bool,
    pub items: Vec<RecordId>,
}

/// Normalized (artist, album, track, title) tuple used to spot the same
/// content indexed under a different path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DuplicateKey {
    pub artist: String,
    pub album: String,
    pub track: Option<u16>,
    pub title: String,
}

impl DuplicateKey {
    pub fn new(artist: &str, album: &str, track: Option<u16>, title: &str) -> Self {
        Self {
            artist: normalize_key_part(artist),
            album: normalize_key_part(album),
            track,
            title: normalize_key_part(title),
        }
    }

    pub fn from_song(title: &str, song: &SongDetails) -> Self {
        Self::new(&song.artist, &song.album, song.track_no, title)
    }

    pub fn fingerprint(&self) -> String {
        let track = self.track.map(|t| t.to_string()).unwrap_or_default();
        let mut joined = String::new();
        for part in [&self.artist, &self.album, &track, &self.title] {
            joined.push_str(part);
            joined.push(KEY_SEP);
        }
        stable_id(&joined)
    }
}

fn normalize_key_part(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

pub fn stable_id(input: &str) -> String {
    blake3::hash(input.as_bytes()).to_hex().to_string()
}

pub fn artist_id(name: &str) -> String {
    stable_id(&name.trim().to_lowercase())
}

pub fn album_id(artist_id: &str, title: &str) -> String {
    let mut key = String::from(artist_id);
    key.push(KEY_SEP);
    key.push_str(&title.trim().to_lowercase());
    stable_id(&key)
}

/// Key used for case-insensitive path comparisons on the indexing side.
pub fn casefold_path(path: &str) -> String {
    path.to_lowercase()
}

/// Trims surrounding whitespace and trailing separators, keeping a bare
/// root (`/`) intact.
pub fn normalize_root(path: &str) -> String {
    let trimmed = path.trim();
    let stripped = trimmed.trim_end_matches(&['/', '\\'][..]);
    if stripped.is_empty() && !trimmed.is_empty() {
        return trimmed[..1].to_string();
    }
    stripped.to_string()
}

/// True when one path equals or contains the other, compared by component.
pub fn paths_overlap(a: &Path, b: &Path) -> bool {
    let a = lexical_normalize(a);
    let b = lexical_normalize(b);
    a.starts_with(&b) || b.starts_with(&a)
}

fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

pub fn relpath_from(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    Some(path_to_slash_string(rel))
}

pub fn join_relpath(root: &Path, relpath: &str) -> PathBuf {
    let mut out = PathBuf::from(root);
    for part in relpath.split('/') {
        if part.is_empty() {
            continue;
        }
        out.push(part);
    }
    out
}

fn path_to_slash_string(path: &Path) -> String {
    let parts: Vec<String> = path
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect();
    parts.join("/")
}
