//! Turns tag reads into record values.

use std::fs::Metadata;
use std::path::Path;
use std::time::UNIX_EPOCH;

use common::{
    album_id, artist_id, CatalogRoot, EpisodeDetails, MediaDetails, MediaKind, MediaRecord,
    SongDetails, VideoDetails,
};
use metadata::TagInfo;

use crate::pattern::{parse_pattern, PatternFields};

const UNKNOWN_ARTIST: &str = "Unknown Artist";
const UNKNOWN_ALBUM: &str = "Unknown Album";
const UNKNOWN_PODCAST: &str = "Unknown Podcast";

pub(crate) fn file_mtime(meta: &Metadata) -> u64 {
    meta.modified()
        .ok()
        .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
        .map(|since| since.as_secs())
        .unwrap_or(0)
}

/// Record for `file` (stored as `stored_path`) built from its tags, with
/// values parsed from the path filling whatever the tags lack.
pub(crate) fn build_record(
    catalog: &CatalogRoot,
    file: &Path,
    stored_path: &str,
    kind: MediaKind,
    tags: &TagInfo,
    meta: &Metadata,
    now: u64,
) -> MediaRecord {
    let fallback = parse_pattern(file, &catalog.sort_pattern, &catalog.rename_pattern);
    let title = tags
        .title
        .clone()
        .or_else(|| fallback.title.clone())
        .unwrap_or_else(|| file_stem(file));

    let details = match kind {
        MediaKind::Song => MediaDetails::Song(song_details(file, tags, &fallback)),
        MediaKind::Video => MediaDetails::Video(VideoDetails {
            duration_ms: tags.stream.duration_ms,
            bitrate: tags.stream.bitrate,
            year: tags.year.or(fallback.year),
            genres: tags.genres.clone(),
        }),
        MediaKind::PodcastEpisode => MediaDetails::PodcastEpisode(EpisodeDetails {
            podcast: tags
                .podcast
                .clone()
                .or_else(|| tags.album.clone())
                .or_else(|| parent_name(file))
                .unwrap_or_else(|| UNKNOWN_PODCAST.to_string()),
            duration_ms: tags.stream.duration_ms,
            year: tags.year.or(fallback.year),
            description: tags.comment.clone(),
        }),
    };

    MediaRecord {
        id: 0,
        catalog_id: catalog.id,
        path: stored_path.to_string(),
        size: meta.len(),
        mtime: file_mtime(meta),
        added_at: now,
        updated_at: now,
        title,
        play_count: 0,
        skip_count: 0,
        details,
    }
}

fn song_details(file: &Path, tags: &TagInfo, fallback: &PatternFields) -> SongDetails {
    let artist = tags
        .artist
        .clone()
        .or_else(|| fallback.artist.clone())
        .or_else(|| fallback.album_artist.clone())
        .unwrap_or_else(|| UNKNOWN_ARTIST.to_string());
    let album_artist = tags
        .album_artist
        .clone()
        .or_else(|| fallback.album_artist.clone())
        .unwrap_or_default();
    let album = tags
        .album
        .clone()
        .or_else(|| fallback.album.clone())
        .unwrap_or_else(|| UNKNOWN_ALBUM.to_string());

    let owner = if album_artist.is_empty() {
        &artist
    } else {
        &album_artist
    };
    let album_key = album_id(&artist_id(owner), &album);

    let mut genres = tags.genres.clone();
    if genres.is_empty() {
        genres.extend(fallback.genre.clone());
    }

    SongDetails {
        artist_id: artist_id(&artist),
        album_id: album_key,
        artist,
        album_artist,
        album,
        track_no: tags.track_no.or(fallback.track),
        disc_no: tags
            .disc_no
            .or(fallback.disc)
            .or_else(|| disc_from_folder(file)),
        year: tags.year.or(fallback.year),
        duration_ms: tags.stream.duration_ms,
        bitrate: tags.stream.bitrate,
        sample_rate: tags.stream.sample_rate,
        channels: tags.stream.channels,
        genres,
        comment: tags.comment.clone(),
    }
}

/// Values a song contributes to sort/rename patterns.
pub(crate) fn pattern_fields(record: &MediaRecord) -> Option<PatternFields> {
    let song = record.details.as_song()?;
    let album_artist = if song.album_artist.is_empty() {
        None
    } else {
        Some(song.album_artist.clone())
    };
    Some(PatternFields {
        artist: Some(song.artist.clone()),
        album: Some(song.album.clone()),
        album_artist,
        title: Some(record.title.clone()),
        track: song.track_no,
        disc: song.disc_no,
        year: song.year,
        genre: song.genres.first().cloned(),
    })
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "Unknown".to_string())
}

fn parent_name(path: &Path) -> Option<String> {
    path.parent()
        .and_then(|p| p.file_name())
        .map(|s| s.to_string_lossy().to_string())
}

const DISC_KEYWORDS: &[&str] = &["cd", "disc", "disk", "part", "side", "lp"];

/// Disc number from a parent folder named like `CD2` or `Disc 03`.
fn disc_from_folder(file: &Path) -> Option<u16> {
    let name = parent_name(file)?;
    let cleaned: String = name
        .chars()
        .map(|ch| match ch {
            '_' | '-' | '.' => ' ',
            other => other.to_ascii_lowercase(),
        })
        .collect();
    let cleaned = cleaned.trim();
    for keyword in DISC_KEYWORDS {
        if let Some(rest) = cleaned.strip_prefix(keyword) {
            let rest = rest.trim();
            if !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()) {
                return rest.parse().ok();
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::GatherType;
    use std::fs;

    fn catalog(sort: &str, rename: &str) -> CatalogRoot {
        CatalogRoot {
            id: 3,
            name: "main".to_string(),
            path: "/music".to_string(),
            gather_type: GatherType::Music,
            sort_pattern: sort.to_string(),
            rename_pattern: rename.to_string(),
            last_add: 0,
            last_update: 0,
            last_clean: 0,
        }
    }

    #[test]
    fn path_values_fill_missing_tags() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("Band").join("Live").join("04 - Encore.mp3");
        fs::create_dir_all(file.parent().unwrap()).unwrap();
        fs::write(&file, b"data").unwrap();
        let meta = fs::metadata(&file).unwrap();

        let tags = TagInfo {
            title: Some("Real Title".to_string()),
            ..TagInfo::default()
        };
        let record = build_record(
            &catalog("%a/%A", "%T - %t"),
            &file,
            "/stored",
            MediaKind::Song,
            &tags,
            &meta,
            77,
        );
        assert_eq!(record.title, "Real Title");
        assert_eq!(record.size, 4);
        assert_eq!(record.added_at, 77);
        let song = record.details.as_song().unwrap();
        assert_eq!(song.track_no, Some(4));
        assert_eq!(song.artist, "Band");
        assert_eq!(song.album, "Live");
        assert_eq!(song.disc_no, None);
    }

    #[test]
    fn bare_files_get_derived_values() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("Morning Show").join("ep1.mp3");
        fs::create_dir_all(file.parent().unwrap()).unwrap();
        fs::write(&file, b"x").unwrap();
        let meta = fs::metadata(&file).unwrap();

        let record = build_record(
            &catalog("", ""),
            &file,
            "/stored",
            MediaKind::PodcastEpisode,
            &TagInfo::default(),
            &meta,
            1,
        );
        assert_eq!(record.title, "ep1");
        match record.details {
            MediaDetails::PodcastEpisode(episode) => assert_eq!(episode.podcast, "Morning Show"),
            other => panic!("unexpected details {:?}", other),
        }
    }

    #[test]
    fn episode_show_and_stream_come_from_tags() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("downloads").join("ep2.mp3");
        fs::create_dir_all(file.parent().unwrap()).unwrap();
        fs::write(&file, b"x").unwrap();
        let meta = fs::metadata(&file).unwrap();
        let tags = TagInfo {
            podcast: Some("Night Talk".to_string()),
            album: Some("Season 1".to_string()),
            comment: Some("Guests".to_string()),
            stream: metadata::StreamInfo {
                duration_ms: 61_000,
                ..metadata::StreamInfo::default()
            },
            ..TagInfo::default()
        };
        let record = build_record(
            &catalog("", ""),
            &file,
            "/stored",
            MediaKind::PodcastEpisode,
            &tags,
            &meta,
            1,
        );
        match record.details {
            MediaDetails::PodcastEpisode(episode) => {
                assert_eq!(episode.podcast, "Night Talk");
                assert_eq!(episode.duration_ms, 61_000);
                assert_eq!(episode.description.as_deref(), Some("Guests"));
            }
            other => panic!("unexpected details {:?}", other),
        }
    }

    #[test]
    fn album_ids_follow_the_album_artist() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.mp3");
        fs::write(&file, b"x").unwrap();
        let meta = fs::metadata(&file).unwrap();
        let tags = TagInfo {
            artist: Some("Guest".to_string()),
            album_artist: Some("Band".to_string()),
            album: Some("Live".to_string()),
            ..TagInfo::default()
        };
        let record = build_record(&catalog("", ""), &file, "/a", MediaKind::Song, &tags, &meta, 1);
        let song = record.details.as_song().unwrap();
        assert_eq!(song.album_id, album_id(&artist_id("Band"), "Live"));
        assert_eq!(song.artist_id, artist_id("Guest"));
    }

    #[test]
    fn disc_folders_are_recognized() {
        assert_eq!(disc_from_folder(Path::new("/m/a/CD2/x.mp3")), Some(2));
        assert_eq!(disc_from_folder(Path::new("/m/a/Disc_03/x.mp3")), Some(3));
        assert_eq!(disc_from_folder(Path::new("/m/a/Extras/x.mp3")), None);
    }
}
