//! Tag extraction for catalog media.

use std::path::Path;

use common::MediaKind;
use lofty::error::{ErrorKind, LoftyError};
use lofty::file::TaggedFile;
use lofty::picture::{Picture, PictureType};
use lofty::prelude::{AudioFile, ItemKey, TaggedFileExt};
use lofty::probe::Probe;
use lofty::tag::Tag;

/// Fields read from a file's tags and stream headers.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TagInfo {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album_artist: Option<String>,
    pub album: Option<String>,
    pub track_no: Option<u16>,
    pub disc_no: Option<u16>,
    pub year: Option<i32>,
    pub genres: Vec<String>,
    pub comment: Option<String>,
    /// Show name for podcast episodes.
    pub podcast: Option<String>,
    pub ratings: Vec<TagRating>,
    pub stream: StreamInfo,
    pub has_embedded_cover: bool,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StreamInfo {
    pub duration_ms: u32,
    pub bitrate: Option<u32>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u8>,
}

/// A rating found in the file's tags, on a 0..=5 scale. `user` is `None`
/// for a bare value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRating {
    pub user: Option<String>,
    pub rating: u8,
}

#[derive(Debug, Clone)]
pub struct CoverArt {
    pub data: Vec<u8>,
    pub mime: Option<String>,
}

#[derive(Debug)]
pub enum MetadataError {
    Io(std::io::Error),
    Lofty(LoftyError),
    Panic(String),
}

impl std::fmt::Display for MetadataError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetadataError::Io(err) => write!(f, "io error: {}", err),
            MetadataError::Lofty(err) => write!(f, "tag error: {}", err),
            MetadataError::Panic(message) => write!(f, "tag reader panicked: {}", message),
        }
    }
}

impl std::error::Error for MetadataError {}

impl From<std::io::Error> for MetadataError {
    fn from(err: std::io::Error) -> Self {
        MetadataError::Io(err)
    }
}

impl From<LoftyError> for MetadataError {
    fn from(err: LoftyError) -> Self {
        MetadataError::Lofty(err)
    }
}

/// Reads tag fields and embedded pictures from media files.
pub trait MetadataExtractor: Send + Sync {
    fn extract(&self, path: &Path, kind: MediaKind) -> Result<TagInfo, MetadataError>;

    fn cover(&self, path: &Path) -> Result<Option<CoverArt>, MetadataError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LoftyExtractor;

impl LoftyExtractor {
    /// `None` for containers lofty can not parse.
    fn open(path: &Path) -> Result<Option<TaggedFile>, MetadataError> {
        let probe = Probe::open(path)?.guess_file_type()?;
        if probe.file_type().is_none() {
            return Ok(None);
        }
        Ok(Some(probe.read()?))
    }
}

impl MetadataExtractor for LoftyExtractor {
    fn extract(&self, path: &Path, kind: MediaKind) -> Result<TagInfo, MetadataError> {
        let file = match Self::open(path)? {
            Some(file) => file,
            // Most video containers carry no tags lofty understands.
            None if kind == MediaKind::Video => return Ok(TagInfo::default()),
            None => return Err(LoftyError::new(ErrorKind::UnknownFormat).into()),
        };

        let mut info = TagInfo {
            stream: stream_info(&file),
            ..TagInfo::default()
        };
        let tag = match file.primary_tag().or_else(|| file.first_tag()) {
            Some(tag) => tag,
            None => return Ok(info),
        };

        info.title = text(tag, &ItemKey::TrackTitle);
        info.album = text(tag, &ItemKey::AlbumTitle);
        info.album_artist = text(tag, &ItemKey::AlbumArtist);
        info.artist = text(tag, &ItemKey::TrackArtist).or_else(|| info.album_artist.clone());
        info.track_no = tag.get_string(&ItemKey::TrackNumber).and_then(parse_position);
        info.disc_no = tag.get_string(&ItemKey::DiscNumber).and_then(parse_position);
        info.year = tag
            .get_string(&ItemKey::RecordingDate)
            .or_else(|| tag.get_string(&ItemKey::Year))
            .and_then(parse_year);
        info.genres = tag.get_strings(&ItemKey::Genre).flat_map(parse_genres).collect();
        info.ratings = tag
            .get_strings(&ItemKey::Popularimeter)
            .flat_map(parse_ratings)
            .collect();
        info.has_embedded_cover = !tag.pictures().is_empty();

        if kind == MediaKind::PodcastEpisode {
            info.podcast = info.album.clone();
            info.comment = text(tag, &ItemKey::PodcastDescription)
                .or_else(|| text(tag, &ItemKey::Description));
        }
        if info.comment.is_none() {
            info.comment = text(tag, &ItemKey::Comment);
        }
        Ok(info)
    }

    fn cover(&self, path: &Path) -> Result<Option<CoverArt>, MetadataError> {
        let file = match Self::open(path)? {
            Some(file) => file,
            None => return Ok(None),
        };
        let picture = file
            .primary_tag()
            .or_else(|| file.first_tag())
            .and_then(|tag| front_cover(tag.pictures()));
        Ok(picture.map(|picture| CoverArt {
            data: picture.data().to_vec(),
            mime: picture.mime_type().map(|mime| mime.as_str().to_string()),
        }))
    }
}

fn stream_info(file: &TaggedFile) -> StreamInfo {
    let properties = file.properties();
    StreamInfo {
        duration_ms: u32::try_from(properties.duration().as_millis()).unwrap_or(u32::MAX),
        bitrate: properties.audio_bitrate().or(properties.overall_bitrate()),
        sample_rate: properties.sample_rate(),
        channels: properties.channels(),
    }
}

fn text(tag: &Tag, key: &ItemKey) -> Option<String> {
    let value = tag.get_string(key)?.trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn front_cover(pictures: &[Picture]) -> Option<&Picture> {
    pictures
        .iter()
        .find(|picture| picture.pic_type() == PictureType::CoverFront)
        .or_else(|| pictures.first())
}

/// Track or disc position: `3`, `03` and `3/12` all give 3. Zero is no
/// position.
pub fn parse_position(text: &str) -> Option<u16> {
    let number = match text.split_once('/') {
        Some((number, _total)) => number,
        None => text,
    };
    number.trim().parse().ok().filter(|&position| position > 0)
}

/// First run of four digits, so `1999-04-01` and `c. 2003` both work.
pub fn parse_year(text: &str) -> Option<i32> {
    let bytes = text.as_bytes();
    let mut start = 0;
    while start < bytes.len() {
        if !bytes[start].is_ascii_digit() {
            start += 1;
            continue;
        }
        let end = bytes[start..]
            .iter()
            .position(|b| !b.is_ascii_digit())
            .map_or(bytes.len(), |len| start + len);
        if end - start >= 4 {
            return text[start..start + 4].parse().ok();
        }
        start = end;
    }
    None
}

/// Splits a multi-valued genre field. ID3v1 style `(17)` references are
/// dropped; repeated names are kept once.
pub fn parse_genres(text: &str) -> Vec<String> {
    let mut genres: Vec<String> = Vec::new();
    for part in text.split(|ch| matches!(ch, ';' | ',' | '/' | '|' | '\0')) {
        let name = part.trim();
        let reference = name.starts_with('(')
            && name.ends_with(')')
            && name[1..name.len() - 1].chars().all(|ch| ch.is_ascii_digit());
        if name.is_empty() || reference {
            continue;
        }
        if !genres.iter().any(|known| known.eq_ignore_ascii_case(name)) {
            genres.push(name.to_string());
        }
    }
    genres
}

/// Accepts `4`, `alice:5` or `alice:5;bob=60`. Values up to 5 are stars,
/// up to 100 a percentage, up to 255 a popularimeter byte.
pub fn parse_ratings(text: &str) -> Vec<TagRating> {
    text.split(|ch| matches!(ch, ';' | ','))
        .filter_map(|part| {
            let part = part.trim();
            let (user, value) = match part.rsplit_once(|ch| matches!(ch, ':' | '=')) {
                Some((user, value)) => (Some(user.trim()).filter(|u| !u.is_empty()), value),
                None => (None, part),
            };
            let raw: u16 = value.trim().parse().ok()?;
            let rating = match raw {
                0..=5 => raw,
                6..=100 => (raw + 10) / 20,
                101..=255 => (raw + 25) / 51,
                _ => return None,
            };
            Some(TagRating {
                user: user.map(str::to_string),
                rating: rating as u8,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positions_drop_totals() {
        assert_eq!(parse_position("3/12"), Some(3));
        assert_eq!(parse_position(" 07 "), Some(7));
        assert_eq!(parse_position("0"), None);
        assert_eq!(parse_position("A1"), None);
    }

    #[test]
    fn year_is_the_first_four_digit_run() {
        assert_eq!(parse_year("1999-04-01"), Some(1999));
        assert_eq!(parse_year("c. 2003"), Some(2003));
        assert_eq!(parse_year("vol 2, 2011"), Some(2011));
        assert_eq!(parse_year("unknown"), None);
    }

    #[test]
    fn genres_split_and_dedupe() {
        assert_eq!(parse_genres("Rock; Pop/rock|Jazz"), vec!["Rock", "Pop", "Jazz"]);
        assert_eq!(parse_genres("(17), Blues"), vec!["Blues"]);
        assert!(parse_genres("  ").is_empty());
    }

    #[test]
    fn ratings_normalise_to_stars() {
        assert_eq!(
            parse_ratings("4"),
            vec![TagRating {
                user: None,
                rating: 4
            }]
        );
        let parsed = parse_ratings("alice:5; bob=60, carol:255, junk, dave:999");
        let values: Vec<_> = parsed
            .iter()
            .map(|rating| (rating.user.as_deref(), rating.rating))
            .collect();
        assert_eq!(
            values,
            vec![(Some("alice"), 5), (Some("bob"), 3), (Some("carol"), 5)]
        );
    }

    #[test]
    fn missing_file_is_an_error() {
        let result = LoftyExtractor.extract(Path::new("/nonexistent/file.mp3"), MediaKind::Song);
        assert!(result.is_err());
    }

    #[test]
    fn untagged_video_containers_read_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let clip = dir.path().join("clip.mkv");
        std::fs::write(&clip, b"\x1aE\xdf\xa3 not really matroska").unwrap();
        let info = LoftyExtractor.extract(&clip, MediaKind::Video).unwrap();
        assert_eq!(info, TagInfo::default());
        assert!(LoftyExtractor.cover(&clip).unwrap().is_none());
    }
}
