//! Sort/rename pattern templates.
//!
//! A pattern is a `/`-separated template such as `%a/%A` (sort) plus
//! `%T - %t` (rename). Supported codes: `%a` artist, `%A` album, `%b` album
//! artist, `%t` title, `%T` track (two digits), `%d` disc, `%y` year and
//! `%g` genre. Anything else is literal text.

use std::path::{Component, Path, PathBuf};

use common::join_relpath;
use metadata::{parse_position, parse_year};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Field {
    Artist,
    Album,
    AlbumArtist,
    Title,
    Track,
    Disc,
    Year,
    Genre,
}

impl Field {
    fn from_code(code: char) -> Option<Self> {
        match code {
            'a' => Some(Field::Artist),
            'A' => Some(Field::Album),
            'b' => Some(Field::AlbumArtist),
            't' => Some(Field::Title),
            'T' => Some(Field::Track),
            'd' => Some(Field::Disc),
            'y' => Some(Field::Year),
            'g' => Some(Field::Genre),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field(Field),
}

/// Values a pattern can render or a path can yield.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PatternFields {
    pub artist: Option<String>,
    pub album: Option<String>,
    pub album_artist: Option<String>,
    pub title: Option<String>,
    pub track: Option<u16>,
    pub disc: Option<u16>,
    pub year: Option<i32>,
    pub genre: Option<String>,
}

impl PatternFields {
    fn get(&self, field: Field) -> Option<String> {
        match field {
            Field::Artist => self.artist.clone(),
            Field::Album => self.album.clone(),
            Field::AlbumArtist => self.album_artist.clone().or_else(|| self.artist.clone()),
            Field::Title => self.title.clone(),
            Field::Track => self.track.map(|track| format!("{:02}", track)),
            Field::Disc => self.disc.map(|disc| disc.to_string()),
            Field::Year => self.year.map(|year| year.to_string()),
            Field::Genre => self.genre.clone(),
        }
    }

    fn set(&mut self, field: Field, raw: &str) {
        let value = raw.trim();
        if value.is_empty() {
            return;
        }
        match field {
            Field::Artist => self.artist = Some(value.to_string()),
            Field::Album => self.album = Some(value.to_string()),
            Field::AlbumArtist => self.album_artist = Some(value.to_string()),
            Field::Title => self.title = Some(value.to_string()),
            Field::Track => self.track = parse_position(value),
            Field::Disc => self.disc = parse_position(value),
            Field::Year => self.year = parse_year(value),
            Field::Genre => self.genre = Some(value.to_string()),
        }
    }
}

/// `sort/rename`, or just `rename` when no sort pattern is set.
pub fn combined_pattern(sort: &str, rename: &str) -> String {
    let sort = sort.trim().trim_matches('/');
    let rename = rename.trim().trim_matches('/');
    if sort.is_empty() {
        rename.to_string()
    } else if rename.is_empty() {
        String::new()
    } else {
        format!("{}/{}", sort, rename)
    }
}

fn tokenize(pattern: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = pattern.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '%' {
            if let Some(field) = chars.peek().copied().and_then(Field::from_code) {
                chars.next();
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(Segment::Field(field));
                continue;
            }
        }
        literal.push(ch);
    }
    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    segments
}

/// The last `count` components of `path`, `/`-joined, extension dropped.
fn trailing_components(path: &Path, count: usize) -> Option<String> {
    let mut parts: Vec<String> = path
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect();
    if count == 0 || parts.len() < count {
        return None;
    }
    let last = parts.len() - 1;
    if let Some(stem) = path.file_stem() {
        parts[last] = stem.to_string_lossy().to_string();
    }
    Some(parts[parts.len() - count..].join("/"))
}

fn component_count(pattern: &str) -> usize {
    if pattern.is_empty() {
        0
    } else {
        pattern.split('/').count()
    }
}

/// Reads field values back out of a path laid out by the patterns. Fields
/// the path does not match are left empty.
pub fn parse_pattern(path: &Path, sort: &str, rename: &str) -> PatternFields {
    let mut fields = PatternFields::default();
    let pattern = combined_pattern(sort, rename);
    let subject = match trailing_components(path, component_count(&pattern)) {
        Some(subject) => subject,
        None => return fields,
    };
    let mut parsed = PatternFields::default();
    if match_segments(&tokenize(&pattern), &subject, &mut parsed) {
        fields = parsed;
    }
    fields
}

fn match_segments(segments: &[Segment], mut input: &str, fields: &mut PatternFields) -> bool {
    for (idx, segment) in segments.iter().enumerate() {
        match segment {
            Segment::Literal(text) => match input.strip_prefix(text.as_str()) {
                Some(rest) => input = rest,
                None => return false,
            },
            Segment::Field(field) => match segments.get(idx + 1) {
                Some(Segment::Literal(next)) => {
                    let end = match input.find(next.as_str()) {
                        Some(end) => end,
                        None => return false,
                    };
                    fields.set(*field, &input[..end]);
                    input = &input[end..];
                }
                Some(Segment::Field(_)) => {}
                None => {
                    fields.set(*field, input);
                    input = "";
                }
            },
        }
    }
    input.is_empty()
}

/// Renders `pattern`; `None` when a referenced field has no value.
pub fn render_pattern(pattern: &str, fields: &PatternFields) -> Option<String> {
    let mut out = String::new();
    for segment in tokenize(pattern) {
        match segment {
            Segment::Literal(text) => out.push_str(&text),
            Segment::Field(field) => {
                let value = sanitize(&fields.get(field)?);
                if value.is_empty() {
                    return None;
                }
                out.push_str(&value);
            }
        }
    }
    Some(out)
}

fn sanitize(value: &str) -> String {
    let cleaned: String = value
        .chars()
        .map(|ch| match ch {
            '/' | '\\' | '\0' => '-',
            other => other,
        })
        .collect();
    match cleaned.trim() {
        "." | ".." => "_".to_string(),
        other => other.to_string(),
    }
}

/// Resolves `.` and `..` without touching the filesystem.
fn normalize_lexically(path: &Path) -> PathBuf {
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

/// Where `file` belongs according to the patterns, when that differs from
/// where it is. Only the trailing components the patterns describe are
/// replaced; a target that would leave `root` yields `None`.
pub fn canonical_path(
    file: &Path,
    root: &Path,
    sort: &str,
    rename: &str,
    fields: &PatternFields,
) -> Option<PathBuf> {
    let pattern = combined_pattern(sort, rename);
    let count = component_count(&pattern);
    if count == 0 {
        return None;
    }
    let relative = file.strip_prefix(root).ok()?;
    if relative.components().count() < count {
        return None;
    }

    let rendered = render_pattern(&pattern, fields)?;
    let current = trailing_components(file, count)?;
    if rendered == current {
        return None;
    }

    let mut base = file.to_path_buf();
    for _ in 0..count {
        base.pop();
    }
    let name = match file.extension() {
        Some(ext) => format!("{}.{}", rendered, ext.to_string_lossy()),
        None => rendered,
    };
    let target = normalize_lexically(&join_relpath(&base, &name));
    if target == file || target == root || !target.starts_with(root) {
        None
    } else {
        Some(target)
    }
}
