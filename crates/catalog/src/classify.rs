use std::collections::HashSet;
use std::fs;
use std::path::Path;

use common::{GatherType, MediaKind};

use crate::config::ScanConfig;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Classification {
    Audio,
    Video,
    Playlist,
    Unclassified,
}

impl Classification {
    /// Record kind a classified file becomes inside a catalog of `gather`.
    pub fn media_kind(self, gather: GatherType) -> Option<MediaKind> {
        match (self, gather) {
            (Classification::Audio, GatherType::Music) => Some(MediaKind::Song),
            (Classification::Audio, GatherType::Podcast) => Some(MediaKind::PodcastEpisode),
            (Classification::Video, GatherType::Video) => Some(MediaKind::Video),
            _ => None,
        }
    }
}

/// Extension allowlists for the three file classes.
#[derive(Clone, Debug)]
pub struct MediaClassifier {
    audio: HashSet<String>,
    video: HashSet<String>,
    playlist: HashSet<String>,
}

impl MediaClassifier {
    pub fn new(audio: &[String], video: &[String], playlist: &[String]) -> Self {
        Self {
            audio: to_set(audio),
            video: to_set(video),
            playlist: to_set(playlist),
        }
    }

    pub fn from_config(config: &ScanConfig) -> Self {
        Self::new(
            &config.catalog_file_pattern,
            &config.catalog_video_pattern,
            &config.catalog_playlist_pattern,
        )
    }

    /// Name-only classification.
    pub fn classify_name(&self, path: &Path) -> Classification {
        let ext = match path.extension() {
            Some(ext) => ext.to_string_lossy().to_ascii_lowercase(),
            None => return Classification::Unclassified,
        };
        if self.audio.contains(&ext) {
            Classification::Audio
        } else if self.video.contains(&ext) {
            Classification::Video
        } else if self.playlist.contains(&ext) {
            Classification::Playlist
        } else {
            Classification::Unclassified
        }
    }

    /// Like `classify_name`, but only regular files qualify.
    pub fn classify(&self, path: &Path) -> Classification {
        match self.classify_name(path) {
            Classification::Unclassified => Classification::Unclassified,
            class => match fs::metadata(path) {
                Ok(meta) if meta.is_file() => class,
                _ => Classification::Unclassified,
            },
        }
    }
}

fn to_set(values: &[String]) -> HashSet<String> {
    values
        .iter()
        .map(|value| value.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|value| !value.is_empty())
        .collect()
}
