use std::fs;
use std::path::{Path, PathBuf};

use common::{CoverOwner, CoverRef, MediaKind, RecordId};
use metadata::MetadataExtractor;
use tracing::debug;

use crate::error::Result;
use crate::reconcile::{IssueKind, IssueLog};
use crate::store::IndexStore;

const FOLDER_COVERS: &[&str] = &[
    "cover.jpg",
    "cover.jpeg",
    "cover.png",
    "folder.jpg",
    "folder.jpeg",
    "folder.png",
    "front.jpg",
    "front.jpeg",
    "front.png",
    "album.jpg",
    "album.png",
];

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// A record inserted during Add that may need art.
#[derive(Clone, Debug)]
pub(crate) struct ArtworkJob {
    pub record_id: RecordId,
    pub kind: MediaKind,
    pub path: PathBuf,
    pub album_id: Option<String>,
}

/// Finds art for each job; returns how many covers were stored.
pub(crate) fn gather_art(
    store: &dyn IndexStore,
    extractor: &dyn MetadataExtractor,
    jobs: &[ArtworkJob],
    issues: &mut IssueLog,
) -> Result<usize> {
    let mut gathered = 0usize;
    for job in jobs {
        let owner = match (job.kind, &job.album_id) {
            (MediaKind::Song, Some(album_id)) => CoverOwner::Album(album_id.clone()),
            (MediaKind::Video, _) => CoverOwner::Video(job.record_id),
            _ => continue,
        };
        if store.get_cover(&owner)?.is_some() {
            continue;
        }

        let local = match job.kind {
            MediaKind::Video => sibling_image(&job.path).or_else(|| folder_cover(&job.path)),
            _ => folder_cover(&job.path),
        };
        let cover = match local {
            Some(image) => Some(CoverRef::File {
                path: image.to_string_lossy().to_string(),
            }),
            None => match extractor.cover(&job.path) {
                Ok(Some(_)) => Some(CoverRef::Embedded {
                    record_id: job.record_id,
                }),
                Ok(None) => None,
                Err(err) => {
                    issues.report(
                        IssueKind::Artwork,
                        &job.path.to_string_lossy(),
                        err.to_string(),
                    );
                    None
                }
            },
        };

        if let Some(cover) = cover {
            debug!("Cover for {:?}: {:?}", owner, cover);
            store.set_cover(&owner, &cover)?;
            gathered += 1;
        }
    }
    Ok(gathered)
}

/// Well-known cover image in the file's folder, matched case-insensitively.
fn folder_cover(file: &Path) -> Option<PathBuf> {
    let dir = file.parent()?;
    let mut found: Vec<(usize, PathBuf)> = Vec::new();
    for entry in fs::read_dir(dir).ok()?.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_ascii_lowercase();
        if let Some(rank) = FOLDER_COVERS.iter().position(|cover| *cover == name) {
            found.push((rank, path));
        }
    }
    found.sort();
    found.into_iter().next().map(|(_, path)| path)
}

/// `clip.jpg` next to `clip.mkv`.
fn sibling_image(file: &Path) -> Option<PathBuf> {
    IMAGE_EXTENSIONS
        .iter()
        .map(|ext| file.with_extension(ext))
        .find(|candidate| candidate.is_file())
}
