//! m3u/m3u8/pls import against the songs an Add pass just indexed.

use std::fs;
use std::path::{Component, Path, PathBuf};

use common::{stable_id, CatalogRoot, Playlist, RecordId};
use serde::Serialize;
use tracing::info;

use crate::cache::IndexCache;
use crate::charset::PathEncoding;
use crate::error::Result;
use crate::reconcile::{IssueKind, IssueLog};
use crate::store::IndexStore;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PlaylistImport {
    pub playlist_id: String,
    pub name: String,
    pub items: usize,
    pub missing: usize,
}

/// Raw entries of a playlist file, in order.
pub fn parse_playlist(path: &Path, contents: &str) -> Vec<String> {
    let is_pls = path
        .extension()
        .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case("pls"))
        .unwrap_or(false);
    let mut entries = Vec::new();
    for line in contents.lines() {
        let line = line.trim().trim_start_matches('\u{feff}');
        if line.is_empty() {
            continue;
        }
        if is_pls {
            if let Some((key, value)) = line.split_once('=') {
                if key.trim().to_ascii_lowercase().starts_with("file") {
                    entries.push(value.trim().to_string());
                }
            }
        } else if !line.starts_with('#') {
            entries.push(line.to_string());
        }
    }
    entries
}

/// On-disk path an entry points at. URLs and other remote entries have none.
fn resolve_entry(playlist: &Path, entry: &str) -> Option<PathBuf> {
    if entry.contains("://") {
        return None;
    }
    let raw = PathBuf::from(entry.replace('\\', "/"));
    let joined = if raw.is_absolute() {
        raw
    } else {
        playlist.parent()?.join(raw)
    };
    let mut out = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    Some(out)
}

/// Saves the playlist at `path` with every entry the run knows about.
/// Returns `None` when nothing in it could be matched.
pub(crate) fn import_playlist(
    store: &dyn IndexStore,
    encoding: &PathEncoding,
    catalog: &CatalogRoot,
    path: &Path,
    cache: &IndexCache,
    issues: &mut IssueLog,
) -> Result<Option<PlaylistImport>> {
    let display = path.to_string_lossy().to_string();
    let contents = match fs::read(path) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).to_string(),
        Err(err) => {
            issues.report(IssueKind::Playlist, &display, err.to_string());
            return Ok(None);
        }
    };

    let mut items: Vec<RecordId> = Vec::new();
    let mut missing = 0usize;
    for entry in parse_playlist(path, &contents) {
        let found = resolve_entry(path, &entry)
            .and_then(|file| encoding.to_site(&file).ok())
            .and_then(|stored| cache.lookup(&stored));
        match found {
            Some(media) => items.push(media.id),
            None => {
                missing += 1;
                issues.report(
                    IssueKind::Playlist,
                    &display,
                    format!("entry not in catalog: {}", entry),
                );
            }
        }
    }

    if items.is_empty() {
        issues.report(IssueKind::Playlist, &display, "no entries matched, not saved");
        return Ok(None);
    }

    let stored_path = encoding
        .to_site(path)
        .unwrap_or_else(|mismatch| mismatch.path);
    let name = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_else(|| display.clone());
    let playlist = Playlist {
        id: stable_id(&stored_path),
        catalog_id: catalog.id,
        name: name.clone(),
        source_path: stored_path,
        public: true,
        items,
    };
    store.save_playlist(&playlist)?;
    info!(
        "Imported playlist {} with {} items ({} missing)",
        name,
        playlist.items.len(),
        missing
    );
    Ok(Some(PlaylistImport {
        playlist_id: playlist.id,
        name,
        items: playlist.items.len(),
        missing,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoProgress;
    use crate::reconcile::AddOptions;
    use crate::test_support::{reconciler, write_media, TestCatalog};
    use common::GatherType;

    #[test]
    fn m3u_comments_are_ignored() {
        let entries = parse_playlist(
            Path::new("list.m3u"),
            "#EXTM3U\n#EXTINF:10,Band - A\na.mp3\n\n../b.mp3\n",
        );
        assert_eq!(entries, vec!["a.mp3", "../b.mp3"]);
    }

    #[test]
    fn pls_files_list_file_keys() {
        let entries = parse_playlist(
            Path::new("list.PLS"),
            "[playlist]\nFile1=a.mp3\nTitle1=A\nFile2=/abs/b.mp3\nNumberOfEntries=2\n",
        );
        assert_eq!(entries, vec!["a.mp3", "/abs/b.mp3"]);
    }

    #[test]
    fn entries_resolve_relative_to_the_playlist() {
        let list = Path::new("/music/lists/mix.m3u");
        assert_eq!(
            resolve_entry(list, "../Band/a.mp3"),
            Some(PathBuf::from("/music/Band/a.mp3"))
        );
        assert_eq!(
            resolve_entry(list, "/other/b.mp3"),
            Some(PathBuf::from("/other/b.mp3"))
        );
        assert_eq!(resolve_entry(list, "http://radio/stream"), None);
    }

    #[test]
    fn playlists_import_after_the_walk() {
        let env = TestCatalog::new(GatherType::Music);
        // Sorts before the songs it lists.
        write_media(
            &env.root,
            "0-mix.m3u",
            "#EXTM3U\nsongs/b.mp3\nsongs/a.mp3\nsongs/gone.mp3\n",
        );
        write_media(&env.root, "songs/a.mp3", "title=A");
        write_media(&env.root, "songs/b.mp3", "title=B");
        let engine = reconciler(&env, |_| {});

        let options = AddOptions {
            parse_playlist: true,
            ..AddOptions::default()
        };
        let outcome = engine.add(env.catalog.id, &options, &NoProgress).unwrap();
        assert_eq!(outcome.playlists.len(), 1);
        let import = &outcome.playlists[0];
        assert_eq!(import.name, "0-mix");
        assert_eq!(import.items, 2);
        assert_eq!(import.missing, 1);

        let saved = env.store.get_playlist(&import.playlist_id).unwrap().unwrap();
        assert!(saved.public);
        let first = env
            .store
            .find_by_path(env.catalog.id, &env.root.join("songs/b.mp3").to_string_lossy())
            .unwrap()
            .unwrap();
        assert_eq!(saved.items[0], first.id);
    }

    #[test]
    fn playlists_without_matches_are_not_saved() {
        let env = TestCatalog::new(GatherType::Music);
        write_media(&env.root, "empty.m3u", "nothing.mp3\n");
        let engine = reconciler(&env, |_| {});
        let options = AddOptions {
            parse_playlist: true,
            ..AddOptions::default()
        };
        let outcome = engine.add(env.catalog.id, &options, &NoProgress).unwrap();
        assert!(outcome.playlists.is_empty());
        assert!(outcome
            .issues
            .iter()
            .all(|issue| issue.kind == IssueKind::Playlist));
        assert_eq!(outcome.issues.len(), 2);
    }
}
