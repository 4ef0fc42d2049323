use std::fs;
use std::path::{Path, PathBuf};

use common::{normalize_root, paths_overlap, CatalogId, CatalogRoot, NewCatalog};
use tracing::{info, warn};

use crate::error::{CatalogError, Result};
use crate::lock::CatalogLocks;
use crate::store::IndexStore;

/// Validates and stores a new catalog root. Nothing is walked until a pass
/// runs against the returned catalog.
pub fn create_catalog(store: &dyn IndexStore, mut catalog: NewCatalog) -> Result<CatalogRoot> {
    catalog.path = check_root(store, &catalog.path, None)?;
    let created = store.create_catalog(catalog)?;
    info!(
        "Created {} catalog {} ({}) at {}",
        created.gather_type.as_str(),
        created.id,
        created.name,
        created.path
    );
    Ok(created)
}

/// Catalog whose root is `path` or one of its ancestors.
pub fn find_catalog_for_path(store: &dyn IndexStore, path: &Path) -> Result<Option<CatalogRoot>> {
    let catalogs = store.list_catalogs()?;
    let mut current: Option<&Path> = Some(path);
    while let Some(candidate) = current {
        let key = normalize_root(&candidate.to_string_lossy());
        if let Some(found) = catalogs.iter().find(|catalog| catalog.path == key) {
            return Ok(Some(found.clone()));
        }
        current = candidate.parent();
    }
    Ok(None)
}

/// Points a catalog at a new root and rewrites its record paths.
pub fn move_catalog(
    store: &dyn IndexStore,
    locks: &CatalogLocks,
    id: CatalogId,
    new_path: &str,
) -> Result<CatalogRoot> {
    let _guard = locks.try_lock(id)?;
    let catalog = store
        .get_catalog(id)?
        .ok_or(CatalogError::CatalogNotFound(id))?;
    let new_root = check_root(store, new_path, Some(id))?;
    if new_root == catalog.path {
        warn!("Catalog {} already lives at {}", id, new_root);
        return Err(CatalogError::InvalidPath(new_root));
    }
    store.relocate_catalog(id, &new_root)
}

/// Normalized root, or the reason it can not host a catalog.
fn check_root(store: &dyn IndexStore, raw: &str, ignore: Option<CatalogId>) -> Result<String> {
    let root = normalize_root(raw);
    if root.is_empty() {
        return Err(CatalogError::InvalidPath(raw.to_string()));
    }

    let candidate = PathBuf::from(&root);
    for existing in store.list_catalogs()? {
        if Some(existing.id) == ignore {
            continue;
        }
        if paths_overlap(&candidate, existing.root()) {
            return Err(CatalogError::PathConflict {
                path: root,
                existing: existing.id,
            });
        }
    }

    if fs::read_dir(&candidate).is_err() {
        return Err(CatalogError::RootUnreadable(candidate));
    }
    Ok(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::redb_store::RedbStore;
    use common::GatherType;

    fn new_catalog(path: &Path) -> NewCatalog {
        NewCatalog {
            name: "main".to_string(),
            path: format!("{}/", path.display()),
            gather_type: GatherType::Music,
            sort_pattern: String::new(),
            rename_pattern: String::new(),
        }
    }

    fn setup() -> (tempfile::TempDir, RedbStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = RedbStore::open(&dir.path().join("index.redb")).unwrap();
        (dir, store)
    }

    #[test]
    fn trailing_separators_are_trimmed() {
        let (dir, store) = setup();
        let music = dir.path().join("music");
        fs::create_dir(&music).unwrap();
        let catalog = create_catalog(&store, new_catalog(&music)).unwrap();
        assert_eq!(catalog.path, music.to_string_lossy());
    }

    #[test]
    fn nested_roots_are_rejected_before_any_walk() {
        let (dir, store) = setup();
        let music = dir.path().join("music");
        let live = music.join("live");
        fs::create_dir_all(&live).unwrap();
        let first = create_catalog(&store, new_catalog(&music)).unwrap();

        for path in [&live, &music, &dir.path().to_path_buf()] {
            let err = create_catalog(&store, new_catalog(path)).unwrap_err();
            assert!(matches!(
                err,
                CatalogError::PathConflict { existing, .. } if existing == first.id
            ));
        }
        assert_eq!(store.list_catalogs().unwrap().len(), 1);
    }

    #[test]
    fn empty_and_unreadable_roots_are_rejected() {
        let (dir, store) = setup();
        let mut blank = new_catalog(dir.path());
        blank.path = "  ".to_string();
        assert!(matches!(
            create_catalog(&store, blank),
            Err(CatalogError::InvalidPath(_))
        ));
        assert!(matches!(
            create_catalog(&store, new_catalog(&dir.path().join("missing"))),
            Err(CatalogError::RootUnreadable(_))
        ));
    }

    #[test]
    fn containing_catalog_is_found_from_any_descendant() {
        let (dir, store) = setup();
        let music = dir.path().join("music");
        fs::create_dir(&music).unwrap();
        let catalog = create_catalog(&store, new_catalog(&music)).unwrap();

        let found = find_catalog_for_path(&store, &music.join("a/b/c.mp3")).unwrap();
        assert_eq!(found.map(|c| c.id), Some(catalog.id));
        assert!(find_catalog_for_path(&store, &dir.path().join("other/c.mp3"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn move_rejects_noop_and_overlaps() {
        let (dir, store) = setup();
        let music = dir.path().join("music");
        let video = dir.path().join("video");
        let moved = dir.path().join("moved");
        for path in [&music, &video, &moved] {
            fs::create_dir(path).unwrap();
        }
        let catalog = create_catalog(&store, new_catalog(&music)).unwrap();
        let other = create_catalog(&store, new_catalog(&video)).unwrap();
        let locks = CatalogLocks::new();

        assert!(matches!(
            move_catalog(&store, &locks, catalog.id, &music.to_string_lossy()),
            Err(CatalogError::InvalidPath(_))
        ));
        assert!(matches!(
            move_catalog(&store, &locks, catalog.id, &video.join("sub").to_string_lossy()),
            Err(CatalogError::PathConflict { existing, .. }) if existing == other.id
        ));
        let relocated = move_catalog(&store, &locks, catalog.id, &moved.to_string_lossy()).unwrap();
        assert_eq!(relocated.path, moved.to_string_lossy());
    }
}
