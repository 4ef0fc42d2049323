use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::Instant;

use common::{CatalogId, CatalogRoot, DuplicateKey, MediaKind, MediaRecord, RecordId};
use metadata::TagInfo;
use tracing::{debug, info};

use super::draft::{build_record, file_mtime, pattern_fields};
use super::{
    is_readable, AddOptions, AddOutcome, IssueKind, IssueLog, Reconciler, ReconciliationStats,
};
use crate::artwork::{gather_art, ArtworkJob};
use crate::cache::IndexCache;
use crate::classify::Classification;
use crate::error::{CatalogError, Result};
use crate::now_secs;
use crate::pattern::canonical_path;
use crate::playlist::import_playlist;
use crate::progress::ProgressSink;
use crate::store::CatalogMarker;
use crate::walker::{PathWalker, WalkEntry, WalkOptions};

impl Reconciler {
    /// Walks the catalog tree and indexes every media file not yet known.
    pub fn add(
        &self,
        catalog_id: CatalogId,
        options: &AddOptions,
        progress: &dyn ProgressSink,
    ) -> Result<AddOutcome> {
        let _guard = self.locks.try_lock(catalog_id)?;
        let catalog = self.catalog(catalog_id)?;
        let mut cache = IndexCache::build(self.store.as_ref(), catalog.id, self.chunk_size())?;
        self.run_add(&catalog, options, &mut cache, progress)
    }

    pub(crate) fn run_add(
        &self,
        catalog: &CatalogRoot,
        options: &AddOptions,
        cache: &mut IndexCache,
        progress: &dyn ProgressSink,
    ) -> Result<AddOutcome> {
        let started = Instant::now();
        let start_time = now_secs();
        let walk_root = walk_root(catalog, options)?;
        info!(
            "Adding to catalog {} ({}) from {}",
            catalog.id,
            catalog.name,
            walk_root.display()
        );

        let mut run = AddRun {
            reconciler: self,
            catalog,
            options,
            cache,
            issues: IssueLog::default(),
            stats: ReconciliationStats::default(),
            playlists: Vec::new(),
            artwork: Vec::new(),
            now: start_time,
        };

        let walker = PathWalker::new(WalkOptions {
            follow_symlinks: !self.config.no_symlinks,
            skip_hidden: true,
            progress_every: self.config.progress_interval,
        });
        for item in walker.walk(&walk_root, progress) {
            match item {
                Ok(entry) if entry.is_dir => {}
                Ok(entry) => run.visit(&entry)?,
                Err(err) => run.issues.walk_error(&err),
            }
        }

        let mut imports = Vec::new();
        for playlist in std::mem::take(&mut run.playlists) {
            if let Some(import) = import_playlist(
                self.store.as_ref(),
                &self.encoding,
                catalog,
                &playlist,
                run.cache,
                &mut run.issues,
            )? {
                imports.push(import);
            }
        }

        let art_gathered = if options.gather_art {
            gather_art(
                self.store.as_ref(),
                self.extractor.as_ref(),
                &run.artwork,
                &mut run.issues,
            )?
        } else {
            0
        };

        self.store.touch_catalog(catalog.id, CatalogMarker::Add, start_time)?;

        let issues = run.issues.into_vec();
        let mut stats = run.stats;
        stats.errors = issues.len();
        stats.elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            "Catalog {} add finished: {} added, {} skipped, {} duplicates, {} issues in {} ms",
            catalog.id, stats.added, stats.skipped, stats.duplicates, stats.errors, stats.elapsed_ms
        );
        Ok(AddOutcome {
            stats,
            issues,
            playlists: imports,
            art_gathered,
        })
    }
}

struct AddRun<'a> {
    reconciler: &'a Reconciler,
    catalog: &'a CatalogRoot,
    options: &'a AddOptions,
    cache: &'a mut IndexCache,
    issues: IssueLog,
    stats: ReconciliationStats,
    playlists: Vec<PathBuf>,
    artwork: Vec<ArtworkJob>,
    now: u64,
}

impl AddRun<'_> {
    fn visit(&mut self, entry: &WalkEntry) -> Result<()> {
        let config = &self.reconciler.config;
        self.stats.files_seen += 1;
        let path = entry.path.as_path();

        if self.cache.contains(&path.to_string_lossy()) {
            self.stats.skipped += 1;
            return Ok(());
        }
        if entry.is_symlink && config.no_symlinks {
            debug!("Skipping symlink {}", path.display());
            self.stats.skipped += 1;
            return Ok(());
        }

        let kind = match self.reconciler.classifier.classify(path) {
            Classification::Playlist => {
                if self.options.parse_playlist {
                    self.playlists.push(path.to_path_buf());
                }
                return Ok(());
            }
            Classification::Unclassified => return Ok(()),
            class => match class.media_kind(self.catalog.gather_type) {
                Some(kind) => kind,
                None => return Ok(()),
            },
        };
        self.add_file(path, kind)
    }

    fn add_file(&mut self, path: &Path, kind: MediaKind) -> Result<()> {
        let reconciler = self.reconciler;
        let config = &reconciler.config;
        let display = path.to_string_lossy().to_string();

        let meta = match fs::metadata(path) {
            Ok(meta) => meta,
            Err(err) => {
                self.issues.report(IssueKind::Unreadable, &display, err.to_string());
                return Ok(());
            }
        };
        if meta.len() < 1 {
            self.issues.report(IssueKind::EmptyFile, &display, "file is empty");
            return Ok(());
        }
        if !is_readable(path) {
            self.issues.report(IssueKind::Unreadable, &display, "file can not be opened");
            return Ok(());
        }

        let stored = match reconciler.encoding.to_site(path) {
            Ok(stored) => stored,
            Err(mismatch) => {
                let message = match mismatch.converted {
                    Some(converted) => format!("name does not round-trip (got {})", converted),
                    None => "name can not be expressed in the site charset".to_string(),
                };
                self.issues.report(IssueKind::EncodingMismatch, &mismatch.path, message);
                return Ok(());
            }
        };
        if self.cache.contains(&stored) {
            self.stats.skipped += 1;
            return Ok(());
        }

        let tags = match reconciler.read_tags(path, kind) {
            Ok(tags) => tags,
            Err(err) => {
                self.issues.report(IssueKind::TagRead, &stored, err.to_string());
                TagInfo::default()
            }
        };
        let record = build_record(self.catalog, path, &stored, kind, &tags, &meta, self.now);

        if config.catalog_check_duplicate {
            if let Some(song) = record.details.as_song() {
                let key = DuplicateKey::from_song(&record.title, song);
                if let Some(existing) = reconciler.store.find_duplicate(&key)? {
                    debug!("{} duplicates record {}", stored, existing);
                    self.stats.duplicates += 1;
                    return Ok(());
                }
            }
        }

        let album_id = record.details.as_song().map(|song| song.album_id.clone());
        let mut file = path.to_path_buf();
        let mut indexed = None;
        if config.move_match_pattern && kind == MediaKind::Song {
            match self.move_to_pattern(path, &record) {
                Ok(Some((target, target_stored))) => {
                    match self.insert_moved(path, &record, &target, target_stored)? {
                        MovedInsert::Indexed(id, moved_path) => {
                            file = target;
                            indexed = Some((id, moved_path));
                        }
                        MovedInsert::Restored => {}
                        MovedInsert::Stranded => return Ok(()),
                    }
                }
                Ok(None) => {}
                Err(message) => self.issues.report(IssueKind::MoveFailed, &stored, message),
            }
        }

        let (id, record_path) = match indexed {
            Some(done) => done,
            None => {
                let record_path = record.path.clone();
                match reconciler.store.insert_record(record) {
                    Ok(id) => (id, record_path),
                    Err(CatalogError::DuplicatePath(existing)) => {
                        debug!("{} is already indexed", existing);
                        self.stats.skipped += 1;
                        return Ok(());
                    }
                    Err(err) => return Err(err),
                }
            }
        };
        self.stats.added += 1;
        self.cache.insert(&record_path, id, kind);

        for rating in &tags.ratings {
            let user = rating.user.as_deref().unwrap_or(config.rating_user.as_str());
            reconciler.store.set_rating(id, user, rating.rating)?;
        }
        if self.options.gather_art {
            self.artwork.push(ArtworkJob {
                record_id: id,
                kind,
                path: file,
                album_id,
            });
        }
        Ok(())
    }

    /// Renames `path` to where the patterns say it belongs. `Ok(None)` when
    /// it is already there or the patterns do not apply. Nothing is renamed
    /// onto a path the index already holds.
    fn move_to_pattern(
        &self,
        path: &Path,
        record: &MediaRecord,
    ) -> Result<Option<(PathBuf, String)>, String> {
        let fields = match pattern_fields(record) {
            Some(fields) => fields,
            None => return Ok(None),
        };
        let target = match canonical_path(
            path,
            self.catalog.root(),
            &self.catalog.sort_pattern,
            &self.catalog.rename_pattern,
            &fields,
        ) {
            Some(target) => target,
            None => return Ok(None),
        };
        if target.exists() {
            return Err(format!("{} already exists", target.display()));
        }
        let stored = self
            .reconciler
            .encoding
            .to_site(&target)
            .map_err(|_| format!("{} can not be stored in the site charset", target.display()))?;
        if self.cache.contains(&stored) {
            return Err(format!("{} is already indexed", stored));
        }
        match self.reconciler.store.find_by_path(self.catalog.id, &stored) {
            Ok(None) => {}
            Ok(Some(existing)) => {
                return Err(format!("{} is already indexed as {}", stored, existing.id))
            }
            Err(err) => return Err(format!("unable to check {}: {}", stored, err)),
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .map_err(|err| format!("unable to create {}: {}", parent.display(), err))?;
        }
        fs::rename(path, &target)
            .map_err(|err| format!("unable to rename to {}: {}", target.display(), err))?;
        Ok(Some((target, stored)))
    }

    /// Indexes a file `move_to_pattern` put at `target`. When the insert
    /// fails the file goes back to `path`; store failures other than a
    /// duplicate path still abort the pass.
    fn insert_moved(
        &mut self,
        path: &Path,
        record: &MediaRecord,
        target: &Path,
        target_stored: String,
    ) -> Result<MovedInsert> {
        let mut moved = record.clone();
        moved.path = target_stored;
        match fs::metadata(target) {
            Ok(meta) => {
                moved.size = meta.len();
                moved.mtime = file_mtime(&meta);
            }
            Err(err) => debug!("Unable to stat {}: {}", target.display(), err),
        }
        let moved_path = moved.path.clone();
        let err = match self.reconciler.store.insert_record(moved) {
            Ok(id) => {
                info!("Moved {} to {}", record.path, moved_path);
                return Ok(MovedInsert::Indexed(id, moved_path));
            }
            Err(err) => err,
        };

        if let Err(restore) = fs::rename(target, path) {
            self.issues.report(
                IssueKind::MoveFailed,
                &moved_path,
                format!("not indexed and not moved back to {}: {}", record.path, restore),
            );
            return match err {
                CatalogError::DuplicatePath(_) => Ok(MovedInsert::Stranded),
                other => Err(other),
            };
        }
        match err {
            CatalogError::DuplicatePath(existing) => {
                self.issues.report(
                    IssueKind::MoveFailed,
                    &record.path,
                    format!("{} is already indexed", existing),
                );
                Ok(MovedInsert::Restored)
            }
            other => Err(other),
        }
    }
}

enum MovedInsert {
    Indexed(RecordId, String),
    /// Back at its original path, still to be indexed there.
    Restored,
    /// Left at the target without a record.
    Stranded,
}

/// Directory the pass walks: the root, or a subtree of it.
fn walk_root(catalog: &CatalogRoot, options: &AddOptions) -> Result<PathBuf> {
    let sub = match &options.subdirectory {
        Some(sub) => sub,
        None => return Ok(catalog.root().to_path_buf()),
    };
    let full = if sub.is_absolute() {
        sub.clone()
    } else {
        catalog.root().join(sub)
    };
    let escapes = full
        .components()
        .any(|component| matches!(component, Component::ParentDir));
    if escapes || !full.starts_with(catalog.root()) {
        return Err(CatalogError::InvalidPath(full.to_string_lossy().to_string()));
    }
    Ok(full)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoProgress;
    use crate::store::IndexStore;
    use crate::test_support::{reconciler, write_media, TestCatalog};
    use common::GatherType;
    use std::cell::Cell;

    #[test]
    fn empty_files_are_reported_and_the_rest_indexed() {
        let env = TestCatalog::new(GatherType::Music);
        write_media(&env.root, "a.mp3", "title=A\nartist=Band\nalbum=First");
        write_media(&env.root, "b.mp3", "");
        let engine = reconciler(&env, |_| {});

        let mut cache = IndexCache::default();
        let outcome = engine
            .run_add(&env.catalog, &AddOptions::default(), &mut cache, &NoProgress)
            .unwrap();
        assert_eq!(outcome.stats.added, 1);
        assert_eq!(outcome.issues.len(), 1);
        assert_eq!(outcome.issues[0].kind, IssueKind::EmptyFile);
        assert!(outcome.issues[0].path.ends_with("b.mp3"));
        assert_eq!(
            cache.paths(),
            vec![env.root.join("a.mp3").to_string_lossy().to_lowercase()]
        );
    }

    #[test]
    fn second_add_over_the_same_tree_inserts_nothing() {
        let env = TestCatalog::new(GatherType::Music);
        write_media(&env.root, "one/a.mp3", "title=A");
        write_media(&env.root, "one/b.flac", "title=B");
        write_media(&env.root, "notes.txt", "not media");
        let engine = reconciler(&env, |_| {});

        let first = engine.add(env.catalog.id, &AddOptions::default(), &NoProgress).unwrap();
        assert_eq!(first.stats.added, 2);
        let second = engine.add(env.catalog.id, &AddOptions::default(), &NoProgress).unwrap();
        assert_eq!(second.stats.added, 0);
        assert_eq!(second.stats.skipped, 2);
        assert_eq!(env.store.stats_by_catalog(env.catalog.id).unwrap().songs, 2);
    }

    #[test]
    fn last_add_marker_is_the_start_time() {
        let env = TestCatalog::new(GatherType::Music);
        write_media(&env.root, "a.mp3", "title=A");
        let engine = reconciler(&env, |_| {});
        let before = now_secs();
        engine.add(env.catalog.id, &AddOptions::default(), &NoProgress).unwrap();
        let catalog = env.store.get_catalog(env.catalog.id).unwrap().unwrap();
        assert!(catalog.last_add >= before);
        assert!(catalog.last_add <= now_secs());
    }

    #[cfg(unix)]
    #[test]
    fn names_that_fail_the_site_charset_are_not_indexed() {
        let env = TestCatalog::new(GatherType::Music);
        write_media(&env.root, "café.mp3", "title=Cafe");
        write_media(&env.root, "plain.mp3", "title=Plain");
        let engine = reconciler(&env, |config| {
            config.site_charset = "US-ASCII".to_string();
            config.lc_charset = "UTF-8".to_string();
        });

        let outcome = engine.add(env.catalog.id, &AddOptions::default(), &NoProgress).unwrap();
        assert_eq!(outcome.stats.added, 1);
        assert!(outcome
            .issues
            .iter()
            .any(|issue| issue.kind == IssueKind::EncodingMismatch && issue.path.ends_with("café.mp3")));
        let cafe = env.root.join("café.mp3");
        assert!(env
            .store
            .find_by_path(env.catalog.id, &cafe.to_string_lossy())
            .unwrap()
            .is_none());
    }

    #[test]
    fn tag_failures_still_index_the_file() {
        let env = TestCatalog::new(GatherType::Music);
        write_media(&env.root, "Band/Live/03 - Encore.mp3", "error=broken header");
        write_media(&env.root, "crash.mp3", "panic=decoder blew up");
        let engine = reconciler(&env, |_| {});
        let mut catalog = env.catalog.clone();
        catalog.sort_pattern = "%a/%A".to_string();
        catalog.rename_pattern = "%T - %t".to_string();

        let mut cache = IndexCache::default();
        let outcome = engine
            .run_add(&catalog, &AddOptions::default(), &mut cache, &NoProgress)
            .unwrap();
        assert_eq!(outcome.stats.added, 2);
        assert_eq!(
            outcome
                .issues
                .iter()
                .filter(|issue| issue.kind == IssueKind::TagRead)
                .count(),
            2
        );
        let path = env.root.join("Band/Live/03 - Encore.mp3");
        let record = env
            .store
            .find_by_path(catalog.id, &path.to_string_lossy())
            .unwrap()
            .unwrap();
        assert_eq!(record.title, "Encore");
        let song = record.details.as_song().unwrap();
        assert_eq!(song.artist, "Band");
        assert_eq!(song.track_no, Some(3));
    }

    #[test]
    fn duplicate_tags_are_skipped_when_enabled() {
        let env = TestCatalog::new(GatherType::Music);
        let tags = "title=Song\nartist=Band\nalbum=Live\ntrack=1";
        write_media(&env.root, "a/song.mp3", tags);
        write_media(&env.root, "b/song copy.mp3", tags);
        let engine = reconciler(&env, |config| config.catalog_check_duplicate = true);

        let outcome = engine.add(env.catalog.id, &AddOptions::default(), &NoProgress).unwrap();
        assert_eq!(outcome.stats.added, 1);
        assert_eq!(outcome.stats.duplicates, 1);
    }

    fn pattern_catalog(env: &TestCatalog) -> CatalogRoot {
        let mut catalog = env.catalog.clone();
        catalog.sort_pattern = "%a/%A".to_string();
        catalog.rename_pattern = "%T - %t".to_string();
        catalog
    }

    #[test]
    fn files_move_to_their_pattern_path() {
        let env = TestCatalog::new(GatherType::Music);
        write_media(
            &env.root,
            "incoming/new/x.mp3",
            "title=Opener\nartist=Band\nalbum=Live\ntrack=1",
        );
        fs::File::options()
            .write(true)
            .open(env.root.join("incoming/new/x.mp3"))
            .unwrap()
            .set_modified(std::time::UNIX_EPOCH + std::time::Duration::from_secs(86_400))
            .unwrap();
        let engine = reconciler(&env, |config| config.move_match_pattern = true);
        let catalog = pattern_catalog(&env);

        let mut cache = IndexCache::default();
        let outcome = engine
            .run_add(&catalog, &AddOptions::default(), &mut cache, &NoProgress)
            .unwrap();
        assert_eq!(outcome.stats.added, 1);
        let target = env.root.join("Band/Live/01 - Opener.mp3");
        assert!(target.is_file());
        assert!(!env.root.join("incoming/new/x.mp3").exists());
        let record = env
            .store
            .find_by_path(catalog.id, &target.to_string_lossy())
            .unwrap()
            .unwrap();
        let on_disk = fs::metadata(&target).unwrap();
        assert_eq!(record.path, target.to_string_lossy());
        assert_eq!(record.size, on_disk.len());
        assert_eq!(record.mtime, file_mtime(&on_disk));
        assert_eq!(record.mtime, 86_400);
    }

    #[test]
    fn dot_tags_do_not_move_files_out_of_the_root() {
        let env = TestCatalog::new(GatherType::Music);
        write_media(
            &env.root,
            "in/box/x.mp3",
            "title=Opener\nartist=..\nalbum=..\ntrack=1",
        );
        let engine = reconciler(&env, |config| config.move_match_pattern = true);
        let catalog = pattern_catalog(&env);

        let mut cache = IndexCache::default();
        let outcome = engine
            .run_add(&catalog, &AddOptions::default(), &mut cache, &NoProgress)
            .unwrap();
        assert_eq!(outcome.stats.added, 1);
        let outside = env._dir.path().parent().unwrap().join("01 - Opener.mp3");
        assert!(!outside.exists());
        assert!(!env._dir.path().join("01 - Opener.mp3").exists());

        let paths = cache.paths();
        assert_eq!(paths.len(), 1);
        let stored = Path::new(&paths[0]);
        assert!(stored.starts_with(env.root.to_string_lossy().to_lowercase()));
        assert!(!stored
            .components()
            .any(|component| matches!(component, Component::ParentDir)));
        assert!(env.root.join("_/_/01 - Opener.mp3").is_file());
    }

    #[test]
    fn moves_onto_an_indexed_path_are_refused() {
        let env = TestCatalog::new(GatherType::Music);
        let target = env.root.join("Band/Live/01 - Opener.mp3");
        env.store
            .insert_record(crate::test_support::song_record(
                env.catalog.id,
                &target.to_string_lossy(),
                "Opener",
            ))
            .unwrap();
        write_media(
            &env.root,
            "x/y/z.mp3",
            "title=Opener\nartist=Band\nalbum=Live\ntrack=1",
        );
        let engine = reconciler(&env, |config| config.move_match_pattern = true);
        let catalog = pattern_catalog(&env);

        let mut cache = IndexCache::default();
        let outcome = engine
            .run_add(&catalog, &AddOptions::default(), &mut cache, &NoProgress)
            .unwrap();
        assert_eq!(outcome.stats.added, 1);
        assert!(outcome
            .issues
            .iter()
            .any(|issue| issue.kind == IssueKind::MoveFailed));
        let original = env.root.join("x/y/z.mp3");
        assert!(original.is_file());
        assert!(!target.exists());
        assert!(env
            .store
            .find_by_path(catalog.id, &original.to_string_lossy())
            .unwrap()
            .is_some());
    }

    #[test]
    fn failed_inserts_put_moved_files_back() {
        let env = TestCatalog::new(GatherType::Music);
        let engine = reconciler(&env, |_| {});
        let catalog = pattern_catalog(&env);
        let original = env.root.join("x/y/z.mp3");
        let target = env.root.join("Band/Live/01 - Opener.mp3");
        write_media(&env.root, "Band/Live/01 - Opener.mp3", "title=Opener");
        let target_stored = target.to_string_lossy().to_string();
        env.store
            .insert_record(crate::test_support::song_record(
                catalog.id,
                &target_stored,
                "Opener",
            ))
            .unwrap();

        let mut cache = IndexCache::default();
        let options = AddOptions::default();
        let mut run = AddRun {
            reconciler: &engine,
            catalog: &catalog,
            options: &options,
            cache: &mut cache,
            issues: IssueLog::default(),
            stats: ReconciliationStats::default(),
            playlists: Vec::new(),
            artwork: Vec::new(),
            now: 1,
        };
        let record = crate::test_support::song_record(
            catalog.id,
            &original.to_string_lossy(),
            "Opener",
        );
        fs::create_dir_all(original.parent().unwrap()).unwrap();
        let restored = run
            .insert_moved(&original, &record, &target, target_stored)
            .unwrap();
        assert!(matches!(restored, MovedInsert::Restored));
        assert!(original.is_file());
        assert!(!target.exists());
        let issues = run.issues.into_vec();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, IssueKind::MoveFailed);
    }

    #[test]
    fn blocked_moves_keep_the_original_path() {
        let env = TestCatalog::new(GatherType::Music);
        let tags = "title=Opener\nartist=Band\nalbum=Live\ntrack=1";
        write_media(&env.root, "Band/Live/01 - Opener.mp3", tags);
        write_media(&env.root, "x/y/z.mp3", tags);
        let engine = reconciler(&env, |config| config.move_match_pattern = true);
        let catalog = pattern_catalog(&env);

        let mut cache = IndexCache::default();
        let outcome = engine
            .run_add(&catalog, &AddOptions::default(), &mut cache, &NoProgress)
            .unwrap();
        assert!(outcome
            .issues
            .iter()
            .any(|issue| issue.kind == IssueKind::MoveFailed));
        let original = env.root.join("x/y/z.mp3");
        assert!(original.is_file());
        assert!(env
            .store
            .find_by_path(catalog.id, &original.to_string_lossy())
            .unwrap()
            .is_some());
    }

    #[test]
    fn tag_ratings_are_stored_per_user() {
        let env = TestCatalog::new(GatherType::Music);
        write_media(&env.root, "a.mp3", "title=A\nrating=4\nrating=bob:2");
        let engine = reconciler(&env, |_| {});
        engine.add(env.catalog.id, &AddOptions::default(), &NoProgress).unwrap();

        let path = env.root.join("a.mp3");
        let record = env
            .store
            .find_by_path(env.catalog.id, &path.to_string_lossy())
            .unwrap()
            .unwrap();
        let mut ratings = env.store.ratings_for(record.id).unwrap();
        ratings.sort();
        assert_eq!(
            ratings,
            vec![("admin".to_string(), 4), ("bob".to_string(), 2)]
        );
    }

    #[test]
    fn gather_type_decides_which_files_count() {
        let env = TestCatalog::new(GatherType::Video);
        write_media(&env.root, "song.mp3", "title=A");
        write_media(&env.root, "clip.mkv", "title=Clip");
        let engine = reconciler(&env, |_| {});
        let outcome = engine.add(env.catalog.id, &AddOptions::default(), &NoProgress).unwrap();
        assert_eq!(outcome.stats.added, 1);
        let stats = env.store.stats_by_catalog(env.catalog.id).unwrap();
        assert_eq!(stats.videos, 1);
        assert_eq!(stats.songs, 0);
    }

    #[test]
    fn subdirectory_add_stays_inside_the_root() {
        let env = TestCatalog::new(GatherType::Music);
        write_media(&env.root, "keep/a.mp3", "title=A");
        write_media(&env.root, "other/b.mp3", "title=B");
        let engine = reconciler(&env, |_| {});

        let options = AddOptions {
            subdirectory: Some(PathBuf::from("keep")),
            ..AddOptions::default()
        };
        let outcome = engine.add(env.catalog.id, &options, &NoProgress).unwrap();
        assert_eq!(outcome.stats.added, 1);

        let escape = AddOptions {
            subdirectory: Some(PathBuf::from("../elsewhere")),
            ..AddOptions::default()
        };
        assert!(matches!(
            engine.add(env.catalog.id, &escape, &NoProgress),
            Err(CatalogError::InvalidPath(_))
        ));
    }

    #[test]
    fn busy_catalogs_are_refused() {
        let env = TestCatalog::new(GatherType::Music);
        let engine = reconciler(&env, |_| {});
        let _guard = engine.locks().try_lock(env.catalog.id).unwrap();
        assert!(matches!(
            engine.add(env.catalog.id, &AddOptions::default(), &NoProgress),
            Err(CatalogError::CatalogBusy(_))
        ));
    }

    #[test]
    fn progress_is_reported_while_walking() {
        let env = TestCatalog::new(GatherType::Music);
        for i in 0..4 {
            write_media(&env.root, &format!("{}.mp3", i), "title=T");
        }
        let engine = reconciler(&env, |config| config.progress_interval = 2);
        let ticks = Cell::new(0usize);
        let sink = |_count: usize, _label: &str| ticks.set(ticks.get() + 1);
        engine.add(env.catalog.id, &AddOptions::default(), &sink).unwrap();
        assert!(ticks.get() >= 2);
    }
}
