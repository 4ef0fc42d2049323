use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::{DirEntry, FilterEntry, IntoIter, WalkDir};

use crate::progress::{ProgressSink, Ticker};

#[derive(Clone, Debug)]
pub struct WalkOptions {
    pub follow_symlinks: bool,
    pub skip_hidden: bool,
    pub progress_every: usize,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            follow_symlinks: true,
            skip_hidden: true,
            progress_every: 1000,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WalkEntry {
    pub path: PathBuf,
    pub is_dir: bool,
    pub is_symlink: bool,
    pub depth: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WalkError {
    DirUnreadable { path: PathBuf, message: String },
    SymlinkLoop { path: PathBuf, ancestor: PathBuf },
    Entry { path: Option<PathBuf>, message: String },
}

impl WalkError {
    pub fn path(&self) -> Option<&Path> {
        match self {
            WalkError::DirUnreadable { path, .. } => Some(path),
            WalkError::SymlinkLoop { path, .. } => Some(path),
            WalkError::Entry { path, .. } => path.as_deref(),
        }
    }
}

impl std::fmt::Display for WalkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WalkError::DirUnreadable { path, message } => {
                write!(f, "unable to open {}: {}", path.display(), message)
            }
            WalkError::SymlinkLoop { path, ancestor } => write!(
                f,
                "symlink {} loops back to {}",
                path.display(),
                ancestor.display()
            ),
            WalkError::Entry { path, message } => match path {
                Some(path) => write!(f, "unable to read {}: {}", path.display(), message),
                None => write!(f, "unable to read entry: {}", message),
            },
        }
    }
}

/// Depth-first enumeration of a catalog tree. Never changes the working
/// directory; unreadable subtrees surface as errors and the walk goes on.
#[derive(Clone, Debug, Default)]
pub struct PathWalker {
    options: WalkOptions,
}

impl PathWalker {
    pub fn new(options: WalkOptions) -> Self {
        Self { options }
    }

    pub fn walk<'a>(&self, root: &Path, progress: &'a dyn ProgressSink) -> Walk<'a> {
        let filter: fn(&DirEntry) -> bool = if self.options.skip_hidden {
            is_visible
        } else {
            keep_all
        };
        let inner = WalkDir::new(root)
            .follow_links(self.options.follow_symlinks)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(filter);
        Walk {
            inner,
            ticker: Ticker::new(progress, self.options.progress_every),
        }
    }
}

pub struct Walk<'a> {
    inner: FilterEntry<IntoIter, fn(&DirEntry) -> bool>,
    ticker: Ticker<'a>,
}

impl Walk<'_> {
    /// Do not descend into the directory most recently yielded.
    pub fn skip_current_dir(&mut self) {
        self.inner.skip_current_dir();
    }

    pub fn visited(&self) -> usize {
        self.ticker.count()
    }
}

impl Iterator for Walk<'_> {
    type Item = Result<WalkEntry, WalkError>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.inner.next()?;
        let result = match item {
            Ok(entry) => {
                let walk_entry = WalkEntry {
                    path: entry.path().to_path_buf(),
                    is_dir: entry.file_type().is_dir(),
                    is_symlink: entry.path_is_symlink(),
                    depth: entry.depth(),
                };
                self.ticker.bump(&entry.path().to_string_lossy());
                Ok(walk_entry)
            }
            Err(err) => Err(classify_error(err)),
        };
        Some(result)
    }
}

fn classify_error(err: walkdir::Error) -> WalkError {
    let path = err.path().map(Path::to_path_buf);
    if let Some(ancestor) = err.loop_ancestor() {
        let walk_error = WalkError::SymlinkLoop {
            path: path.unwrap_or_default(),
            ancestor: ancestor.to_path_buf(),
        };
        debug!("{}", walk_error);
        return walk_error;
    }
    let message = match err.io_error() {
        Some(io) => io.to_string(),
        None => err.to_string(),
    };
    match path {
        Some(path) if path.is_dir() || err.depth() == 0 => WalkError::DirUnreadable { path, message },
        path => WalkError::Entry { path, message },
    }
}

fn is_visible(entry: &DirEntry) -> bool {
    if entry.depth() == 0 {
        return true;
    }
    !entry.file_name().to_string_lossy().starts_with('.')
}

fn keep_all(_entry: &DirEntry) -> bool {
    true
}
