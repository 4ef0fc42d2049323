use std::collections::HashMap;

use common::{casefold_path, CatalogId, MediaKind, RecordId};
use tracing::debug;

use crate::error::Result;
use crate::store::IndexStore;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CachedMedia {
    pub id: RecordId,
    pub kind: MediaKind,
}

/// Run-scoped set of paths already in the index for one catalog, keyed by
/// case-folded path. Built once when a pass starts and dropped with it.
#[derive(Debug, Default)]
pub struct IndexCache {
    entries: HashMap<String, CachedMedia>,
}

impl IndexCache {
    pub fn build(store: &dyn IndexStore, catalog: CatalogId, chunk_size: usize) -> Result<Self> {
        let chunk_size = chunk_size.max(1);
        let mut cache = Self::default();
        for kind in MediaKind::ALL {
            let mut after = None;
            loop {
                let page = store.records_by_catalog(catalog, kind, after, chunk_size)?;
                let last = match page.last() {
                    Some(record) => record.id,
                    None => break,
                };
                for record in &page {
                    cache.insert(&record.path, record.id, kind);
                }
                if page.len() < chunk_size {
                    break;
                }
                after = Some(last);
            }
        }
        debug!("Index cache for catalog {} holds {} paths", catalog, cache.len());
        Ok(cache)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(&casefold_path(path))
    }

    pub fn lookup(&self, path: &str) -> Option<CachedMedia> {
        self.entries.get(&casefold_path(path)).copied()
    }

    pub fn insert(&mut self, path: &str, id: RecordId, kind: MediaKind) {
        self.entries.insert(casefold_path(path), CachedMedia { id, kind });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Case-folded keys, sorted.
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.entries.keys().cloned().collect();
        paths.sort();
        paths
    }
}
