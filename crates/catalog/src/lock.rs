use std::collections::HashSet;
use std::sync::Arc;

use common::CatalogId;
use parking_lot::Mutex;

use crate::error::{CatalogError, Result};

/// Set of catalogs with a pass in flight. Clones share the same set.
#[derive(Clone, Debug, Default)]
pub struct CatalogLocks {
    busy: Arc<Mutex<HashSet<CatalogId>>>,
}

impl CatalogLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `catalog` until the returned guard is dropped.
    pub fn try_lock(&self, catalog: CatalogId) -> Result<CatalogGuard> {
        let mut busy = self.busy.lock();
        if !busy.insert(catalog) {
            return Err(CatalogError::CatalogBusy(catalog));
        }
        Ok(CatalogGuard {
            busy: self.busy.clone(),
            catalog,
        })
    }

    pub fn is_locked(&self, catalog: CatalogId) -> bool {
        self.busy.lock().contains(&catalog)
    }
}

#[derive(Debug)]
pub struct CatalogGuard {
    busy: Arc<Mutex<HashSet<CatalogId>>>,
    catalog: CatalogId,
}

impl Drop for CatalogGuard {
    fn drop(&mut self) {
        self.busy.lock().remove(&self.catalog);
    }
}
