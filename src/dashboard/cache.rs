//! Read-through cache of loaded prediction reports

use crate::report::{read_report, ReportRow};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Reports keyed by file path, loaded on first access and kept until
/// explicitly invalidated
#[derive(Debug, Default)]
pub struct ReportCache {
    entries: Mutex<HashMap<PathBuf, Arc<[ReportRow]>>>,
}

impl ReportCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached rows for `path`, reading the file on a miss
    pub fn get_or_load(&self, path: &Path) -> crate::Result<Arc<[ReportRow]>> {
        let mut entries = self.lock();
        if let Some(rows) = entries.get(path) {
            return Ok(Arc::clone(rows));
        }

        let rows: Arc<[ReportRow]> = read_report(path)?.into();
        entries.insert(path.to_path_buf(), Arc::clone(&rows));
        tracing::info!(path = %path.display(), rows = rows.len(), "report cached");
        Ok(rows)
    }

    /// Drop the entry for `path`; returns whether anything was cached
    pub fn invalidate(&self, path: &Path) -> bool {
        let removed = self.lock().remove(path).is_some();
        if removed {
            tracing::info!(path = %path.display(), "report cache invalidated");
        }
        removed
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // A panic while holding the lock cannot leave a half-written entry
    fn lock(&self) -> MutexGuard<'_, HashMap<PathBuf, Arc<[ReportRow]>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
