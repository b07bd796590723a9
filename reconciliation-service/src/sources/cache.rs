use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use tagging_core::Table;

use super::{LoadError, SourceLocation, TableSource};

/// Loaded tables keyed by source location.
///
/// Entries live until invalidated; nothing expires on its own. The engine
/// works the same with or without a cache in front of the source.
#[derive(Debug, Default)]
pub struct TableCache {
    entries: Mutex<HashMap<SourceLocation, Arc<Table>>>,
}

impl TableCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<SourceLocation, Arc<Table>>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get_or_load<S>(&self, source: &S, location: &SourceLocation) -> Result<Arc<Table>, LoadError>
    where
        S: TableSource + ?Sized,
    {
        if let Some(hit) = self.entries().get(location).cloned() {
            metrics::counter!("table_cache_hits_total").increment(1);
            return Ok(hit);
        }

        metrics::counter!("table_cache_misses_total").increment(1);
        // Load outside the lock; a concurrent miss on the same key just loads twice.
        let table = Arc::new(source.load(location)?);
        self.entries()
            .entry(location.clone())
            .or_insert_with(|| table.clone());
        Ok(table)
    }

    pub fn invalidate(&self, location: &SourceLocation) -> bool {
        self.entries().remove(location).is_some()
    }

    /// Drops every entry and returns how many there were.
    pub fn clear(&self) -> usize {
        let mut entries = self.entries();
        let n = entries.len();
        entries.clear();
        n
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[derive(Default)]
    struct CountingSource {
        loads: AtomicUsize,
    }

    impl TableSource for CountingSource {
        fn load(&self, location: &SourceLocation) -> Result<Table, LoadError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            if location.path.ends_with("missing.csv") {
                return Err(LoadError::Open {
                    path: location.path.clone(),
                    reason: "not found".to_string(),
                });
            }
            Ok(Table::new(vec!["msn".to_string()], vec![vec!["a".to_string()]]))
        }
    }

    #[test]
    fn second_load_is_served_from_cache() {
        let source = CountingSource::default();
        let cache = TableCache::new();
        let loc = SourceLocation::file("outage.csv");

        let a = cache.get_or_load(&source, &loc).unwrap();
        let b = cache.get_or_load(&source, &loc).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(source.loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn invalidate_forces_reload() {
        let source = CountingSource::default();
        let cache = TableCache::new();
        let loc = SourceLocation::file("outage.csv");

        cache.get_or_load(&source, &loc).unwrap();
        assert!(cache.invalidate(&loc));
        assert!(!cache.invalidate(&loc));
        cache.get_or_load(&source, &loc).unwrap();
        assert_eq!(source.loads.load(Ordering::SeqCst), 2);
        assert_eq!(cache.clear(), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn failed_loads_are_not_cached() {
        let source = CountingSource::default();
        let cache = TableCache::new();
        let loc = SourceLocation::file("missing.csv");

        assert!(cache.get_or_load(&source, &loc).is_err());
        assert!(cache.get_or_load(&source, &loc).is_err());
        assert_eq!(source.loads.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 0);
    }
}
