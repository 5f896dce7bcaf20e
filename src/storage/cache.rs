//! Bounded cache of read-query results

use crate::table::{Table, Value};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard, PoisonError};

pub const DEFAULT_QUERY_CACHE_CAPACITY: usize = 128;

/// Least-recently-used cache keyed by query text plus serialized parameters
///
/// Cached results go stale when the store is written to, so the owner must
/// call [`QueryCache::clear`] on every write.
pub struct QueryCache {
    entries: Mutex<LruCache<String, Table>>,
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(DEFAULT_QUERY_CACHE_CAPACITY)
    }
}

impl QueryCache {
    /// A capacity of zero is raised to one
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn entries(&self) -> MutexGuard<'_, LruCache<String, Table>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn key(query: &str, params: &[Value]) -> String {
        let params = serde_json::to_string(params).unwrap_or_default();
        format!("{}\u{1f}{}", query, params)
    }

    pub fn get(&self, key: &str) -> Option<Table> {
        self.entries().get(key).cloned()
    }

    pub fn put(&self, key: String, table: Table) {
        self.entries().put(key, table);
    }

    pub fn clear(&self) {
        self.entries().clear();
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
    use super::*;
    use crate::table::Record;

    fn table(n: f64) -> Table {
        Table::from_records(vec![Record::new().with("n", n)])
    }

    #[test]
    fn test_key_includes_params() {
        let a = QueryCache::key("SELECT ?", &[Value::Integer(1)]);
        let b = QueryCache::key("SELECT ?", &[Value::Integer(2)]);
        let c = QueryCache::key("SELECT ?", &[Value::from("1")]);
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, QueryCache::key("SELECT ?", &[Value::Integer(1)]));
    }

    #[test]
    fn test_least_recently_used_is_evicted() {
        let cache = QueryCache::new(2);
        cache.put("a".to_string(), table(1.0));
        cache.put("b".to_string(), table(2.0));
        assert!(cache.get("a").is_some());

        cache.put("c".to_string(), table(3.0));

        assert_eq!(cache.len(), 2);
        assert!(cache.get("b").is_none());
        assert_eq!(cache.get("a"), Some(table(1.0)));
    }

    #[test]
    fn test_clear() {
        let cache = QueryCache::default();
        cache.put("a".to_string(), table(1.0));
        cache.clear();
        assert!(cache.is_empty());
    }
}
