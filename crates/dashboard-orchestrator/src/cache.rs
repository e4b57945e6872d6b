use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

pub const DEFAULT_TTL_SECS: i64 = 300; // 5 minutes

/// Internal cache entry with timestamp
struct CacheEntry<T> {
    data: T,
    cached_at: DateTime<Utc>,
}

/// Keyed cache whose entries expire `ttl` after insertion.
///
/// Expired entries are dropped lazily on lookup, or eagerly via `purge_expired`.
pub struct TtlCache<V> {
    entries: DashMap<String, CacheEntry<V>>,
    ttl: Duration,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl_secs: i64) -> Self {
        Self {
            entries: DashMap::new(),
            ttl: Duration::seconds(ttl_secs.max(0)),
        }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let fresh = {
            let entry = self.entries.get(key)?;
            if Utc::now() - entry.cached_at < self.ttl {
                Some(entry.data.clone())
            } else {
                None
            }
        };
        if fresh.is_none() {
            self.entries.remove(key);
        }
        fresh
    }

    pub fn insert(&self, key: impl Into<String>, data: V) {
        self.entries.insert(
            key.into(),
            CacheEntry {
                data,
                cached_at: Utc::now(),
            },
        );
    }

    /// Remove every expired entry, returning how many were dropped
    pub fn purge_expired(&self) -> usize {
        let before = self.entries.len();
        let now = Utc::now();
        self.entries.retain(|_, entry| now - entry.cached_at < self.ttl);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<V: Clone> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new(DEFAULT_TTL_SECS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_returns_fresh_entry() {
        let cache: TtlCache<Vec<f64>> = TtlCache::new(60);
        cache.insert("AAPL:14", vec![1.0, 2.0]);
        assert_eq!(cache.get("AAPL:14"), Some(vec![1.0, 2.0]));
        assert_eq!(cache.get("MSFT:14"), None);
    }

    #[test]
    fn test_zero_ttl_never_hits() {
        let cache: TtlCache<u32> = TtlCache::new(0);
        cache.insert("AAPL", 1);
        assert_eq!(cache.get("AAPL"), None);
        // expired entry is dropped on lookup
        assert!(cache.is_empty());
    }

    #[test]
    fn test_purge_expired() {
        let cache: TtlCache<u32> = TtlCache::new(0);
        cache.insert("A", 1);
        cache.insert("B", 2);
        assert_eq!(cache.purge_expired(), 2);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_insert_overwrites() {
        let cache: TtlCache<u32> = TtlCache::default();
        cache.insert("A", 1);
        cache.insert("A", 2);
        assert_eq!(cache.get("A"), Some(2));
        assert_eq!(cache.len(), 1);
    }
}
