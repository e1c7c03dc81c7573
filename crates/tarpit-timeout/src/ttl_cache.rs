//! A TTL-evicting map, grounded on the original's use of
//! `patrickmn/go-cache` for both the hot and cold timeout caches:
//! every entry carries its own expiry, reads check it lazily, and a
//! background sweep clears anything nobody has touched.
//!
//! Built on `dashmap` rather than a single mutex so the "reads and
//! writes are lock-free at the cache API" requirement (spec.md
//! section 5) holds under concurrent peers -- `DashMap` shards its
//! internal locking per-bucket instead of taking one lock for the
//! whole map.

use std::hash::Hash;
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

pub struct TtlCache<K, V> {
    entries: DashMap<K, Entry<V>>,
    ttl: Duration,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if entry.expires_at > now {
                return Some(entry.value.clone());
            }
        }
        None
    }

    pub fn contains(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    pub fn insert(&self, key: K, value: V) {
        self.entries.insert(
            key,
            Entry {
                value,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    /// Removes a single entry, regardless of whether its TTL has
    /// elapsed yet.
    pub fn remove(&self, key: &K) {
        self.entries.remove(key);
    }

    /// Removes every entry whose TTL has elapsed. Run on a periodic
    /// sweep task; lookups already self-filter expired entries, so
    /// this only matters for reclaiming memory from peers who stop
    /// being seen.
    pub fn sweep_expired(&self) {
        let now = Instant::now();
        self.entries.retain(|_, entry| entry.expires_at > now);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let cache = TtlCache::new(Duration::from_millis(10));
        cache.insert("peer", 42);
        assert_eq!(cache.get(&"peer"), Some(42));

        tokio::time::advance(Duration::from_millis(11)).await;
        assert_eq!(cache.get(&"peer"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_removes_expired_entries() {
        let cache = TtlCache::new(Duration::from_millis(10));
        cache.insert("peer", 1);
        tokio::time::advance(Duration::from_millis(11)).await;
        cache.sweep_expired();
        assert!(cache.is_empty());
    }
}
