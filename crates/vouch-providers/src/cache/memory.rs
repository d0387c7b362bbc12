//! Bounded in-memory result cache.
//!
//! Backed by `moka`: TinyLFU admission with a frequency sketch sized from the
//! entry bound, and per-entry expiry. Every entry costs 1, so the capacity is
//! an entry count.

use std::sync::Arc;
use std::time::{Duration, Instant};

use moka::sync::Cache;
use moka::Expiry;
use tracing::{debug, trace};

use vouch_core::cache::{CacheConfig, CacheValue, ResultCache};
use vouch_core::Result;

/// Registered name of this cache.
pub const NAME: &str = "memory";

#[derive(Debug, Clone)]
struct Entry {
    value: CacheValue,
    ttl: Option<Duration>,
}

/// Expiry read from the entry itself.
struct EntryExpiry;

impl Expiry<String, Entry> for EntryExpiry {
    fn expire_after_create(&self, _key: &String, entry: &Entry, _created_at: Instant) -> Option<Duration> {
        entry.ttl
    }

    fn expire_after_update(
        &self,
        _key: &String,
        entry: &Entry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        entry.ttl
    }
}

pub struct MemoryCache {
    entries: Cache<String, Entry>,
    default_ttl: Option<Duration>,
}

impl MemoryCache {
    pub fn new(config: &CacheConfig) -> Result<Self> {
        config.validate()?;
        debug!(
            max_entries = config.max_entries,
            default_ttl_secs = config.default_ttl_secs,
            "creating memory result cache"
        );
        Ok(Self {
            entries: Cache::builder()
                .name("vouch-result-cache")
                .max_capacity(config.max_entries)
                .expire_after(EntryExpiry)
                .build(),
            default_ttl: config.default_ttl(),
        })
    }

    /// Factory registered under [`NAME`].
    pub fn create(config: CacheConfig) -> Result<Arc<dyn ResultCache>> {
        Ok(Arc::new(Self::new(&config)?))
    }

    fn insert(&self, key: &str, value: serde_json::Value, ttl: Option<Duration>) -> bool {
        if key.is_empty() {
            debug!("rejecting cache entry with empty key");
            return false;
        }
        self.entries.insert(
            key.to_string(),
            Entry {
                value: Arc::new(value),
                ttl,
            },
        );
        true
    }

    /// Approximate number of live entries.
    pub fn entry_count(&self) -> u64 {
        self.entries.run_pending_tasks();
        self.entries.entry_count()
    }
}

impl ResultCache for MemoryCache {
    fn get(&self, key: &str) -> Option<CacheValue> {
        let hit = self.entries.get(key).map(|entry| entry.value);
        trace!(key, hit = hit.is_some(), "cache lookup");
        hit
    }

    fn set(&self, key: &str, value: serde_json::Value) -> bool {
        self.insert(key, value, None)
    }

    fn set_with_ttl(&self, key: &str, value: serde_json::Value, ttl: Duration) -> bool {
        let ttl = if ttl.is_zero() { self.default_ttl } else { Some(ttl) };
        self.insert(key, value, ttl)
    }

    fn delete(&self, key: &str) {
        self.entries.invalidate(key);
    }

    fn clear(&self) {
        self.entries.invalidate_all();
    }
}

impl std::fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCache")
            .field("max_capacity", &self.entries.policy().max_capacity())
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use vouch_core::cache::{CacheKey, ResultCacheExt};
    use vouch_core::errors::code::CONFIG_INVALID;

    fn cache() -> MemoryCache {
        MemoryCache::new(&CacheConfig::default().with_max_entries(100)).unwrap()
    }

    #[test]
    fn test_set_then_get() {
        let cache = cache();
        assert!(cache.set("k", json!({"ok": true})));
        assert_eq!(*cache.get("k").unwrap(), json!({"ok": true}));
        assert!(cache.get("missing").is_none());
    }

    #[test]
    fn test_delete_and_clear() {
        let cache = cache();
        cache.set("a", json!(1));
        cache.set("b", json!(2));

        cache.delete("a");
        assert!(cache.get("a").is_none());
        assert!(cache.get("b").is_some());

        cache.clear();
        assert!(cache.get("b").is_none());
    }

    #[test]
    fn test_empty_key_rejected() {
        assert!(!cache().set("", json!(1)));
    }

    #[test]
    fn test_overwrite_is_visible() {
        let cache = cache();
        cache.set("k", json!("old"));
        cache.set("k", json!("new"));
        assert_eq!(*cache.get("k").unwrap(), json!("new"));
    }

    #[tokio::test]
    async fn test_entry_expires() {
        let cache = cache();
        assert!(cache.set_with_ttl("short", json!(1), Duration::from_millis(200)));
        assert!(cache.set("forever", json!(2)));
        assert!(cache.get("short").is_some());

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(cache.get("short").is_none());
        assert!(cache.get("forever").is_some());
    }

    #[tokio::test]
    async fn test_zero_ttl_uses_default() {
        let config = CacheConfig::default()
            .with_max_entries(10)
            .with_default_ttl(Duration::from_secs(1));
        let cache = MemoryCache::new(&config).unwrap();
        cache.set_with_ttl("k", json!(1), Duration::ZERO);
        assert!(cache.get("k").is_some());

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(cache.get("k").is_none());
    }

    #[test]
    fn test_capacity_is_bounded() {
        let cache = MemoryCache::new(&CacheConfig::default().with_max_entries(10)).unwrap();
        for i in 0..200 {
            cache.set(&format!("k{}", i), json!(i));
        }
        assert!(cache.entry_count() <= 10);
    }

    #[test]
    fn test_typed_helpers() {
        let cache = cache();
        let key = CacheKey::SubjectDescriptor.key("app:v1");
        assert!(cache.set_json(&key, &vec!["a", "b"], None));
        let back: Vec<String> = cache.get_json(&key).unwrap();
        assert_eq!(back, vec!["a", "b"]);
        assert!(cache.get_json::<u64>(&key).is_none());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let err = MemoryCache::create(CacheConfig::default().with_max_entries(0))
            .err()
            .unwrap();
        assert_eq!(err.code(), CONFIG_INVALID);
    }
}
