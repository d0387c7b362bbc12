//! Result cache contract.
//!
//! The cache sits in front of graph-store, verification and credential calls.
//! It is the one component shared and mutated concurrently by every in-flight
//! request, so implementations must be `Send + Sync` and never block on I/O.
//!
//! A `false` from [`ResultCache::set`] or [`ResultCache::set_with_ttl`] means
//! "not guaranteed cached", never an error: callers recompute on the next miss.

pub mod keys;

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::code::CONFIG_INVALID;
use crate::errors::{ComponentType, Result};

pub use keys::CacheKey;

/// Value stored in the cache. Shared so reads never deep-copy.
pub type CacheValue = Arc<serde_json::Value>;

/// Bounded, TTL-aware, concurrently accessible result cache.
pub trait ResultCache: Send + Sync {
    /// Look up `key`. Expired or deleted entries are never returned.
    fn get(&self, key: &str) -> Option<CacheValue>;

    /// Store `value` without an expiry.
    fn set(&self, key: &str, value: serde_json::Value) -> bool;

    /// Store `value` for `ttl`. A zero `ttl` uses the cache's default TTL.
    fn set_with_ttl(&self, key: &str, value: serde_json::Value, ttl: Duration) -> bool;

    fn delete(&self, key: &str);

    fn clear(&self);
}

/// Typed access on top of the JSON values a [`ResultCache`] stores.
pub trait ResultCacheExt: ResultCache {
    /// Decode the cached value as `T`. Undecodable entries count as a miss.
    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get(key)?;
        match T::deserialize(value.as_ref()) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                debug!(key, error = %e, "cached value does not decode, treating as miss");
                None
            }
        }
    }

    /// Encode and store `value`. `ttl = None` stores without expiry.
    fn set_json<T: Serialize>(&self, key: &str, value: &T, ttl: Option<Duration>) -> bool {
        let encoded = match serde_json::to_value(value) {
            Ok(encoded) => encoded,
            Err(e) => {
                debug!(key, error = %e, "value does not encode, not caching");
                return false;
            }
        };
        match ttl {
            Some(ttl) => self.set_with_ttl(key, encoded, ttl),
            None => self.set(key, encoded),
        }
    }
}

impl<C: ResultCache + ?Sized> ResultCacheExt for C {}

// ==================== Configuration ====================

/// Result cache configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheConfig {
    /// Registered cache implementation to create.
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Maximum number of entries (each entry costs 1).
    #[serde(default = "default_max_entries")]
    pub max_entries: u64,

    /// TTL applied when an entry is stored with a zero TTL. `0` disables it.
    #[serde(default = "default_ttl_secs")]
    pub default_ttl_secs: u64,
}

fn default_provider() -> String {
    "memory".to_string()
}

fn default_max_entries() -> u64 {
    10_000
}

fn default_ttl_secs() -> u64 {
    10
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            max_entries: default_max_entries(),
            default_ttl_secs: default_ttl_secs(),
        }
    }
}

impl CacheConfig {
    /// Create config from environment variables.
    ///
    /// | Variable | Description |
    /// |----------|-------------|
    /// | `VOUCH_CACHE_PROVIDER` | Cache implementation name (default: `memory`) |
    /// | `VOUCH_CACHE_MAX_ENTRIES` | Entry bound (default: 10000) |
    /// | `VOUCH_CACHE_TTL_SECS` | Default TTL in seconds (default: 10) |
    pub fn from_env() -> Self {
        Self {
            provider: std::env::var("VOUCH_CACHE_PROVIDER")
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or_else(default_provider),
            max_entries: std::env::var("VOUCH_CACHE_MAX_ENTRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_max_entries),
            default_ttl_secs: std::env::var("VOUCH_CACHE_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_ttl_secs),
        }
    }

    pub fn with_max_entries(mut self, max_entries: u64) -> Self {
        self.max_entries = max_entries;
        self
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl_secs = ttl.as_secs();
        self
    }

    /// Default TTL, if enabled.
    pub fn default_ttl(&self) -> Option<Duration> {
        (self.default_ttl_secs > 0).then(|| Duration::from_secs(self.default_ttl_secs))
    }

    pub fn validate(&self) -> Result<()> {
        if self.provider.trim().is_empty() {
            return Err(CONFIG_INVALID
                .with_detail("cache provider name is empty")
                .with_component_type(ComponentType::Cache));
        }
        if self.max_entries == 0 {
            return Err(CONFIG_INVALID
                .with_detail("cache maxEntries must be greater than zero")
                .with_component_type(ComponentType::Cache)
                .with_remediation("set maxEntries (or VOUCH_CACHE_MAX_ENTRIES) to a positive value"));
        }
        Ok(())
    }
}
