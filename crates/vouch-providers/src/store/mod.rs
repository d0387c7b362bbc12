//! Artifact-graph stores.

pub mod cached;
pub mod memory;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use vouch_core::{ReferrerStore, Registry};

pub use cached::CachingReferrerStore;
pub use memory::MemoryStore;

/// Store name → store built from its options.
pub type StoreRegistry = Registry<StoreOptions, Arc<dyn ReferrerStore>>;

/// Options for creating a graph store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreOptions {
    /// Registered store implementation to create.
    pub name: String,

    /// Referrers per page when the caller does not ask for a size.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_size: Option<usize>,

    /// Seconds to memoise subject descriptors and referrer pages in the
    /// current result cache. `0` disables the caching wrapper.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

fn default_cache_ttl_secs() -> u64 {
    10
}

impl StoreOptions {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            page_size: None,
            cache_ttl_secs: default_cache_ttl_secs(),
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size);
        self
    }

    pub fn without_cache(mut self) -> Self {
        self.cache_ttl_secs = 0;
        self
    }
}
