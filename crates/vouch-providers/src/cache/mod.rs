//! Result cache implementations.

pub mod memory;

use std::sync::Arc;

use vouch_core::cache::{CacheConfig, ResultCache};
use vouch_core::CurrentRegistry;

pub use memory::MemoryCache;

/// Cache provider name → cache, with the process-wide current cache.
pub type CacheRegistry = CurrentRegistry<CacheConfig, Arc<dyn ResultCache>>;
