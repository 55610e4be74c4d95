//! Block cache for decoded data blocks.
//!
//! Caching is optional: a reader without a cache simply decompresses every
//! block it is asked for. The cache hands out independent views, so a scanner
//! advancing its cursor never disturbs the cached copy.

mod lru;

pub use lru::{BlockCache, CacheKey, CacheStats};
