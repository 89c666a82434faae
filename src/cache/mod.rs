//! Home index response cache.
//!
//! The rendered `GET /` response is kept for a fixed interval after the first
//! render and replayed verbatim until it expires or [`ResponseCache::clear`]
//! is called. Nothing else invalidates it: new or deleted posts stay
//! invisible on the index until then.
//!
//! ```toml
//! [cache]
//! index_ttl_seconds = 20
//! max_entries = 256
//! ```

mod keys;
mod lock;
mod middleware;
mod store;

pub use keys::{INDEX_KEY_PREFIX, hash_value, index_key};
pub use middleware::{IndexCacheState, index_cache_layer};
pub use store::{CachedResponse, ResponseCache};
