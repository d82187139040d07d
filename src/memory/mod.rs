//! Provides the memory tier: a size constrained LRU cache with tag based invalidation.
//!
//! An LRU cache drops the least recently used entry once it is about to grow beyond its size
//! limit. Reading an entry via **get** or probing it via **has** marks it as recently used,
//! just like storing it does.
//!
//! In contrast to the [persistent tier](crate::persistent), tags are revalidated eagerly here:
//! calling [revalidate_tags](MemoryCache::revalidate_tags) immediately removes all entries
//! carrying one of the given tags.
//!
//! Note that the cache is single threaded (all lookups require `&mut self` as they change the
//! recency order). Wrap it into a **Mutex** to share it between tasks.
mod lru_cache;

pub use lru_cache::MemoryCache;
pub use lru_cache::MemoryEntry;
pub use lru_cache::Serializer;
