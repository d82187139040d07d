//! Provides the persistent tier: a file based cache with lazy, timestamp based tag invalidation.
//!
//! Each value is stored as a file along with a second file listing its tags. Invalidating a
//! tag never deletes anything. Instead, the current timestamp is recorded for the tag in a
//! manifest (see [RevalidationRegistry]). When a value is read, the modification time of its
//! file is compared against the revalidation timestamps of its tags: a value written at or
//! before the last revalidation of one of its tags is treated as missing.
//!
//! All file access is performed via the [FileSystem] trait, so that the cache can run on the
//! local disk ([DiskFileSystem]), in memory ([MemoryFileSystem]) or on any other storage.
//!
//! # Examples
//! ```
//! # use std::sync::Arc;
//! # use tiercache::persistent::{FileCache, MemoryFileSystem};
//! # #[tokio::main]
//! # async fn main() {
//! let cache = FileCache::new(Arc::new(MemoryFileSystem::new()), "cache");
//!
//! cache.set("products/42", b"{ \"name\": \"Widget\" }", &["products"]).await.unwrap();
//! assert_eq!(cache.get("products/42").await.is_some(), true);
//!
//! // Revalidating the tag renders the entry stale, without deleting its files...
//! cache.revalidate_tags(&["products"]).await;
//! assert_eq!(cache.get("products/42").await, None);
//! # }
//! ```
mod file_cache;
pub mod fs;
pub mod manifest;

pub use file_cache::FileCache;
pub use file_cache::PersistentEntry;
pub use fs::{DiskFileSystem, FileSystem, MemoryFileSystem};
pub use manifest::RevalidationRegistry;
