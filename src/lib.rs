//! Tiercache provides a two tier cache with tag based invalidation.
//!
//! # Introduction
//! Caching computed data (rendered pages, API responses, search results) is easy. Getting rid of
//! it once the underlying data changes is the hard part. Therefore each entry in this cache
//! carries a set of **tags** (e.g. `products` or `user-42`). Once the data behind a tag changes,
//! all entries carrying this tag are invalidated in one go via `revalidate_tags`.
//!
//! # Tiers
//! * **Memory**: [MemoryCache](memory::MemoryCache) is a size constrained LRU cache. Each entry
//!   is sized by serializing it and lives for a fixed TTL. Revalidating a tag removes all
//!   matching entries immediately.
//! * **Persistent**: [FileCache](persistent::FileCache) stores each value as a file along with
//!   a file containing its tags. Revalidating a tag doesn't delete any file. Rather, the
//!   revalidation timestamp is recorded in a manifest and every file which is older than the
//!   last revalidation of one of its tags is treated as missing.
//!
//! Both tiers are independent. If an application uses both for the same data, it has to write
//! and revalidate both.
//!
//! # Examples
//! ```
//! # use std::sync::Arc;
//! # use tiercache::config::Settings;
//! # use tiercache::memory::MemoryCache;
//! # use tiercache::persistent::{FileCache, MemoryFileSystem};
//! # #[tokio::main]
//! # async fn main() {
//! let settings = Settings::parse("
//! memory:
//!     max_size: 1m
//!     ttl: 5m
//! persistent:
//!     dir: cache
//! ").unwrap();
//!
//! let mut memory = MemoryCache::for_strings(settings.memory.as_ref().unwrap());
//! let files = FileCache::from_settings(
//!     Arc::new(MemoryFileSystem::new()),
//!     settings.persistent.as_ref().unwrap(),
//! );
//!
//! memory.set("home", "<html>...</html>".to_owned(), &["pages"]);
//! files.set("home", b"<html>...</html>", &["pages"]).await.unwrap();
//!
//! memory.revalidate_tags(&["pages"]);
//! files.revalidate_tags(&["pages"]).await;
//!
//! assert_eq!(memory.get("home").is_none(), true);
//! assert_eq!(files.get("home").await.is_none(), true);
//! # }
//! ```
#![deny(
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unused_extern_crates,
    unused_import_braces,
    unused_results
)]
use simplelog::{format_description, ConfigBuilder, LevelFilter, SimpleLogger};
use std::sync::Once;

pub mod config;
pub mod fmt;
pub mod memory;
pub mod persistent;

/// Contains the version of the library.
pub const TIERCACHE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initializes the logging system.
///
/// Diagnostics of the caches (hits, misses, evictions) are logged on debug level if the `debug`
/// flag is set in their settings. Applications which bring their own logger can skip this.
pub fn init_logging() {
    static INIT_LOGGING: Once = Once::new();

    // Tests might call this several times...
    INIT_LOGGING.call_once(|| {
        if let Err(error) = SimpleLogger::init(
            LevelFilter::Debug,
            ConfigBuilder::new()
                .set_time_format_custom(format_description!(
                    "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]"
                ))
                .set_thread_level(LevelFilter::Trace)
                .set_target_level(LevelFilter::Error)
                .set_location_level(LevelFilter::Trace)
                .build(),
        ) {
            eprintln!("Failed to initialize logging system: {}", error);
        }
    });
}

#[cfg(test)]
mod testing {
    use crate::persistent::{FileSystem, MemoryFileSystem};
    use std::path::{Path, PathBuf};
    use std::time::SystemTime;

    /// Executes async code within a single threaded tokio runtime.
    pub fn test_async<F: std::future::Future>(future: F) {
        use tokio::runtime;

        crate::init_logging();

        let rt = runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let _ = rt.block_on(future);
    }

    /// Provides an empty directory below **target** which is exclusively used by a single test.
    pub async fn test_dir(name: &str) -> PathBuf {
        let mut path = Path::new("target").to_path_buf();
        path.push("tiercache-tests");
        path.push(name);

        if tokio::fs::metadata(&path).await.is_ok() {
            tokio::fs::remove_dir_all(&path).await.unwrap();
        }
        tokio::fs::create_dir_all(&path).await.unwrap();

        path
    }

    /// Accepts reads but rejects every write.
    #[derive(Default)]
    pub struct ReadOnlyFileSystem(MemoryFileSystem);

    #[async_trait::async_trait]
    impl FileSystem for ReadOnlyFileSystem {
        fn exists(&self, path: &Path) -> bool {
            self.0.exists(path)
        }

        async fn read(&self, path: &Path) -> anyhow::Result<Vec<u8>> {
            self.0.read(path).await
        }

        fn read_sync(&self, path: &Path) -> anyhow::Result<Vec<u8>> {
            self.0.read_sync(path)
        }

        async fn write(&self, path: &Path, _data: &[u8]) -> anyhow::Result<()> {
            Err(anyhow::anyhow!(
                "Cannot write {}: read only file system",
                path.to_string_lossy()
            ))
        }

        async fn create_dir_all(&self, path: &Path) -> anyhow::Result<()> {
            self.0.create_dir_all(path).await
        }

        async fn modified(&self, path: &Path) -> anyhow::Result<SystemTime> {
            self.0.modified(path).await
        }
    }
}
