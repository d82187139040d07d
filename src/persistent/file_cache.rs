use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

use anyhow::Context;

use crate::config::PersistentSettings;
use crate::persistent::fs::FileSystem;
use crate::persistent::manifest::RevalidationRegistry;

/// Contains the name of the sub directory which holds the tag files.
const TAGS_DIR: &str = "tags";

/// Represents a value read from a [FileCache].
#[derive(Clone, Debug, PartialEq)]
pub struct PersistentEntry {
    /// The cached data.
    pub value: Vec<u8>,
    /// The tags stored along with the data.
    pub tags: Vec<String>,
    /// The modification timestamp of the value file.
    pub last_modified: SystemTime,
}

/// Stores values along with their tags as files.
///
/// Each key is mapped onto two files: `<dir>/<key>` contains the raw value and
/// `<dir>/tags/<key>` contains the tags as JSON array. Revalidating a tag doesn't delete any
/// of these files. It rather records the current timestamp in the [RevalidationRegistry]. When
/// reading a value, the modification time of its file is compared against the revalidation
/// timestamps of its tags to determine if it is still valid.
///
/// Note that keys may contain `/` to create sub directories. Keys are not sanitized in any way,
/// therefore a key like `../foo` will escape the cache directory.
pub struct FileCache {
    fs: Arc<dyn FileSystem>,
    dir: PathBuf,
    debug: bool,
    registry: RevalidationRegistry,
}

impl FileCache {
    /// Creates a new cache which stores its files in the given directory.
    pub fn new(fs: Arc<dyn FileSystem>, dir: impl Into<PathBuf>) -> Self {
        FileCache::from_settings(fs, &PersistentSettings::new(dir))
    }

    /// Creates a new cache based on the given settings.
    pub fn from_settings(fs: Arc<dyn FileSystem>, settings: &PersistentSettings) -> Self {
        FileCache {
            registry: RevalidationRegistry::new(
                fs.clone(),
                settings.dir.clone(),
                &settings.base_tags,
            ),
            fs,
            dir: settings.dir.clone(),
            debug: settings.debug,
        }
    }

    /// Provides access to the registry which tracks tag revalidations.
    pub fn registry(&self) -> &RevalidationRegistry {
        &self.registry
    }

    /// Returns the path of the file which stores the value for the given key.
    pub fn value_path(&self, key: &str) -> PathBuf {
        self.resolve(None, key)
    }

    /// Returns the path of the file which stores the tags for the given key.
    pub fn tags_path(&self, key: &str) -> PathBuf {
        self.resolve(Some(TAGS_DIR), key)
    }

    fn resolve(&self, prefix: Option<&str>, key: &str) -> PathBuf {
        let mut result = self.dir.clone();
        if let Some(prefix) = prefix {
            result.push(prefix);
        }

        for element in key.split('/').filter(|element| !element.is_empty()) {
            result.push(element);
        }

        result
    }

    /// Returns the value stored for the given key.
    ///
    /// Yields **None** if there is no value, if the stored data is unreadable or if any of its
    /// tags has been revalidated since the value was written.
    pub async fn get(&self, key: &str) -> Option<PersistentEntry> {
        match self.lookup(key).await {
            Ok(Some(entry)) => {
                if self.debug {
                    log::debug!("File cache HIT: {}", key);
                }
                Some(entry)
            }
            Ok(None) => {
                if self.debug {
                    log::debug!("File cache SKIP: {} (expired)", key);
                }
                None
            }
            Err(error) => {
                if self.debug {
                    log::debug!("File cache SKIP: {} ({:#})", key, error);
                }
                None
            }
        }
    }

    async fn lookup(&self, key: &str) -> anyhow::Result<Option<PersistentEntry>> {
        let value_path = self.value_path(key);
        let tags_path = self.tags_path(key);

        let (value, tags) = tokio::join!(self.fs.read(&value_path), self.fs.read(&tags_path));
        let value = value.context("Failed to read value file.")?;
        let tags = tags.context("Failed to read tags file.")?;

        if value.is_empty() {
            return Err(anyhow::anyhow!("Empty value file."));
        }

        let last_modified = self.fs.modified(&value_path).await?;
        let tags: Vec<String> = serde_json::from_slice(&tags).context("Malformed tags file.")?;

        if self.registry.is_expired(&tags, last_modified).await {
            return Ok(None);
        }

        Ok(Some(PersistentEntry {
            value,
            tags,
            last_modified,
        }))
    }

    /// Stores the given value along with its tags.
    ///
    /// # Errors
    /// Fails if either the directories cannot be created or if one of the files cannot be
    /// written. Note that both files are written one after another, so a failure might leave
    /// a new value with outdated tags behind.
    pub async fn set(&self, key: &str, value: &[u8], tags: &[&str]) -> anyhow::Result<()> {
        let value_path = self.value_path(key);
        let tags_path = self.tags_path(key);

        for path in [&value_path, &tags_path] {
            if let Some(parent) = path.parent() {
                self.fs
                    .create_dir_all(parent)
                    .await
                    .context("Failed to create parent directories.")?;
            }
        }

        let tags = serde_json::to_vec(tags).context("Failed to serialize tags.")?;
        self.fs
            .write(&value_path, value)
            .await
            .context("Failed to write value file.")?;
        self.fs
            .write(&tags_path, &tags)
            .await
            .context("Failed to write tags file.")?;

        Ok(())
    }

    /// Invalidates all values carrying one of the given tags.
    ///
    /// The manifest is re-read first, so that revalidations performed by other processes are
    /// kept. Files are left untouched.
    pub async fn revalidate_tags(&self, tags: &[&str]) {
        self.registry.reload().await;
        self.registry.update_revalidated_at(tags).await;

        if self.debug {
            log::debug!("File cache revalidated tags: {}", tags.join(", "));
        }
    }

    /// Re-reads the tag manifest from storage.
    ///
    /// As the manifest is only loaded once, this is required to observe revalidations which
    /// have been performed by another process (or another cache instance).
    pub async fn reload_manifest(&self) {
        self.registry.reload().await;
    }
}
