//! Keeps track of when each tag was last revalidated.
//!
//! The registry is stored as `tags-manifest.json` in the root directory of the cache:
//! ```json
//! { "version": 1, "items": { "products": { "revalidatedAt": 1700000000000 } } }
//! ```
//! A file stored in the cache is considered stale, once one of its tags has been revalidated
//! at or after the last modification of the file. Therefore invalidating a tag only requires
//! to rewrite this single document rather than touching any of the cached files.
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::persistent::fs::FileSystem;

/// Contains the file name of the manifest within the cache directory.
pub const MANIFEST_FILE_NAME: &str = "tags-manifest.json";

/// The version written into each manifest.
pub const MANIFEST_VERSION: u32 = 1;

/// Represents the persisted manifest document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// The format version of the document.
    #[serde(default = "default_version")]
    pub version: u32,
    /// Maps each revalidated tag to its revalidation info.
    #[serde(default)]
    pub items: BTreeMap<String, ManifestItem>,
}

fn default_version() -> u32 {
    MANIFEST_VERSION
}

impl Default for Manifest {
    fn default() -> Self {
        Manifest {
            version: MANIFEST_VERSION,
            items: BTreeMap::new(),
        }
    }
}

/// Stores the revalidation info of a single tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestItem {
    /// The timestamp (epoch millis) of the last revalidation.
    pub revalidated_at: i64,
}

/// Provides the durable tag to timestamp mapping used to judge the freshness of cached files.
///
/// The manifest is loaded lazily on first use (or explicitly via [load](Self::load)) and then
/// kept in memory. Loading never fails: a missing or malformed document is replaced by an empty
/// one.
pub struct RevalidationRegistry {
    fs: Arc<dyn FileSystem>,
    dir: PathBuf,
    base_tags: HashSet<String>,
    manifest: Mutex<Option<Manifest>>,
}

impl RevalidationRegistry {
    /// Creates a registry which stores its manifest in the given directory.
    ///
    /// All **base_tags** are considered to be permanently stale.
    pub fn new(fs: Arc<dyn FileSystem>, dir: impl Into<PathBuf>, base_tags: &[String]) -> Self {
        RevalidationRegistry {
            fs,
            dir: dir.into(),
            base_tags: base_tags.iter().cloned().collect(),
            manifest: Mutex::new(None),
        }
    }

    /// Returns the path of the manifest file.
    pub fn file_path(&self) -> PathBuf {
        self.dir.join(MANIFEST_FILE_NAME)
    }

    /// Determines if the manifest has been loaded.
    pub fn is_loaded(&self) -> bool {
        self.state().is_some()
    }

    /// Reads the manifest from storage, replacing the in-memory state.
    ///
    /// Any failure (missing file, invalid JSON) results in an empty manifest.
    pub async fn load(&self) {
        let manifest = match self.read_manifest(&self.file_path()).await {
            Ok(manifest) => manifest,
            Err(error) => {
                log::debug!("Starting with an empty tag manifest: {:#}", error);
                Manifest::default()
            }
        };

        *self.state() = Some(manifest);
    }

    /// Re-reads the manifest to pick up revalidations performed by other processes.
    pub async fn reload(&self) {
        self.load().await
    }

    /// Loads the manifest unless this already happened.
    pub async fn ensure_loaded(&self) {
        if !self.is_loaded() {
            self.load().await;
        }
    }

    async fn read_manifest(&self, path: &Path) -> anyhow::Result<Manifest> {
        let data = self.fs.read(path).await?;
        serde_json::from_slice(&data).context("Malformed tag manifest")
    }

    /// Marks all given tags as revalidated right now and persists the manifest.
    ///
    /// The manifest is loaded first if necessary, so that the persisted document keeps all
    /// previously recorded revalidations.
    ///
    /// Note that failing to persist the manifest is only logged. The in-memory state is
    /// updated nevertheless.
    pub async fn update_revalidated_at(&self, tags: &[&str]) {
        self.ensure_loaded().await;
        let now = Utc::now().timestamp_millis();

        let data = {
            let mut state = self.state();
            let manifest = state.get_or_insert_with(Manifest::default);
            for tag in tags {
                let _ = manifest.items.insert(
                    (*tag).to_owned(),
                    ManifestItem {
                        revalidated_at: now,
                    },
                );
            }

            serde_json::to_vec(&*manifest)
        };

        let result = match data {
            Ok(data) => self.persist(&data).await,
            Err(error) => Err(error.into()),
        };
        if let Err(error) = result {
            log::warn!(
                "Failed to persist the tag manifest {}: {:#}",
                self.file_path().to_string_lossy(),
                error
            );
        }
    }

    async fn persist(&self, data: &[u8]) -> anyhow::Result<()> {
        self.fs.create_dir_all(&self.dir).await?;
        self.fs.write(&self.file_path(), data).await
    }

    /// Determines if data carrying the given tag and being last modified at the given
    /// timestamp (epoch millis) is stale.
    pub fn expired(&self, tag: &str, last_modified: i64) -> bool {
        if self.base_tags.contains(tag) {
            return true;
        }

        self.revalidated_at(tag)
            .map(|revalidated_at| revalidated_at >= last_modified)
            .unwrap_or(false)
    }

    /// Determines if any of the given tags renders data modified at **last_modified** stale.
    ///
    /// This will load the manifest if required.
    pub async fn is_expired(&self, tags: &[String], last_modified: SystemTime) -> bool {
        self.ensure_loaded().await;

        let last_modified = DateTime::<Utc>::from(last_modified).timestamp_millis();
        tags.iter().any(|tag| self.expired(tag, last_modified))
    }

    /// Returns the last revalidation timestamp (epoch millis) of the given tag if known.
    pub fn revalidated_at(&self, tag: &str) -> Option<i64> {
        self.state()
            .as_ref()
            .and_then(|manifest| manifest.items.get(tag))
            .map(|item| item.revalidated_at)
    }

    /// Returns a copy of the currently loaded manifest.
    pub fn manifest(&self) -> Option<Manifest> {
        self.state().clone()
    }

    fn state(&self) -> MutexGuard<'_, Option<Manifest>> {
        self.manifest.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
