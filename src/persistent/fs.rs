//! Defines the storage primitives required by the persistent tier.
//!
//! The [FileCache](crate::persistent::FileCache) and the
//! [RevalidationRegistry](crate::persistent::RevalidationRegistry) never touch the disk directly.
//! Instead they operate on a [FileSystem], which permits to run them on the local disk
//! ([DiskFileSystem]), in memory ([MemoryFileSystem]) or against any other storage which can
//! provide these operations.
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

use anyhow::Context;

/// Describes the set of file operations used by the persistent tier.
#[async_trait::async_trait]
pub trait FileSystem: Send + Sync {
    /// Determines if a file (or directory) exists at the given path.
    fn exists(&self, path: &Path) -> bool;

    /// Reads the whole contents of the given file.
    async fn read(&self, path: &Path) -> anyhow::Result<Vec<u8>>;

    /// Reads the whole contents of the given file in a blocking manner.
    fn read_sync(&self, path: &Path) -> anyhow::Result<Vec<u8>>;

    /// Creates or replaces the given file with the given data.
    async fn write(&self, path: &Path, data: &[u8]) -> anyhow::Result<()>;

    /// Creates the given directory along with all missing parents.
    async fn create_dir_all(&self, path: &Path) -> anyhow::Result<()>;

    /// Returns the last modification timestamp of the given file.
    async fn modified(&self, path: &Path) -> anyhow::Result<SystemTime>;
}

/// Operates on the local disk using **tokio::fs**.
#[derive(Clone, Copy, Debug, Default)]
pub struct DiskFileSystem;

#[async_trait::async_trait]
impl FileSystem for DiskFileSystem {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    async fn read(&self, path: &Path) -> anyhow::Result<Vec<u8>> {
        tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.to_string_lossy()))
    }

    fn read_sync(&self, path: &Path) -> anyhow::Result<Vec<u8>> {
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.to_string_lossy()))
    }

    async fn write(&self, path: &Path, data: &[u8]) -> anyhow::Result<()> {
        use tokio::io::AsyncWriteExt;

        let mut file = tokio::fs::File::create(path)
            .await
            .with_context(|| format!("Failed to open {}", path.to_string_lossy()))?;
        file.write_all(data)
            .await
            .with_context(|| format!("Failed to write data to {}", path.to_string_lossy()))?;
        file.flush().await.context("Failed flushing to disk")?;

        Ok(())
    }

    async fn create_dir_all(&self, path: &Path) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(path)
            .await
            .with_context(|| format!("Failed to create directory {}", path.to_string_lossy()))
    }

    async fn modified(&self, path: &Path) -> anyhow::Result<SystemTime> {
        tokio::fs::metadata(path)
            .await
            .context("Failed to fetch file metadata")?
            .modified()
            .context("Failed to fetch file modification timestamp")
    }
}

/// Keeps all files in memory.
///
/// Each write stamps the file with the current system time. Directories are tracked so that
/// [exists](FileSystem::exists) behaves like on a real disk, however writing a file does not
/// require its parent directory to exist.
#[derive(Debug, Default)]
pub struct MemoryFileSystem {
    state: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    files: HashMap<PathBuf, (Vec<u8>, SystemTime)>,
    directories: Vec<PathBuf>,
}

impl MemoryFileSystem {
    /// Creates a new and empty file system.
    pub fn new() -> Self {
        MemoryFileSystem::default()
    }

    /// Returns the paths of all files currently stored.
    pub fn files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = self.state().files.keys().cloned().collect();
        files.sort();
        files
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_file(&self, path: &Path) -> anyhow::Result<Vec<u8>> {
        self.state()
            .files
            .get(path)
            .map(|(data, _)| data.clone())
            .with_context(|| format!("No such file: {}", path.to_string_lossy()))
    }
}

#[async_trait::async_trait]
impl FileSystem for MemoryFileSystem {
    fn exists(&self, path: &Path) -> bool {
        let state = self.state();
        state.files.contains_key(path) || state.directories.iter().any(|dir| dir == path)
    }

    async fn read(&self, path: &Path) -> anyhow::Result<Vec<u8>> {
        self.read_file(path)
    }

    fn read_sync(&self, path: &Path) -> anyhow::Result<Vec<u8>> {
        self.read_file(path)
    }

    async fn write(&self, path: &Path, data: &[u8]) -> anyhow::Result<()> {
        let _ = self
            .state()
            .files
            .insert(path.to_path_buf(), (data.to_vec(), SystemTime::now()));

        Ok(())
    }

    async fn create_dir_all(&self, path: &Path) -> anyhow::Result<()> {
        let mut state = self.state();
        for dir in path.ancestors().filter(|dir| !dir.as_os_str().is_empty()) {
            if !state.directories.iter().any(|known| known == dir) {
                state.directories.push(dir.to_path_buf());
            }
        }

        Ok(())
    }

    async fn modified(&self, path: &Path) -> anyhow::Result<SystemTime> {
        self.state()
            .files
            .get(path)
            .map(|(_, modified)| *modified)
            .with_context(|| format!("No such file: {}", path.to_string_lossy()))
    }
}

#[cfg(test)]
mod tests {
    use crate::persistent::fs::{DiskFileSystem, FileSystem, MemoryFileSystem};
    use crate::testing::{test_async, test_dir};
    use std::path::Path;

    #[test]
    fn memory_file_system_behaves_like_a_disk() {
        test_async(async {
            let fs = MemoryFileSystem::new();
            let file = Path::new("cache/tags/foo");

            assert!(!fs.exists(file));
            assert!(fs.read(file).await.is_err());
            assert!(fs.modified(file).await.is_err());

            fs.create_dir_all(Path::new("cache/tags")).await.unwrap();
            assert!(fs.exists(Path::new("cache")));
            assert!(fs.exists(Path::new("cache/tags")));

            fs.write(file, b"[\"a\"]").await.unwrap();
            assert!(fs.exists(file));
            assert_eq!(fs.read(file).await.unwrap(), b"[\"a\"]".to_vec());
            assert_eq!(fs.read_sync(file).unwrap(), b"[\"a\"]".to_vec());
            assert!(fs.modified(file).await.is_ok());
            assert_eq!(fs.files(), vec![file.to_path_buf()]);
        });
    }

    #[test]
    fn disk_file_system_reports_modification_times() {
        test_async(async {
            let dir = test_dir("disk-fs").await;
            let fs = DiskFileSystem;
            let file = dir.join("nested").join("value");

            assert!(fs.write(&file, b"x").await.is_err());
            fs.create_dir_all(file.parent().unwrap()).await.unwrap();
            fs.write(&file, b"Lorem").await.unwrap();

            assert!(fs.exists(&file));
            assert_eq!(fs.read(&file).await.unwrap(), b"Lorem".to_vec());
            assert_eq!(fs.read_sync(&file).unwrap(), b"Lorem".to_vec());
            assert!(fs.modified(&file).await.is_ok());
            assert!(fs.modified(&dir.join("missing")).await.is_err());
        });
    }
}
