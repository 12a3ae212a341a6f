use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use walkdir::WalkDir;

use super::traits::{FileMetadata, normalize_key};
use super::{Storage, StorageError, StorageResult};
use crate::config::KengineConfig;

/// Local filesystem storage implementation
#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage instance
    pub fn new(base_path: impl AsRef<Path>) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    /// Storage rooted at the configured memory directory
    pub fn for_memory(config: &KengineConfig) -> Self {
        Self::new(config.memory_path())
    }

    /// Storage rooted at the configured processes directory
    pub fn for_processes(config: &KengineConfig) -> Self {
        Self::new(config.processes_path())
    }

    /// Root directory of this storage
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Get full path by joining base path with relative path
    fn full_path(&self, path: &str) -> StorageResult<PathBuf> {
        let key = normalize_key(path)?;
        if key.is_empty() {
            Ok(self.base_path.clone())
        } else {
            Ok(self.base_path.join(key))
        }
    }

    /// Relative `/`-separated key for a path below the base directory
    fn relative_key(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.base_path).ok()?;
        let parts: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().to_string())
            .collect();
        Some(parts.join("/"))
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn exists(&self, path: &str) -> StorageResult<bool> {
        let full_path = self.full_path(path)?;
        Ok(full_path.exists())
    }

    async fn is_file(&self, path: &str) -> StorageResult<bool> {
        let full_path = self.full_path(path)?;
        Ok(full_path.is_file())
    }

    async fn read(&self, path: &str) -> StorageResult<Vec<u8>> {
        let full_path = self.full_path(path)?;
        if !full_path.is_file() {
            return Err(StorageError::NotFound(full_path.display().to_string()));
        }
        let mut file = fs::File::open(&full_path).await?;
        let mut content = Vec::new();
        file.read_to_end(&mut content).await?;
        Ok(content)
    }

    async fn write(&self, path: &str, content: &[u8]) -> StorageResult<()> {
        let full_path = self.full_path(path)?;

        // Create parent directory if it doesn't exist
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = fs::File::create(&full_path).await?;
        file.write_all(content).await?;
        file.sync_all().await?;
        Ok(())
    }

    async fn delete(&self, path: &str) -> StorageResult<()> {
        let full_path = self.full_path(path)?;
        if full_path.is_dir() {
            fs::remove_dir_all(&full_path).await?;
        } else if full_path.exists() {
            fs::remove_file(&full_path).await?;
        } else {
            return Err(StorageError::NotFound(full_path.display().to_string()));
        }
        Ok(())
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let full_path = self.full_path(prefix)?;

        if !full_path.is_dir() {
            return Ok(Vec::new());
        }

        let mut entries = Vec::new();
        let mut read_dir = fs::read_dir(&full_path).await?;

        while let Some(entry) = read_dir.next_entry().await? {
            if let Some(mut path_str) = self.relative_key(&entry.path()) {
                // Add trailing slash for directories
                if entry.path().is_dir() {
                    path_str.push('/');
                }

                entries.push(path_str);
            }
        }

        entries.sort();
        Ok(entries)
    }

    async fn walk(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let full_path = self.full_path(prefix)?;

        if !full_path.exists() {
            return Ok(Vec::new());
        }

        let storage = self.clone();
        let files = tokio::task::spawn_blocking(move || {
            WalkDir::new(&full_path)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .filter_map(|e| storage.relative_key(e.path()))
                .collect::<Vec<_>>()
        })
        .await
        .map_err(|e| StorageError::Other(format!("Directory walk failed: {}", e)))?;

        let mut files = files;
        files.sort();
        Ok(files)
    }

    async fn create_dir(&self, path: &str) -> StorageResult<()> {
        let full_path = self.full_path(path)?;
        fs::create_dir_all(&full_path).await?;
        Ok(())
    }

    async fn rename(&self, source: &str, destination: &str) -> StorageResult<()> {
        let source_path = self.full_path(source)?;
        let dest_path = self.full_path(destination)?;

        if !source_path.exists() {
            return Err(StorageError::NotFound(source_path.display().to_string()));
        }

        // Create parent directory if it doesn't exist
        if let Some(parent) = dest_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        fs::rename(&source_path, &dest_path).await?;
        Ok(())
    }

    async fn metadata(&self, path: &str) -> StorageResult<FileMetadata> {
        let full_path = self.full_path(path)?;
        let metadata = fs::metadata(&full_path).await?;

        let modified = metadata.modified().ok().and_then(|time| {
            time.duration_since(std::time::UNIX_EPOCH)
                .ok()
                .and_then(|duration| chrono::DateTime::from_timestamp(duration.as_secs() as i64, 0))
        });

        Ok(FileMetadata {
            size: metadata.len(),
            modified,
            is_dir: metadata.is_dir(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_write_read_and_walk() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());

        storage.write("a/b/c.txt", b"hello").await.unwrap();
        storage.write("a/top.md", b"top").await.unwrap();

        assert!(storage.is_file("a/b/c.txt").await.unwrap());
        assert!(!storage.is_file("a/b").await.unwrap());
        assert!(storage.exists("a/b").await.unwrap());
        assert_eq!(storage.read_to_string("a/b/c.txt").await.unwrap(), "hello");

        let files = storage.walk("a").await.unwrap();
        assert_eq!(files, vec!["a/b/c.txt".to_string(), "a/top.md".to_string()]);

        let entries = storage.list("a").await.unwrap();
        assert_eq!(entries, vec!["a/b/".to_string(), "a/top.md".to_string()]);
    }

    #[tokio::test]
    async fn test_read_missing_is_not_found() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());
        let err = storage.read("nope.txt").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_rename_and_delete_directory() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());

        storage.write("p/one.txt", b"1").await.unwrap();
        storage.rename("p/one.txt", "q/two.txt").await.unwrap();
        assert!(!storage.exists("p/one.txt").await.unwrap());
        assert_eq!(storage.read("q/two.txt").await.unwrap(), b"1");

        storage.delete("q").await.unwrap();
        assert!(!storage.exists("q").await.unwrap());
        assert!(storage.delete("q").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_rejects_parent_escape() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());
        assert!(matches!(
            storage.write("../outside.txt", b"x").await,
            Err(StorageError::InvalidPath(_))
        ));
    }
}
