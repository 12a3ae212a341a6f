use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{StorageError, StorageResult};

/// Storage trait for abstract file operations
///
/// Paths are relative to the storage root and use `/` as separator.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Check if a path exists (file or directory)
    async fn exists(&self, path: &str) -> StorageResult<bool>;

    /// Check if a path is a regular file
    async fn is_file(&self, path: &str) -> StorageResult<bool>;

    /// Read file contents
    async fn read(&self, path: &str) -> StorageResult<Vec<u8>>;

    /// Write file contents, creating parent directories
    async fn write(&self, path: &str, content: &[u8]) -> StorageResult<()>;

    /// Delete a file, or a directory with everything below it
    async fn delete(&self, path: &str) -> StorageResult<()>;

    /// List the direct children of a directory; directories end with `/`
    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>>;

    /// List every file below a directory, recursively
    async fn walk(&self, prefix: &str) -> StorageResult<Vec<String>>;

    /// Create directory
    async fn create_dir(&self, path: &str) -> StorageResult<()>;

    /// Move file from source to destination
    async fn rename(&self, source: &str, destination: &str) -> StorageResult<()>;

    /// Get file metadata (size, modified time, etc.)
    async fn metadata(&self, path: &str) -> StorageResult<FileMetadata>;

    /// Read file contents as UTF-8 text
    async fn read_to_string(&self, path: &str) -> StorageResult<String> {
        let bytes = self.read(path).await?;
        String::from_utf8(bytes)
            .map_err(|e| StorageError::Other(format!("{} is not valid UTF-8: {}", path, e)))
    }
}

/// File metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileMetadata {
    pub size: u64,
    pub modified: Option<chrono::DateTime<chrono::Utc>>,
    pub is_dir: bool,
}

/// Normalize a storage key
///
/// Backslashes become `/`, empty and `.` components are dropped. Absolute
/// paths and `..` components are rejected. The empty key names the root.
pub fn normalize_key(path: &str) -> StorageResult<String> {
    let unified = path.replace('\\', "/");
    if unified.starts_with('/') {
        return Err(StorageError::InvalidPath(path.to_string()));
    }

    let mut parts = Vec::new();
    for part in unified.split('/') {
        match part {
            "" | "." => continue,
            ".." => return Err(StorageError::InvalidPath(path.to_string())),
            other => parts.push(other),
        }
    }
    Ok(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_key() {
        assert_eq!(normalize_key("a/b.txt").unwrap(), "a/b.txt");
        assert_eq!(normalize_key("./a//b.txt").unwrap(), "a/b.txt");
        assert_eq!(normalize_key("a\\b.txt").unwrap(), "a/b.txt");
        assert_eq!(normalize_key("").unwrap(), "");
    }

    #[test]
    fn test_normalize_key_rejects_escapes() {
        assert!(matches!(
            normalize_key("../secret"),
            Err(StorageError::InvalidPath(_))
        ));
        assert!(matches!(
            normalize_key("/etc/passwd"),
            Err(StorageError::InvalidPath(_))
        ));
        assert!(normalize_key("a/../../b").is_err());
    }
}
