use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::traits::{FileMetadata, normalize_key};
use super::{Storage, StorageError, StorageResult};

#[derive(Debug, Clone)]
struct Entry {
    content: Vec<u8>,
    modified: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Tree {
    files: BTreeMap<String, Entry>,
    dirs: BTreeSet<String>,
}

impl Tree {
    fn is_dir(&self, key: &str) -> bool {
        if key.is_empty() || self.dirs.contains(key) {
            return true;
        }
        let prefix = format!("{}/", key);
        self.files.keys().any(|k| k.starts_with(&prefix))
            || self.dirs.iter().any(|d| d.starts_with(&prefix))
    }
}

fn under(key: &str, prefix: &str) -> bool {
    prefix.is_empty() || key.starts_with(&format!("{}/", prefix))
}

/// In-memory implementation of Storage
///
/// Directories are implied by the files below them, or created explicitly
/// with `create_dir`.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStorage {
    tree: Arc<RwLock<Tree>>,
}

impl InMemoryStorage {
    /// Create a new empty in-memory storage
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn exists(&self, path: &str) -> StorageResult<bool> {
        let key = normalize_key(path)?;
        let tree = self.tree.read().await;
        Ok(tree.files.contains_key(&key) || tree.is_dir(&key))
    }

    async fn is_file(&self, path: &str) -> StorageResult<bool> {
        let key = normalize_key(path)?;
        let tree = self.tree.read().await;
        Ok(tree.files.contains_key(&key))
    }

    async fn read(&self, path: &str) -> StorageResult<Vec<u8>> {
        let key = normalize_key(path)?;
        let tree = self.tree.read().await;
        tree.files
            .get(&key)
            .map(|e| e.content.clone())
            .ok_or(StorageError::NotFound(key))
    }

    async fn write(&self, path: &str, content: &[u8]) -> StorageResult<()> {
        let key = normalize_key(path)?;
        if key.is_empty() {
            return Err(StorageError::InvalidPath(path.to_string()));
        }
        let mut tree = self.tree.write().await;
        if tree.is_dir(&key) {
            return Err(StorageError::InvalidPath(format!("{} is a directory", key)));
        }
        tree.files.insert(
            key,
            Entry {
                content: content.to_vec(),
                modified: Utc::now(),
            },
        );
        Ok(())
    }

    async fn delete(&self, path: &str) -> StorageResult<()> {
        let key = normalize_key(path)?;
        let mut tree = self.tree.write().await;

        if tree.files.remove(&key).is_some() {
            return Ok(());
        }
        if !tree.is_dir(&key) {
            return Err(StorageError::NotFound(key));
        }

        tree.files.retain(|k, _| !under(k, &key));
        tree.dirs.retain(|d| d != &key && !under(d, &key));
        Ok(())
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let key = normalize_key(prefix)?;
        let tree = self.tree.read().await;

        let mut entries = BTreeSet::new();
        let children = tree
            .files
            .keys()
            .map(|k| (k, false))
            .chain(tree.dirs.iter().map(|d| (d, true)));

        for (path, is_dir) in children {
            if !under(path, &key) {
                continue;
            }
            let rest = if key.is_empty() {
                path.as_str()
            } else {
                &path[key.len() + 1..]
            };
            let child = match rest.split_once('/') {
                Some((dir, _)) => format!("{}/", join(&key, dir)),
                None if is_dir => format!("{}/", join(&key, rest)),
                None => join(&key, rest),
            };
            entries.insert(child);
        }

        Ok(entries.into_iter().collect())
    }

    async fn walk(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let key = normalize_key(prefix)?;
        let tree = self.tree.read().await;
        if tree.files.contains_key(&key) {
            return Ok(vec![key]);
        }
        Ok(tree
            .files
            .keys()
            .filter(|k| under(k, &key))
            .cloned()
            .collect())
    }

    async fn create_dir(&self, path: &str) -> StorageResult<()> {
        let key = normalize_key(path)?;
        if key.is_empty() {
            return Ok(());
        }
        let mut tree = self.tree.write().await;
        if tree.files.contains_key(&key) {
            return Err(StorageError::InvalidPath(format!("{} is a file", key)));
        }
        tree.dirs.insert(key);
        Ok(())
    }

    async fn rename(&self, source: &str, destination: &str) -> StorageResult<()> {
        let from = normalize_key(source)?;
        let to = normalize_key(destination)?;
        let mut tree = self.tree.write().await;

        if let Some(entry) = tree.files.remove(&from) {
            tree.files.insert(to, entry);
            return Ok(());
        }
        if from.is_empty() || !tree.is_dir(&from) {
            return Err(StorageError::NotFound(from));
        }

        let moved: Vec<String> = tree
            .files
            .keys()
            .filter(|k| under(k, &from))
            .cloned()
            .collect();
        for old in moved {
            if let Some(entry) = tree.files.remove(&old) {
                let new = format!("{}{}", to, &old[from.len()..]);
                tree.files.insert(new, entry);
            }
        }
        tree.dirs.remove(&from);
        tree.dirs.insert(to);
        Ok(())
    }

    async fn metadata(&self, path: &str) -> StorageResult<FileMetadata> {
        let key = normalize_key(path)?;
        let tree = self.tree.read().await;

        if let Some(entry) = tree.files.get(&key) {
            return Ok(FileMetadata {
                size: entry.content.len() as u64,
                modified: Some(entry.modified),
                is_dir: false,
            });
        }
        if tree.is_dir(&key) {
            return Ok(FileMetadata {
                size: 0,
                modified: None,
                is_dir: true,
            });
        }
        Err(StorageError::NotFound(key))
    }
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", prefix, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_directories_are_implied() {
        let storage = InMemoryStorage::new();
        storage.write("proc/step1.kestep", b"{}").await.unwrap();
        storage.write("proc/sub/x.txt", b"x").await.unwrap();

        assert!(storage.exists("proc").await.unwrap());
        assert!(!storage.is_file("proc").await.unwrap());
        assert!(storage.metadata("proc").await.unwrap().is_dir);

        let entries = storage.list("proc").await.unwrap();
        assert_eq!(
            entries,
            vec!["proc/step1.kestep".to_string(), "proc/sub/".to_string()]
        );
        assert_eq!(storage.list("").await.unwrap(), vec!["proc/".to_string()]);
    }

    #[tokio::test]
    async fn test_explicit_empty_directory() {
        let storage = InMemoryStorage::new();
        storage.create_dir("empty").await.unwrap();
        assert!(storage.exists("empty").await.unwrap());
        assert_eq!(storage.list("").await.unwrap(), vec!["empty/".to_string()]);
        assert!(storage.walk("empty").await.unwrap().is_empty());

        storage.delete("empty").await.unwrap();
        assert!(!storage.exists("empty").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_directory_removes_children() {
        let storage = InMemoryStorage::new();
        storage.write("a/1.txt", b"1").await.unwrap();
        storage.write("a/b/2.txt", b"2").await.unwrap();
        storage.write("ab.txt", b"3").await.unwrap();

        storage.delete("a").await.unwrap();
        assert_eq!(storage.walk("").await.unwrap(), vec!["ab.txt".to_string()]);
        assert!(storage.delete("a").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_rename_file() {
        let storage = InMemoryStorage::new();
        storage.write("x.py", b"print()").await.unwrap();
        storage.rename("x.py", "x.~01~.py").await.unwrap();
        assert!(!storage.is_file("x.py").await.unwrap());
        assert_eq!(storage.read("x.~01~.py").await.unwrap(), b"print()");
    }
}
