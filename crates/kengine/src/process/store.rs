use std::sync::Arc;
use tracing::{error, info};

use super::error::{ProcessError, Result};
use super::model::Process;
use crate::step::Step;
use crate::storage::{Storage, StorageError, normalize_key};
use crate::template::glob::glob_to_regex;

/// Extension of stored step files
pub const STEP_EXTENSION: &str = ".kestep";

/// Process definitions: one directory per process, one JSON file per step
#[derive(Clone)]
pub struct ProcessStore {
    storage: Arc<dyn Storage>,
}

impl ProcessStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Whether `proc/step` names a stored step
    pub async fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.storage.is_file(&step_file(key)).await?)
    }

    /// Load the step stored under `proc/step`
    pub async fn read(&self, key: &str) -> Result<Step> {
        let file = step_file(key);
        let content = match self.storage.read_to_string(&file).await {
            Ok(content) => content,
            Err(e) if e.is_not_found() => {
                error!("Invalid process item, path not found: {}", file);
                return Err(ProcessError::NotFound(key.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&content).map_err(|source| ProcessError::InvalidStep {
            key: key.to_string(),
            source,
        })
    }

    /// Like `read`, but `None` when the step does not exist
    pub async fn get(&self, key: &str) -> Result<Option<Step>> {
        match self.read(key).await {
            Ok(step) => Ok(Some(step)),
            Err(ProcessError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Step keys matching a glob, without the file extension, sorted
    pub async fn glob_files(&self, pattern: &str) -> Result<Vec<String>> {
        let matcher = glob_to_regex(pattern)?;
        let mut keys: Vec<String> = self
            .storage
            .walk("")
            .await?
            .into_iter()
            .filter(|file| matcher.is_match(file) || matcher.is_match(strip_step_ext(file)))
            .map(|file| strip_step_ext(&file).to_string())
            .collect();
        keys.sort();
        keys.dedup();
        Ok(keys)
    }

    /// Create the directory of a new process
    pub async fn new_process(&self, name: &str) -> Result<String> {
        let name = process_name(name)?;
        self.storage.create_dir(&name).await?;
        info!("New process: {}", name);
        Ok(name)
    }

    /// Store a step as pretty JSON under its process
    pub async fn save(&self, process: &str, step: &Step) -> Result<()> {
        let process = process_name(process)?;
        if step.name.is_empty() || step.name.contains('/') {
            return Err(ProcessError::InvalidName(step.name.clone()));
        }

        let json = serde_json::to_string_pretty(step)?;
        let file = step_file(&format!("{}/{}", process, step.name));
        self.storage.write(&file, json.as_bytes()).await?;
        info!("Saved step {}/{}", process, step.name);
        Ok(())
    }

    /// Store every step of a process
    pub async fn save_process(&self, process: &Process) -> Result<()> {
        self.new_process(&process.name).await?;
        for step in &process.steps {
            self.save(&process.name, step).await?;
        }
        Ok(())
    }

    /// Delete a step, or a whole process with its steps
    pub async fn delete(&self, key: &str) -> Result<()> {
        let file = step_file(key);
        let target = if self.storage.is_file(&file).await? {
            file
        } else {
            key.to_string()
        };

        match self.storage.delete(&target).await {
            Ok(()) => {
                info!("Deleted {}", target);
                Ok(())
            }
            Err(e) if e.is_not_found() => Err(ProcessError::NotFound(key.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    /// Load a process with its steps ordered by name
    pub async fn load(&self, name: &str) -> Result<Process> {
        let name = process_name(name)?;
        if !self.storage.exists(&name).await? || self.storage.is_file(&name).await? {
            return Err(ProcessError::NotFound(name));
        }

        let mut process = Process::new(name.as_str());
        for entry in self.storage.list(&name).await? {
            if entry.ends_with('/') || !entry.ends_with(STEP_EXTENSION) {
                continue;
            }
            process.add_step(self.read(strip_step_ext(&entry)).await?);
        }
        Ok(process)
    }

    /// Names of all stored processes, sorted
    pub async fn list_processes(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self
            .storage
            .list("")
            .await?
            .into_iter()
            .filter_map(|entry| entry.strip_suffix('/').map(str::to_string))
            .collect();
        names.sort();
        Ok(names)
    }
}

fn step_file(key: &str) -> String {
    format!("{}{}", key, STEP_EXTENSION)
}

fn strip_step_ext(file: &str) -> &str {
    file.strip_suffix(STEP_EXTENSION).unwrap_or(file)
}

/// Normalized process name: a single path component
fn process_name(name: &str) -> Result<String> {
    let key = normalize_key(name).map_err(|e| match e {
        StorageError::InvalidPath(path) => ProcessError::InvalidName(path),
        other => other.into(),
    })?;
    if key.is_empty() || key.contains('/') {
        return Err(ProcessError::InvalidName(name.to_string()));
    }
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStorage;

    fn store() -> ProcessStore {
        ProcessStore::new(Arc::new(InMemoryStorage::new()))
    }

    #[tokio::test]
    async fn test_save_and_read() {
        let store = store();
        let step = Step::new("01_Design", "Prompts/design").with_macro("game", "Snake");
        store.save("Snake", &step).await.unwrap();

        assert!(store.contains("Snake/01_Design").await.unwrap());
        assert!(store.storage().is_file("Snake/01_Design.kestep").await.unwrap());
        assert_eq!(store.read("Snake/01_Design").await.unwrap(), step);

        let raw = store
            .storage()
            .read_to_string("Snake/01_Design.kestep")
            .await
            .unwrap();
        assert!(raw.contains("\n  \"name\": \"01_Design\""));
    }

    #[tokio::test]
    async fn test_missing_and_invalid_steps() {
        let store = store();
        assert!(store.get("Snake/none").await.unwrap().is_none());
        assert!(matches!(
            store.read("Snake/none").await,
            Err(ProcessError::NotFound(_))
        ));

        store
            .storage()
            .write("Snake/bad.kestep", b"{not json")
            .await
            .unwrap();
        assert!(matches!(
            store.get("Snake/bad").await,
            Err(ProcessError::InvalidStep { .. })
        ));
    }

    #[tokio::test]
    async fn test_load_orders_steps() {
        let store = store();
        store.save("Snake", &Step::new("02_Code", "p")).await.unwrap();
        store.save("Snake", &Step::new("01_Design", "p")).await.unwrap();
        store.save("Other", &Step::new("01_Only", "p")).await.unwrap();
        store
            .storage()
            .write("Snake/notes.txt", b"ignored")
            .await
            .unwrap();

        let process = store.load("Snake").await.unwrap();
        assert_eq!(process.name, "Snake");
        assert_eq!(process.step_names(), vec!["01_Design", "02_Code"]);

        assert_eq!(store.list_processes().await.unwrap(), vec!["Other", "Snake"]);
        assert!(matches!(
            store.load("Missing").await,
            Err(ProcessError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_glob_files_strips_extension() {
        let store = store();
        store.save("Snake", &Step::new("01_Design", "p")).await.unwrap();
        store.save("Snake", &Step::new("02_Code", "p")).await.unwrap();
        store.save("Snake2", &Step::new("01_Design", "p")).await.unwrap();

        assert_eq!(
            store.glob_files("Snake/*").await.unwrap(),
            vec!["Snake/01_Design", "Snake/02_Code"]
        );
        assert_eq!(
            store.glob_files("*/01_*.kestep").await.unwrap(),
            vec!["Snake/01_Design", "Snake2/01_Design"]
        );
    }

    #[tokio::test]
    async fn test_new_process_and_delete() {
        let store = store();
        assert_eq!(store.new_process("Snake").await.unwrap(), "Snake");
        assert_eq!(store.list_processes().await.unwrap(), vec!["Snake"]);
        assert!(store.load("Snake").await.unwrap().steps.is_empty());

        store.save("Snake", &Step::new("01_Design", "p")).await.unwrap();
        store.delete("Snake/01_Design").await.unwrap();
        assert!(!store.contains("Snake/01_Design").await.unwrap());

        store.delete("Snake").await.unwrap();
        assert!(store.list_processes().await.unwrap().is_empty());
        assert!(matches!(
            store.delete("Snake").await,
            Err(ProcessError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_invalid_names() {
        let store = store();
        assert!(matches!(
            store.new_process("../escape").await,
            Err(ProcessError::InvalidName(_))
        ));
        assert!(matches!(
            store.save("Snake", &Step::new("a/b", "p")).await,
            Err(ProcessError::InvalidName(_))
        ));
    }
}
