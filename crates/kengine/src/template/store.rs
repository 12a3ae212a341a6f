use regex::Regex;
use std::collections::BTreeSet;
use std::sync::{Arc, LazyLock};
use tracing::{debug, error, info};

use super::compiler::{Compiler, Directive, PromptItem, SourceLine, parse_line, source_lines};
use super::error::{Result, TemplateError};
use super::glob::glob_to_regex;
use super::macros::MacroTable;
use crate::storage::{Storage, StorageError};

/// Maximum nesting of `.include` directives
pub const MAX_INCLUDE_DEPTH: usize = 16;

static BACKUP_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.~\d{2,}~(\.|$)").expect("backup pattern is valid"));

/// File-backed key/value store of templates and outputs
///
/// Keys are relative paths, values are the file contents. Writing over an
/// existing key first moves the old file to a numbered backup.
#[derive(Clone)]
pub struct TemplateStore {
    storage: Arc<dyn Storage>,
}

impl TemplateStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Underlying storage
    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Whether `key` names a file
    pub async fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.storage.is_file(key).await?)
    }

    /// Raw contents of `key`
    pub async fn read(&self, key: &str) -> Result<String> {
        match self.storage.read_to_string(key).await {
            Ok(content) => {
                debug!("Reading>>{}", key);
                Ok(content)
            }
            Err(e) if e.is_not_found() => {
                error!("Invalid memory item, path not found: {}", key);
                Err(TemplateError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Contents of `key` with macros substituted, line by line
    pub async fn render(&self, key: &str, macros: &MacroTable) -> Result<String> {
        let content = self.read(key).await?;
        Ok(content
            .split('\n')
            .map(|line| macros.apply(line))
            .collect::<Vec<_>>()
            .join("\n"))
    }

    /// Compile `key` into prompt items
    ///
    /// Includes are expanded and macros substituted before compiling.
    pub async fn get_messages(&self, key: &str, macros: &MacroTable) -> Result<Vec<PromptItem>> {
        let lines = self.expand(key, macros).await?;
        Compiler::build(&lines).map_err(|e| {
            error!("Failed to compile {}: {}", key, e);
            TemplateError::from(e)
        })
    }

    /// Like `get_messages`, but `None` when `key` does not exist
    pub async fn get(&self, key: &str, macros: &MacroTable) -> Result<Option<Vec<PromptItem>>> {
        match self.get_messages(key, macros).await {
            Ok(items) => Ok(Some(items)),
            Err(TemplateError::NotFound(missing)) if missing == key => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn load_lines(&self, key: &str, macros: &MacroTable) -> Result<Vec<SourceLine>> {
        let content = self.read(key).await?;
        let mut lines = source_lines(key, &content);
        for line in &mut lines {
            line.text = macros.apply(&line.text);
        }
        Ok(lines)
    }

    /// Macro-substituted lines of `key` with every `.include` spliced in
    async fn expand(&self, key: &str, macros: &MacroTable) -> Result<Vec<SourceLine>> {
        struct Frame {
            name: String,
            lines: std::vec::IntoIter<SourceLine>,
        }

        let mut frames = vec![Frame {
            name: key.to_string(),
            lines: self.load_lines(key, macros).await?.into_iter(),
        }];
        let mut out = Vec::new();

        loop {
            let line = match frames.last_mut().map(|f| f.lines.next()) {
                None => break,
                Some(None) => {
                    frames.pop();
                    continue;
                }
                Some(Some(line)) => line,
            };

            let target = match parse_line(&line.text) {
                Directive::Include(target) if !target.is_empty() => Some(target.to_string()),
                _ => None,
            };
            let Some(target) = target else {
                out.push(line);
                continue;
            };

            if frames.iter().any(|f| f.name == target) {
                let mut chain: Vec<&str> = frames.iter().map(|f| f.name.as_str()).collect();
                chain.push(&target);
                return Err(TemplateError::IncludeCycle(chain.join(" -> ")));
            }
            // the root template is not an include
            if frames.len() > MAX_INCLUDE_DEPTH {
                return Err(TemplateError::IncludeDepth {
                    name: target,
                    limit: MAX_INCLUDE_DEPTH,
                });
            }

            let lines = self.load_lines(&target, macros).await?;
            frames.push(Frame {
                name: target,
                lines: lines.into_iter(),
            });
        }

        Ok(out)
    }

    /// Store `content` under `key`, backing up any existing file first
    pub async fn write(&self, key: &str, content: &str) -> Result<()> {
        self.backup_file(key).await?;
        self.storage.write(key, content.as_bytes()).await?;
        info!("Writing<<{}", key);
        Ok(())
    }

    /// Move an existing file to the first free `name.~NN~ext`
    ///
    /// Returns the backup key, or `None` when there was nothing to back up.
    pub async fn backup_file(&self, key: &str) -> Result<Option<String>> {
        if !self.storage.is_file(key).await? {
            return Ok(None);
        }

        let mut counter = 1;
        let mut candidate = backup_name(key, counter);
        while self.storage.exists(&candidate).await? {
            counter += 1;
            candidate = backup_name(key, counter);
        }

        self.storage.rename(key, &candidate).await?;
        debug!("Backed up {} to {}", key, candidate);
        Ok(Some(candidate))
    }

    /// Delete a file, or a directory with its contents
    pub async fn delete(&self, key: &str) -> Result<()> {
        self.storage.delete(key).await.map_err(|e| match e {
            e if e.is_not_found() => TemplateError::NotFound(key.to_string()),
            e => e.into(),
        })
    }

    /// Keys of all files matching a glob pattern, sorted
    pub async fn glob_files(&self, pattern: &str) -> Result<Vec<String>> {
        let matcher = glob_to_regex(pattern)?;
        let mut files: Vec<String> = self
            .storage
            .walk("")
            .await?
            .into_iter()
            .filter(|key| matcher.is_match(key))
            .collect();
        files.sort();
        Ok(files)
    }

    /// Delete every file below `dir`, keeping the directories
    pub async fn clear_dynamic_memory(&self, dir: &str) -> Result<usize> {
        let files = self.storage.walk(dir).await?;
        let mut dirs = BTreeSet::new();

        for file in &files {
            self.storage.delete(file).await?;
            if let Some((parent, _)) = file.rsplit_once('/') {
                dirs.insert(parent.to_string());
            }
        }
        for parent in dirs {
            self.storage.create_dir(&parent).await?;
        }

        info!("Cleared {} files below {}", files.len(), display_dir(dir));
        Ok(files.len())
    }

    /// Delete every backup file below `dir`
    pub async fn delete_memory_backup(&self, dir: &str) -> Result<usize> {
        let mut deleted = 0;
        for file in self.storage.walk(dir).await? {
            if is_backup(&file) {
                match self.storage.delete(&file).await {
                    Ok(()) => deleted += 1,
                    Err(StorageError::NotFound(_)) => {}
                    Err(e) => return Err(e.into()),
                }
            }
        }

        info!("Deleted {} backups below {}", deleted, display_dir(dir));
        Ok(deleted)
    }
}

fn display_dir(dir: &str) -> &str {
    if dir.is_empty() { "/" } else { dir }
}

/// Key of the `counter`-th backup of `key`: `dir/name.~NN~ext`
pub fn backup_name(key: &str, counter: u32) -> String {
    let (dir, file) = match key.rsplit_once('/') {
        Some((dir, file)) => (Some(dir), file),
        None => (None, key),
    };

    let (stem, ext) = match file.rfind('.') {
        Some(idx) if idx > 0 => file.split_at(idx),
        _ => (file, ""),
    };

    let name = format!("{}.~{:02}~{}", stem, counter, ext);
    match dir {
        Some(dir) => format!("{}/{}", dir, name),
        None => name,
    }
}

/// Whether a key's file name is a backup made by [`TemplateStore::write`]
pub fn is_backup(key: &str) -> bool {
    let file = key.rsplit_once('/').map_or(key, |(_, file)| file);
    BACKUP_PATTERN.is_match(file)
}
