use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::ai::{Ai, ExecutionStats, FileAction};
use crate::template::MacroTable;

/// One prompt run against the model, with optional file processing
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Step {
    pub name: String,
    /// Memory key of the prompt template
    pub prompt_name: String,
    /// Stored with the step, never run
    pub verify_prompt: String,
    /// Memory directory for `text_file`
    pub storage_path: String,
    /// File name for the answer log, empty to skip writing it
    pub text_file: String,
    pub file_process_enabled: bool,
    /// Prompt run once per file matching `file_glob`
    pub file_process_name: String,
    pub file_glob: String,
    pub macros: MacroTable,
    pub ai: Ai,
}

impl Step {
    pub fn new(name: impl Into<String>, prompt_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prompt_name: prompt_name.into(),
            ..Default::default()
        }
    }

    pub fn with_macro(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.macros.insert(name, value);
        self
    }

    /// Write the answer log to `<storage_path>/<text_file>`
    pub fn with_text_file(
        mut self,
        storage_path: impl Into<String>,
        text_file: impl Into<String>,
    ) -> Self {
        self.storage_path = storage_path.into();
        self.text_file = text_file.into();
        self
    }

    /// Run `prompt_name` once for each memory file matching `glob`
    pub fn with_file_process(
        mut self,
        prompt_name: impl Into<String>,
        glob: impl Into<String>,
    ) -> Self {
        self.file_process_enabled = true;
        self.file_process_name = prompt_name.into();
        self.file_glob = glob.into();
        self
    }

    pub fn with_ai(mut self, ai: Ai) -> Self {
        self.ai = ai;
        self
    }

    /// Memory key of the answer log, if one is configured
    pub fn text_file_key(&self) -> Option<String> {
        if self.text_file.is_empty() {
            return None;
        }
        let dir = self.storage_path.trim_end_matches('/');
        Some(if dir.is_empty() {
            self.text_file.clone()
        } else {
            format!("{}/{}", dir, self.text_file)
        })
    }
}

/// Outcome of one step run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepReport {
    pub process: String,
    pub step: String,
    pub prompt_name: String,
    /// Model actually used, after any fallback
    pub model: String,
    pub answer: String,
    pub files: BTreeMap<String, FileAction>,
    /// Files handled by file processing
    pub processed_files: Vec<String>,
    /// Memory key the answer was written to
    pub text_file: Option<String>,
    pub stats: ExecutionStats,
    /// Whether token use went over the step's `max_tokens`
    pub over_budget: bool,
}
