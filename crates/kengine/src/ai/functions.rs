use kengine_core::{ChatMessage, FunctionCall, FunctionDefinition};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use strum_macros::Display;
use tracing::{error, info};

use super::error::{AiError, Result};
use crate::template::{MacroTable, TemplateStore};

pub const READ_FILE: &str = "read_file";
pub const WRITE_FILE: &str = "write_file";
pub const REPLACE: &str = "replace";

/// Last thing a function call did to a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FileAction {
    Read,
    Written,
    Replaced,
}

/// Result of dispatching one function call
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionOutcome {
    /// Function message to send back to the model
    pub message: ChatMessage,
    /// File touched by the call, if any
    pub touched: Option<(String, FileAction)>,
}

impl FunctionOutcome {
    fn reply(name: &str, content: impl Into<String>) -> Self {
        Self {
            message: ChatMessage::function_result(name, content),
            touched: None,
        }
    }

    fn touching(mut self, file: &str, action: FileAction) -> Self {
        self.touched = Some((file.to_string(), action));
        self
    }
}

#[derive(Deserialize)]
struct ReadFileArgs {
    name: String,
}

#[derive(Deserialize)]
struct WriteFileArgs {
    name: String,
    contents: String,
}

#[derive(Deserialize)]
struct ReplaceArgs {
    file_name: String,
    old_code: String,
    new_code: String,
}

/// File functions offered to the model, backed by the template store
pub struct FileFunctions {
    store: TemplateStore,
    macros: MacroTable,
}

impl FileFunctions {
    /// `macros` are applied to files returned by `read_file`
    pub fn new(store: TemplateStore, macros: MacroTable) -> Self {
        Self { store, macros }
    }

    pub fn definitions() -> Vec<FunctionDefinition> {
        vec![
            FunctionDefinition {
                name: READ_FILE.to_string(),
                description: "Read the contents of a named file".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "name": {
                            "type": "string",
                            "description": "The name of the file to read",
                        },
                    },
                    "required": ["name"],
                }),
            },
            FunctionDefinition {
                name: WRITE_FILE.to_string(),
                description: "Write the contents to a named file".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "name": {
                            "type": "string",
                            "description": "The name of the file to write",
                        },
                        "contents": {
                            "type": "string",
                            "description": "The contents of the file",
                        },
                    },
                    "required": ["name", "contents"],
                }),
            },
            FunctionDefinition {
                name: REPLACE.to_string(),
                description: "In the file named file_name, search for text 'old_code', \
                              and replace it with 'new_code'"
                    .to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "file_name": {
                            "type": "string",
                            "description": "The name of the file to be modified",
                        },
                        "old_code": {
                            "type": "string",
                            "description": "the lines of code of the old function definition",
                        },
                        "new_code": {
                            "type": "string",
                            "description": "the lines of code of the new function definition",
                        },
                    },
                    "required": ["file_name", "old_code", "new_code"],
                }),
            },
        ]
    }

    /// Run a function call requested by the model
    ///
    /// Problems the model can react to come back as function messages.
    /// Only a failed `write_file` is returned as an error.
    pub async fn dispatch(&self, call: &FunctionCall) -> Result<FunctionOutcome> {
        match call.name.as_str() {
            READ_FILE => match parse_args::<ReadFileArgs>(call) {
                Ok(args) => Ok(self.read_file(&args.name).await),
                Err(outcome) => Ok(outcome),
            },
            WRITE_FILE => match parse_args::<WriteFileArgs>(call) {
                Ok(args) => self.write_file(&args.name, &args.contents).await,
                Err(outcome) => Ok(outcome),
            },
            REPLACE => match parse_args::<ReplaceArgs>(call) {
                Ok(args) => Ok(self
                    .replace(&args.file_name, &args.old_code, &args.new_code)
                    .await),
                Err(outcome) => Ok(outcome),
            },
            other => {
                error!("Model called unknown function {}", other);
                Ok(FunctionOutcome::reply(
                    other,
                    format!("ERROR unknown function: {}", other),
                ))
            }
        }
    }

    async fn read_file(&self, name: &str) -> FunctionOutcome {
        match self.store.render(name, &self.macros).await {
            Ok(content) => FunctionOutcome::reply(READ_FILE, content).touching(name, FileAction::Read),
            Err(e) => {
                error!("Error while reading file for AI: {}", e);
                FunctionOutcome::reply(READ_FILE, format!("ERROR file not found: {}", name))
            }
        }
    }

    async fn write_file(&self, name: &str, contents: &str) -> Result<FunctionOutcome> {
        self.store.write(name, contents).await.map_err(|e| {
            error!("Error while writing file for AI: {}", e);
            AiError::WriteFailed {
                name: name.to_string(),
                source: e,
            }
        })?;
        Ok(FunctionOutcome::reply(WRITE_FILE, "Done.").touching(name, FileAction::Written))
    }

    async fn replace(&self, file_name: &str, old_code: &str, new_code: &str) -> FunctionOutcome {
        if old_code.is_empty() {
            return FunctionOutcome::reply(REPLACE, "An error occurred: old_code is empty");
        }

        match self.replace_in(file_name, old_code, new_code).await {
            Ok(()) => {
                info!("Replaced code in {}", file_name);
                FunctionOutcome::reply(REPLACE, "Function Successfully replaced")
                    .touching(file_name, FileAction::Replaced)
            }
            Err(e) => FunctionOutcome::reply(REPLACE, format!("An error occurred: {}", e)),
        }
    }

    async fn replace_in(
        &self,
        file_name: &str,
        old_code: &str,
        new_code: &str,
    ) -> crate::template::Result<()> {
        let contents = self.store.read(file_name).await?;
        self.store
            .write(file_name, &contents.replace(old_code, new_code))
            .await
    }
}

fn parse_args<T: DeserializeOwned>(call: &FunctionCall) -> std::result::Result<T, FunctionOutcome> {
    serde_json::from_str(&call.arguments).map_err(|e| {
        error!("Invalid arguments for {}: {}", call.name, e);
        FunctionOutcome::reply(
            &call.name,
            format!("ERROR invalid arguments for {}: {}", call.name, e),
        )
    })
}
