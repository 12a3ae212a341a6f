//! Main crate for Kengine, the Knowledge Engineer workflow runner
//!
//! Prompts live in a file-backed template store as short line-oriented
//! scripts. Steps compile a prompt, play it against a chat model that may
//! read and write store files through function calls, and keep token and
//! cost statistics. Processes run their steps in order.

pub mod ai;
pub mod app;
pub mod backend;
pub mod config;
pub mod context;
pub mod error;
pub mod process;
pub mod step;
pub mod storage;
pub mod telemetry;
pub mod template;
pub mod transcript;

// Re-export core types
pub use kengine_core::{
    BackendMetadata, ChatBackend, ChatBackendExt, ChatCompletion, ChatMessage, ChatRequest,
    CoreError, FinishReason, FunctionCall, FunctionDefinition, Role, RunId, SharedBackend, Usage,
};

pub use ai::{Ai, ExecutionStats, FileAction, FileFunctions, ModelPricing, PricingTable};
pub use app::{AppMetadata, KengineApp, KengineAppBuilder};
pub use backend::{OpenAiBackend, ScriptedBackend};
pub use config::{ApiConfig, EngineConfig, KengineConfig};
pub use context::ExecutionContext;
pub use error::{KengineError, Result};
pub use process::{Process, ProcessError, ProcessReport, ProcessRunner, ProcessStore};
pub use step::{Step, StepError, StepReport};
pub use template::{Compiler, MacroTable, PromptItem, TemplateError, TemplateStore};
pub use transcript::Transcript;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::app::KengineApp;
    pub use crate::config::KengineConfig;
    pub use crate::process::{Process, ProcessStore};
    pub use crate::step::Step;
    pub use crate::template::{MacroTable, TemplateStore};
    pub use kengine_core::{ChatBackend, ChatMessage, Role};
}
