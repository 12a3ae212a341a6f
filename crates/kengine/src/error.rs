//! Error types for the kengine crate

use thiserror::Error;

use crate::ai::AiError;
use crate::process::ProcessError;
use crate::step::StepError;
use crate::storage::StorageError;
use crate::template::TemplateError;

#[derive(Error, Debug)]
pub enum KengineError {
    #[error("Core error: {0}")]
    Core(#[from] kengine_core::CoreError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    #[error("AI error: {0}")]
    Ai(#[from] AiError),

    #[error("Step error: {0}")]
    Step(#[from] StepError),

    #[error("Process error: {0}")]
    Process(#[from] ProcessError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Build error: {0}")]
    Build(String),
}

pub type Result<T> = std::result::Result<T, KengineError>;
