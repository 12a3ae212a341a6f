use thiserror::Error;

use crate::step::StepError;
use crate::storage::StorageError;
use crate::template::TemplateError;

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Process item not found: {0}")]
    NotFound(String),

    #[error("Step {process}/{step} not found")]
    StepNotFound { process: String, step: String },

    #[error("Invalid step file {key}: {source}")]
    InvalidStep {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Step {process}/{step} failed: {source}")]
    StepFailed {
        process: String,
        step: String,
        #[source]
        source: StepError,
    },

    #[error("Invalid name: {0}")]
    InvalidName(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub type Result<T> = std::result::Result<T, ProcessError>;
