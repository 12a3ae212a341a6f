use thiserror::Error;

use crate::ai::AiError;
use crate::template::TemplateError;

#[derive(Debug, Error)]
pub enum StepError {
    #[error("Prompt {prompt} of step {step} could not be loaded: {source}")]
    Prompt {
        step: String,
        prompt: String,
        #[source]
        source: TemplateError,
    },

    #[error("Invalid step {step}: {reason}")]
    Invalid { step: String, reason: String },

    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    #[error("AI error: {0}")]
    Ai(#[from] AiError),
}

pub type Result<T> = std::result::Result<T, StepError>;
