use thiserror::Error;

use crate::template::TemplateError;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("Failed to write {name} for the model: {source}")]
    WriteFailed {
        name: String,
        #[source]
        source: TemplateError,
    },
}

pub type Result<T> = std::result::Result<T, AiError>;
