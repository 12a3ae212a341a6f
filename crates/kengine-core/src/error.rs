//! Error types for kengine-core

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
