use thiserror::Error;

/// Errors raised while parsing template lines
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    #[error("{origin}:{line}: unknown directive '.{directive}'")]
    UnknownDirective {
        origin: String,
        line: usize,
        directive: String,
    },

    #[error("{origin}:{line}: '.include' needs a template name")]
    MissingIncludeName { origin: String, line: usize },

    #[error("{origin}:{line}: include of '{name}' was not resolved")]
    UnresolvedInclude {
        origin: String,
        line: usize,
        name: String,
    },
}

/// Template store errors
#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Template not found: {0}")]
    NotFound(String),

    #[error("Compile error: {0}")]
    Compile(#[from] CompileError),

    #[error("Include cycle: {0}")]
    IncludeCycle(String),

    #[error("Include depth limit of {limit} exceeded at '{name}'")]
    IncludeDepth { name: String, limit: usize },

    #[error("Invalid glob pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Storage error: {0}")]
    StorageError(#[from] crate::storage::StorageError),
}

/// Result type for template operations
pub type Result<T> = std::result::Result<T, TemplateError>;
