//! # Kengine Core
//!
//! Chat types and the backend abstraction shared by the Kengine workflow engine.

pub mod backend;
pub mod error;
pub mod message;
pub mod types;

pub use backend::{BackendMetadata, ChatBackend, ChatBackendExt, SharedBackend};
pub use error::{CoreError, Result};
pub use message::{
    ChatCompletion, ChatMessage, ChatRequest, FinishReason, FunctionCall, FunctionDefinition,
    Role, Usage,
};
pub use types::RunId;
