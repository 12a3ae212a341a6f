//! Chat backends

pub mod openai;
pub mod scripted;

pub use openai::OpenAiBackend;
pub use scripted::ScriptedBackend;
