//! Chat backend trait for kengine-core
//!
//! A backend turns a [`ChatRequest`] into a [`ChatCompletion`]. The engine only
//! ever talks to this trait, so hosted APIs, local servers and scripted test
//! doubles are interchangeable.

use crate::{ChatCompletion, ChatRequest, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Core trait for chat-completion providers
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Send the conversation and return the first choice
    async fn complete(&self, request: &ChatRequest) -> Result<ChatCompletion>;

    /// Whether the given model can be used with this backend
    async fn model_available(&self, _model: &str) -> Result<bool> {
        Ok(true)
    }

    /// Optional method to get backend metadata
    fn metadata(&self) -> BackendMetadata {
        BackendMetadata::default()
    }
}

/// Metadata about a backend
#[derive(Debug, Clone, Default)]
pub struct BackendMetadata {
    /// Human-readable name of the backend
    pub name: Option<String>,
    /// Base URL or other endpoint description
    pub endpoint: Option<String>,
}

/// Arc-wrapped backend for thread-safe sharing
pub type SharedBackend = Arc<dyn ChatBackend>;

/// Extension trait for backends
pub trait ChatBackendExt: ChatBackend {
    /// Convert to a shared backend
    fn shared(self) -> SharedBackend
    where
        Self: Sized + 'static,
    {
        Arc::new(self)
    }
}

impl<T: ChatBackend> ChatBackendExt for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ChatMessage, FinishReason, Usage};

    /// Echoes the last message back as the assistant
    struct EchoBackend;

    #[async_trait]
    impl ChatBackend for EchoBackend {
        async fn complete(&self, request: &ChatRequest) -> Result<ChatCompletion> {
            let last = request
                .messages
                .last()
                .map(|m| m.text().to_string())
                .unwrap_or_default();
            Ok(ChatCompletion {
                message: ChatMessage::assistant(last),
                finish_reason: FinishReason::Stop,
                usage: Usage::default(),
            })
        }
    }

    #[tokio::test]
    async fn test_echo_backend() {
        let backend = EchoBackend.shared();
        let request = ChatRequest::new("test-model", vec![ChatMessage::user("Hello")], 0.0);
        let completion = backend.complete(&request).await.unwrap();
        assert_eq!(completion.message.text(), "Hello");
        assert!(backend.model_available("anything").await.unwrap());
        assert!(backend.metadata().name.is_none());
    }
}
