use async_trait::async_trait;
use kengine_core::{
    BackendMetadata, ChatBackend, ChatCompletion, ChatMessage, ChatRequest, CoreError,
    FinishReason, Result, Usage,
};
use std::collections::{BTreeSet, VecDeque};
use std::sync::{Mutex, MutexGuard};

/// Backend that plays back queued completions and records every request
///
/// Useful for running processes without a model behind them.
#[derive(Default)]
pub struct ScriptedBackend {
    script: Mutex<VecDeque<Result<ChatCompletion>>>,
    requests: Mutex<Vec<ChatRequest>>,
    /// When set, only these models are available
    models: Option<BTreeSet<String>>,
    model_lookup_fails: bool,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a completion
    pub fn push(self, completion: ChatCompletion) -> Self {
        lock(&self.script).push_back(Ok(completion));
        self
    }

    /// Queue a plain assistant reply
    pub fn reply(self, content: impl Into<String>) -> Self {
        self.reply_with_usage(content, Usage::default())
    }

    pub fn reply_with_usage(self, content: impl Into<String>, usage: Usage) -> Self {
        self.push(ChatCompletion {
            message: ChatMessage::assistant(content),
            finish_reason: FinishReason::Stop,
            usage,
        })
    }

    /// Queue a request to call a function
    pub fn function_call(self, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        self.push(ChatCompletion {
            message: ChatMessage::assistant_function_call(None, name, arguments),
            finish_reason: FinishReason::FunctionCall,
            usage: Usage::default(),
        })
    }

    /// Queue a backend failure
    pub fn fail(self, reason: impl Into<String>) -> Self {
        lock(&self.script).push_back(Err(CoreError::Backend(reason.into())));
        self
    }

    /// Restrict the available models
    pub fn with_models<I, S>(mut self, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.models = Some(models.into_iter().map(Into::into).collect());
        self
    }

    /// Make every model lookup return an error
    pub fn fail_model_lookup(mut self) -> Self {
        self.model_lookup_fails = true;
        self
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<ChatRequest> {
        lock(&self.requests).clone()
    }

    /// Completions still queued
    pub fn remaining(&self) -> usize {
        lock(&self.script).len()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatCompletion> {
        lock(&self.requests).push(request.clone());
        lock(&self.script)
            .pop_front()
            .unwrap_or_else(|| Err(CoreError::Backend("no scripted completion left".to_string())))
    }

    async fn model_available(&self, model: &str) -> Result<bool> {
        if self.model_lookup_fails {
            return Err(CoreError::Backend(format!("cannot look up model {model}")));
        }
        Ok(self
            .models
            .as_ref()
            .is_none_or(|models| models.contains(model)))
    }

    fn metadata(&self) -> BackendMetadata {
        BackendMetadata {
            name: Some("scripted".to_string()),
            endpoint: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_plays_back_in_order() {
        let backend = ScriptedBackend::new().reply("one").fail("down");
        let request = ChatRequest::new("m", vec![ChatMessage::user("hi")], 0.0);

        assert_eq!(backend.complete(&request).await.unwrap().message.text(), "one");
        assert!(backend.complete(&request).await.is_err());
        assert!(backend.complete(&request).await.is_err());
        assert_eq!(backend.requests().len(), 3);
        assert_eq!(backend.remaining(), 0);
    }

    #[tokio::test]
    async fn test_model_availability() {
        let backend = ScriptedBackend::new();
        assert!(backend.model_available("anything").await.unwrap());

        let backend = backend.with_models(["gpt-3.5-turbo"]);
        assert!(backend.model_available("gpt-3.5-turbo").await.unwrap());
        assert!(!backend.model_available("gpt-4").await.unwrap());

        let backend = backend.fail_model_lookup();
        assert!(backend.model_available("gpt-3.5-turbo").await.is_err());
    }
}
