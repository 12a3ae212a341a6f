use async_trait::async_trait;
use kengine_core::{
    BackendMetadata, ChatBackend, ChatCompletion, ChatMessage, ChatRequest, CoreError,
    FinishReason, Result, Usage,
};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::ApiConfig;

/// Chat backend for OpenAI-compatible HTTP APIs
pub struct OpenAiBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct WireRequest<'a> {
    #[serde(flatten)]
    request: &'a ChatRequest,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_call: Option<&'static str>,
}

#[derive(Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
    #[serde(default)]
    usage: Usage,
}

#[derive(Deserialize)]
struct WireChoice {
    message: ChatMessage,
    #[serde(default)]
    finish_reason: Option<FinishReason>,
}

impl OpenAiBackend {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Result<Self> {
        Self::with_timeout(base_url, api_key, Duration::from_secs(120))
    }

    pub fn with_timeout(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CoreError::Backend(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Build from configuration, reading the key from the environment
    pub fn from_config(config: &ApiConfig) -> Result<Self> {
        Self::with_timeout(
            config.base_url.clone(),
            config.api_key(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }
}

#[async_trait]
impl ChatBackend for OpenAiBackend {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatCompletion> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!("POST {} model={} messages={}", url, request.model, request.messages.len());

        let res = self
            .authorized(self.client.post(&url))
            .json(&request_body(request))
            .send()
            .await
            .map_err(|e| CoreError::Backend(format!("Request to {} failed: {}", url, e)))?;

        let status = res.status();
        let body = res
            .text()
            .await
            .map_err(|e| CoreError::Backend(format!("Failed to read response: {}", e)))?;
        if !status.is_success() {
            return Err(CoreError::Backend(format!("Status: {} - {}", status, body)));
        }

        parse_completion(&body)
    }

    async fn model_available(&self, model: &str) -> Result<bool> {
        let url = format!("{}/models/{}", self.base_url, model);
        let res = self
            .authorized(self.client.get(&url))
            .send()
            .await
            .map_err(|e| CoreError::Backend(format!("Request to {} failed: {}", url, e)))?;

        match res.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => {
                let body = res.text().await.unwrap_or_default();
                Err(CoreError::Backend(format!("Status: {} - {}", status, body)))
            }
        }
    }

    fn metadata(&self) -> BackendMetadata {
        BackendMetadata {
            name: Some("openai".to_string()),
            endpoint: Some(self.base_url.clone()),
        }
    }
}

fn request_body(request: &ChatRequest) -> WireRequest<'_> {
    WireRequest {
        request,
        function_call: (!request.functions.is_empty()).then_some("auto"),
    }
}

/// First choice and usage of a chat completion response body
fn parse_completion(body: &str) -> Result<ChatCompletion> {
    let response: WireResponse = serde_json::from_str(body)?;
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| CoreError::InvalidResponse("response has no choices".to_string()))?;

    let finish_reason = match choice.finish_reason {
        Some(reason) => reason,
        None if choice.message.function_call.is_some() => FinishReason::FunctionCall,
        None => FinishReason::Stop,
    };

    Ok(ChatCompletion {
        message: choice.message,
        finish_reason,
        usage: response.usage,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use kengine_core::{FunctionDefinition, Role};
    use serde_json::json;

    #[test]
    fn test_request_body() {
        let request = ChatRequest::new("gpt-4", vec![ChatMessage::user("Hi")], 0.2);
        let body = serde_json::to_value(request_body(&request)).unwrap();
        assert_eq!(body["model"], "gpt-4");
        assert_eq!(body["messages"][0]["role"], "user");
        assert!(body.get("functions").is_none());
        assert!(body.get("function_call").is_none());

        let request = request.with_functions(vec![FunctionDefinition {
            name: "read_file".to_string(),
            description: "Read".to_string(),
            parameters: json!({"type": "object"}),
        }]);
        let body = serde_json::to_value(request_body(&request)).unwrap();
        assert_eq!(body["functions"][0]["name"], "read_file");
        assert_eq!(body["function_call"], "auto");
    }

    #[test]
    fn test_parse_text_completion() {
        let body = json!({
            "id": "chatcmpl-1",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "Hello"},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 9, "completion_tokens": 2, "total_tokens": 11}
        });
        let completion = parse_completion(&body.to_string()).unwrap();
        assert_eq!(completion.message.role, Role::Assistant);
        assert_eq!(completion.message.text(), "Hello");
        assert_eq!(completion.finish_reason, FinishReason::Stop);
        assert_eq!(completion.usage.total_tokens, 11);
        assert!(completion.function_call().is_none());
    }

    #[test]
    fn test_parse_function_call() {
        let body = json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "function_call": {"name": "read_file", "arguments": "{\"name\": \"a.py\"}"}
                },
                "finish_reason": "function_call"
            }]
        });
        let completion = parse_completion(&body.to_string()).unwrap();
        let call = completion.function_call().unwrap();
        assert_eq!(call.name, "read_file");
        assert_eq!(completion.usage, Usage::default());
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            parse_completion(r#"{"choices": []}"#),
            Err(CoreError::InvalidResponse(_))
        ));
        assert!(matches!(
            parse_completion("not json"),
            Err(CoreError::Serialization(_))
        ));
    }

    #[test]
    fn test_base_url_is_trimmed() {
        let backend = OpenAiBackend::new("http://localhost:1234/v1/", None).unwrap();
        assert_eq!(
            backend.metadata().endpoint.as_deref(),
            Some("http://localhost:1234/v1")
        );
    }
}
