use kengine_core::{ChatBackend, ChatMessage, ChatRequest};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, error, warn};

use super::error::Result;
use super::functions::{FileAction, FileFunctions};
use super::stats::ExecutionStats;
use crate::context::ExecutionContext;
use crate::template::PromptItem;
use crate::transcript::Transcript;

pub const DEFAULT_MODEL: &str = "gpt-4";
const CONTINUE_SUFFIX: &str = "continue?";
const CONTINUE_REPLY: &str = "Continue.";

/// Conversation state and settings of one step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Ai {
    pub model: String,
    pub temperature: f32,
    /// Token budget; exceeding it is reported, not enforced
    pub max_tokens: u32,
    pub mode: String,
    pub messages: Vec<ChatMessage>,
    pub answer: String,
    /// Files touched by function calls, with the last action on each
    pub files: BTreeMap<String, FileAction>,
    pub stats: ExecutionStats,
}

impl Default for Ai {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.0,
            max_tokens: 2000,
            mode: "complete".to_string(),
            messages: Vec::new(),
            answer: String::new(),
            files: BTreeMap::new(),
            stats: ExecutionStats::default(),
        }
    }
}

impl Ai {
    /// Forget the previous run
    pub fn reset(&mut self) {
        self.messages.clear();
        self.answer.clear();
        self.files.clear();
        self.stats.reset();
    }

    /// Switch to `fallback` when the backend cannot serve the model
    pub async fn ensure_model(&mut self, backend: &dyn ChatBackend, fallback: &str) {
        if self.model == fallback {
            return;
        }
        match backend.model_available(&self.model).await {
            Ok(true) => {}
            Ok(false) => {
                warn!(
                    "Model {} is not available, using {} instead",
                    self.model, fallback
                );
                self.model = fallback.to_string();
            }
            Err(e) => {
                error!("Failed to look up model {}: {}", self.model, e);
                warn!("Using {} instead of {}", fallback, self.model);
                self.model = fallback.to_string();
            }
        }
    }

    /// Play compiled prompt items against the model
    ///
    /// Messages accumulate until an `Exec`, which runs the conversation until
    /// the model gives a final reply. Returns the answer log of this call.
    pub async fn generate(
        &mut self,
        ctx: &ExecutionContext,
        functions: &FileFunctions,
        transcript: &mut Transcript,
        prompt_name: &str,
        items: Vec<PromptItem>,
    ) -> Result<String> {
        self.answer = format!("Log of Step: {} : {}\n", transcript.step(), prompt_name);

        let mut box_open = false;
        for item in items {
            if !box_open {
                transcript.open_box();
                box_open = true;
            }
            match item {
                PromptItem::Message(message) => {
                    transcript.message(&message);
                    self.messages.push(message);
                }
                PromptItem::Exec => {
                    self.exchange(ctx, functions, transcript).await?;
                    transcript.close_box();
                    box_open = false;
                }
            }
        }
        if box_open {
            transcript.close_box();
        }

        let pricing = ctx.pricing.get(&self.model);
        if pricing.is_none() {
            warn!("No pricing for model {}, costs are reported as zero", self.model);
        }
        self.stats.apply_pricing(pricing);

        Ok(self.answer.clone())
    }

    /// Send the conversation until the model stops asking for functions
    async fn exchange(
        &mut self,
        ctx: &ExecutionContext,
        functions: &FileFunctions,
        transcript: &mut Transcript,
    ) -> Result<()> {
        let limit = ctx.engine.max_interactions;
        let mut requests = 0;

        loop {
            if requests >= limit {
                warn!(
                    "{}/{} reached {} requests without a final reply, moving on",
                    transcript.process(),
                    transcript.step(),
                    limit
                );
                return Ok(());
            }
            requests += 1;
            transcript.next_interaction();
            self.stats.interactions += 1;

            let request = ChatRequest::new(&self.model, self.messages.clone(), self.temperature)
                .with_functions(FileFunctions::definitions());
            let completion = match ctx.backend.complete(&request).await {
                Ok(completion) => completion,
                Err(e) => {
                    warn!("Call to chat API returned error: {}", e);
                    return Ok(());
                }
            };
            self.stats.absorb(&completion.usage);

            if let Some(call) = completion.function_call().cloned() {
                let message = ChatMessage::assistant_function_call(
                    completion.message.content.clone(),
                    call.name.clone(),
                    call.arguments.clone(),
                );
                transcript.message(&message);
                self.messages.push(message);

                let outcome = functions.dispatch(&call).await?;
                if let Some((file, action)) = outcome.touched {
                    self.files.insert(file, action);
                }
                transcript.message(&outcome.message);
                self.messages.push(outcome.message);
                continue;
            }

            let content = completion.message.text().to_string();
            self.answer.push_str("\n\n - ");
            self.answer.push_str(&content);

            let reply = ChatMessage::assistant(content.as_str());
            transcript.message(&reply);
            self.messages.push(reply);

            if wants_continue(&content) {
                debug!("Model asked to continue");
                let nudge = ChatMessage::user(CONTINUE_REPLY);
                transcript.message(&nudge);
                self.messages.push(nudge);
                continue;
            }
            return Ok(());
        }
    }
}

fn wants_continue(content: &str) -> bool {
    content.to_lowercase().ends_with(CONTINUE_SUFFIX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::ModelPricing;
    use crate::backend::ScriptedBackend;
    use crate::storage::InMemoryStorage;
    use crate::template::{MacroTable, TemplateStore};
    use kengine_core::{ChatBackendExt, Role, Usage};
    use std::sync::Arc;

    fn setup(backend: ScriptedBackend) -> (Arc<ScriptedBackend>, ExecutionContext, FileFunctions) {
        let backend = Arc::new(backend);
        let store = TemplateStore::new(Arc::new(InMemoryStorage::new()));
        let ctx = ExecutionContext::new(backend.clone(), store.clone());
        let functions = FileFunctions::new(store, MacroTable::new());
        (backend, ctx, functions)
    }

    fn usage(prompt: u64, completion: u64) -> Usage {
        Usage {
            prompt_tokens: prompt,
            completion_tokens: completion,
            total_tokens: prompt + completion,
        }
    }

    #[test]
    fn test_wants_continue() {
        assert!(wants_continue("Shall I Continue?"));
        assert!(wants_continue("continue?"));
        assert!(!wants_continue("continue? Done."));
    }

    #[test]
    fn test_serde_defaults() {
        let ai: Ai = serde_json::from_str(r#"{"model": "gpt-4o", "temperature": 0.5}"#).unwrap();
        assert_eq!(ai.model, "gpt-4o");
        assert_eq!(ai.max_tokens, 2000);
        assert!(ai.messages.is_empty());
    }

    #[tokio::test]
    async fn test_generate_collects_answers() {
        let backend = ScriptedBackend::new()
            .reply_with_usage("First.", usage(100, 10))
            .reply_with_usage("Second.", usage(200, 20));
        let (backend, mut ctx, functions) = setup(backend);
        ctx.pricing.insert(
            "gpt-4",
            ModelPricing {
                input: 0.03,
                output: 0.06,
                context: 8000,
            },
        );

        let items = vec![
            PromptItem::Message(ChatMessage::system("Be brief.")),
            PromptItem::Message(ChatMessage::user("One?")),
            PromptItem::Exec,
            PromptItem::Message(ChatMessage::user("Two?")),
            PromptItem::Exec,
        ];
        let mut ai = Ai::default();
        let mut transcript = Transcript::new("proc", "step");
        let answer = ai
            .generate(&ctx, &functions, &mut transcript, "Prompts/p", items)
            .await
            .unwrap();

        assert_eq!(answer, "Log of Step: step : Prompts/p\n\n\n - First.\n\n - Second.");
        assert_eq!(transcript.interaction(), 2);
        assert_eq!(ai.stats.total_tokens, 330);
        assert!((ai.stats.prompt_cost - 0.009).abs() < 1e-12);

        let requests = backend.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].messages.len(), 2);
        // second request carries the first reply
        assert_eq!(requests[1].messages.len(), 4);
        assert_eq!(requests[1].messages[2].role, Role::Assistant);
        assert_eq!(requests[0].functions.len(), 3);
    }

    #[tokio::test]
    async fn test_function_call_round_trip() {
        let backend = ScriptedBackend::new()
            .function_call("write_file", r#"{"name": "Code/a.py", "contents": "print(1)"}"#)
            .reply("Written.");
        let (backend, ctx, functions) = setup(backend);

        let mut ai = Ai::default();
        let mut transcript = Transcript::new("proc", "step");
        ai.generate(
            &ctx,
            &functions,
            &mut transcript,
            "p",
            vec![PromptItem::Message(ChatMessage::user("Code.")), PromptItem::Exec],
        )
        .await
        .unwrap();

        assert_eq!(ctx.memory.read("Code/a.py").await.unwrap(), "print(1)");
        assert_eq!(ai.files.get("Code/a.py"), Some(&FileAction::Written));

        let roles: Vec<Role> = ai.messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::User, Role::Assistant, Role::Function, Role::Assistant]
        );
        assert_eq!(backend.requests()[1].messages[2].text(), "Done.");
    }

    #[tokio::test]
    async fn test_continue_prompt_is_answered() {
        let backend = ScriptedBackend::new()
            .reply("Part one. Continue?")
            .reply("Part two.");
        let (backend, ctx, functions) = setup(backend);

        let mut ai = Ai::default();
        let mut transcript = Transcript::new("proc", "step");
        let answer = ai
            .generate(
                &ctx,
                &functions,
                &mut transcript,
                "p",
                vec![PromptItem::Message(ChatMessage::user("Go.")), PromptItem::Exec],
            )
            .await
            .unwrap();

        assert!(answer.ends_with(" - Part one. Continue?\n\n - Part two."));
        let second = &backend.requests()[1];
        assert_eq!(second.messages.last().unwrap().text(), "Continue.");
    }

    #[tokio::test]
    async fn test_backend_error_abandons_group() {
        let backend = ScriptedBackend::new()
            .fail("rate limited")
            .reply("Recovered.");
        let (_, ctx, functions) = setup(backend);

        let mut ai = Ai::default();
        let mut transcript = Transcript::new("proc", "step");
        let answer = ai
            .generate(
                &ctx,
                &functions,
                &mut transcript,
                "p",
                vec![
                    PromptItem::Message(ChatMessage::user("A")),
                    PromptItem::Exec,
                    PromptItem::Message(ChatMessage::user("B")),
                    PromptItem::Exec,
                ],
            )
            .await
            .unwrap();

        assert_eq!(answer, "Log of Step: step : p\n\n\n - Recovered.");
    }

    #[tokio::test]
    async fn test_interaction_limit() {
        let mut backend = ScriptedBackend::new();
        for _ in 0..5 {
            backend = backend.reply("More? continue?");
        }
        let (backend, mut ctx, functions) = setup(backend);
        ctx.engine.max_interactions = 3;

        let mut ai = Ai::default();
        let mut transcript = Transcript::new("proc", "step");
        ai.generate(
            &ctx,
            &functions,
            &mut transcript,
            "p",
            vec![PromptItem::Message(ChatMessage::user("Go.")), PromptItem::Exec],
        )
        .await
        .unwrap();

        assert_eq!(backend.requests().len(), 3);
        assert_eq!(ai.stats.interactions, 3);
    }

    #[tokio::test]
    async fn test_ensure_model_falls_back() {
        let backend = ScriptedBackend::new().with_models(["gpt-3.5-turbo"]).shared();

        let mut ai = Ai::default();
        ai.ensure_model(backend.as_ref(), "gpt-3.5-turbo").await;
        assert_eq!(ai.model, "gpt-3.5-turbo");

        let backend = ScriptedBackend::new().with_models(["gpt-4", "gpt-3.5-turbo"]);
        let mut ai = Ai::default();
        ai.ensure_model(&backend, "gpt-3.5-turbo").await;
        assert_eq!(ai.model, "gpt-4");
    }

    #[tokio::test]
    async fn test_ensure_model_falls_back_when_lookup_fails() {
        let backend = ScriptedBackend::new().fail_model_lookup();
        let mut ai = Ai::default();
        ai.ensure_model(&backend, "gpt-3.5-turbo").await;
        assert_eq!(ai.model, "gpt-3.5-turbo");
    }
}
