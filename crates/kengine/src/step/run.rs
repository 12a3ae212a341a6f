use std::time::Instant;
use tracing::{info, warn};

use super::error::{Result, StepError};
use super::model::{Step, StepReport};
use crate::ai::FileFunctions;
use crate::context::ExecutionContext;
use crate::template::{MacroTable, is_backup};
use crate::transcript::Transcript;

impl Step {
    /// Run the step as part of `process_name`
    pub async fn run(&mut self, process_name: &str, ctx: &ExecutionContext) -> Result<StepReport> {
        let started = Instant::now();
        self.validate()?;

        // a prompt that fails to compile leaves the last conversation intact
        let macros = ctx.macros.layered(&self.macros);
        let items = ctx
            .memory
            .get_messages(&self.prompt_name, &macros)
            .await
            .map_err(|source| StepError::Prompt {
                step: self.name.clone(),
                prompt: self.prompt_name.clone(),
                source,
            })?;

        self.ai.reset();
        self.ai
            .ensure_model(ctx.backend.as_ref(), &ctx.engine.fallback_model)
            .await;

        let mut transcript = Transcript::new(process_name, &self.name);
        transcript.header(&format!(
            "Step: {}:{} -- {}",
            process_name, self.name, self.prompt_name
        ));
        transcript.note(&format!(
            "Model: {}, Temperature: {}, Max Tokens: {}",
            self.ai.model, self.ai.temperature, self.ai.max_tokens
        ));

        let functions = FileFunctions::new(ctx.memory.clone(), macros.clone());
        let mut answer = self
            .ai
            .generate(ctx, &functions, &mut transcript, &self.prompt_name, items)
            .await?;

        let processed_files = if self.file_process_enabled {
            self.process_files(ctx, &macros, &mut transcript, &mut answer)
                .await?
        } else {
            Vec::new()
        };
        self.ai.answer = answer;

        let text_file = self.text_file_key();
        if let Some(key) = &text_file {
            ctx.memory.write(key, &self.ai.answer).await?;
            transcript.note(&format!("Writing {}", key));
        }

        self.ai.stats.elapsed_secs = started.elapsed().as_secs_f64();
        let stats = self.ai.stats;
        let over_budget = stats.total_tokens > u64::from(self.ai.max_tokens);
        let (mins, secs) = stats.elapsed_parts();
        transcript.note(&format!(
            "Elapsed: {}m {:.2}s Token Usage: Total: {} (Prompt: {}, Completion: {})",
            mins, secs, stats.total_tokens, stats.prompt_tokens, stats.completion_tokens
        ));
        transcript.note(&format!(
            "Costs:: Total: ${:.2} (Prompt: ${:.4}, Completion: ${:.4})",
            stats.total_cost, stats.prompt_cost, stats.completion_cost
        ));
        if over_budget {
            warn!(
                "{}:{} used {} tokens, over its budget of {}",
                process_name, self.name, stats.total_tokens, self.ai.max_tokens
            );
        }
        transcript.footer();

        Ok(StepReport {
            process: process_name.to_string(),
            step: self.name.clone(),
            prompt_name: self.prompt_name.clone(),
            model: self.ai.model.clone(),
            answer: self.ai.answer.clone(),
            files: self.ai.files.clone(),
            processed_files,
            text_file,
            stats,
            over_budget,
        })
    }

    fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| StepError::Invalid {
            step: self.name.clone(),
            reason: reason.to_string(),
        };
        if self.prompt_name.trim().is_empty() {
            return Err(invalid("prompt_name is empty"));
        }
        if self.file_process_enabled {
            if self.file_process_name.trim().is_empty() {
                return Err(invalid("file processing needs file_process_name"));
            }
            if self.file_glob.trim().is_empty() {
                return Err(invalid("file processing needs file_glob"));
            }
        }
        Ok(())
    }

    /// Run `file_process_name` once per matching memory file
    async fn process_files(
        &mut self,
        ctx: &ExecutionContext,
        macros: &MacroTable,
        transcript: &mut Transcript,
        answer: &mut String,
    ) -> Result<Vec<String>> {
        let files: Vec<String> = ctx
            .memory
            .glob_files(&self.file_glob)
            .await?
            .into_iter()
            .filter(|key| !is_backup(key))
            .collect();
        info!(
            "Processing {} files matching {} with {}",
            files.len(),
            self.file_glob,
            self.file_process_name
        );

        for file in &files {
            let file_macros = macros
                .clone()
                .with("file_name", file.as_str())
                .with("file_stem", file_stem(file));
            let items = ctx
                .memory
                .get_messages(&self.file_process_name, &file_macros)
                .await
                .map_err(|source| StepError::Prompt {
                    step: self.name.clone(),
                    prompt: self.file_process_name.clone(),
                    source,
                })?;

            transcript.note(&format!("File: {}", file));
            self.ai.messages.clear();
            let functions = FileFunctions::new(ctx.memory.clone(), file_macros);
            let file_answer = self
                .ai
                .generate(ctx, &functions, transcript, &self.file_process_name, items)
                .await?;
            answer.push_str("\n\n");
            answer.push_str(&file_answer);
        }

        Ok(files)
    }
}

/// File name without directories or the last extension
fn file_stem(key: &str) -> &str {
    let name = key.rsplit_once('/').map_or(key, |(_, name)| name);
    match name.rfind('.') {
        Some(idx) if idx > 0 => &name[..idx],
        _ => name,
    }
}
