use tracing::{error, info};

use super::error::{ProcessError, Result};
use super::model::{Process, ProcessReport};
use super::store::ProcessStore;
use crate::context::ExecutionContext;
use crate::step::Step;

/// Runs the steps of a process against an execution context
pub struct ProcessRunner {
    ctx: ExecutionContext,
    /// Where finished steps are saved back, if anywhere
    store: Option<ProcessStore>,
}

impl ProcessRunner {
    pub fn new(ctx: ExecutionContext) -> Self {
        Self { ctx, store: None }
    }

    /// Save every finished step, with its conversation and stats
    pub fn with_store(mut self, store: ProcessStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.ctx
    }

    /// Run every step in order, stopping at the first failure
    pub async fn run(&self, process: &mut Process) -> Result<ProcessReport> {
        info!(
            "Running process {} ({} steps)",
            process.name,
            process.steps.len()
        );
        process.sort_steps();
        let mut report = ProcessReport::start(process.name.as_str());

        for step in process.steps.iter_mut() {
            report.record(self.run_one(&process.name, step).await?);
        }

        let report = report.finish();
        info!(
            "Process {} finished: {} tokens, ${:.2}",
            report.process, report.totals.total_tokens, report.totals.total_cost
        );
        Ok(report)
    }

    /// Run a single named step of a process
    pub async fn run_step(&self, process: &mut Process, step_name: &str) -> Result<ProcessReport> {
        let name = process.name.clone();
        let step = process
            .step_mut(step_name)
            .ok_or_else(|| ProcessError::StepNotFound {
                process: name.clone(),
                step: step_name.to_string(),
            })?;

        let mut report = ProcessReport::start(name.as_str());
        report.record(self.run_one(&name, step).await?);
        Ok(report.finish())
    }

    async fn run_one(&self, process: &str, step: &mut Step) -> Result<crate::step::StepReport> {
        let report = step.run(process, &self.ctx).await.map_err(|source| {
            error!("Step {}/{} failed: {}", process, step.name, source);
            ProcessError::StepFailed {
                process: process.to_string(),
                step: step.name.clone(),
                source,
            }
        })?;

        if let Some(store) = &self.store {
            store.save(process, step).await?;
        }
        Ok(report)
    }
}
