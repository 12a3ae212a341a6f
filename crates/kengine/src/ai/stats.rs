use kengine_core::Usage;
use serde::{Deserialize, Serialize};

use super::ModelPricing;

/// Token, cost and timing statistics of a step or process
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionStats {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    /// USD
    pub prompt_cost: f64,
    /// USD
    pub completion_cost: f64,
    /// USD
    pub total_cost: f64,
    pub elapsed_secs: f64,
    /// Number of requests sent to the model
    pub interactions: u32,
}

impl ExecutionStats {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Add the usage of one completion
    pub fn absorb(&mut self, usage: &Usage) {
        self.prompt_tokens += usage.prompt_tokens;
        self.completion_tokens += usage.completion_tokens;
        self.total_tokens = self.prompt_tokens + self.completion_tokens;
    }

    /// Recompute costs from the accumulated token counts
    pub fn apply_pricing(&mut self, pricing: Option<&ModelPricing>) {
        let (prompt, completion) = pricing
            .map(|p| p.cost(self.prompt_tokens, self.completion_tokens))
            .unwrap_or((0.0, 0.0));
        self.prompt_cost = prompt;
        self.completion_cost = completion;
        self.total_cost = prompt + completion;
    }

    /// Sum another set of statistics into this one
    pub fn merge(&mut self, other: &ExecutionStats) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
        self.prompt_cost += other.prompt_cost;
        self.completion_cost += other.completion_cost;
        self.total_cost += other.total_cost;
        self.elapsed_secs += other.elapsed_secs;
        self.interactions += other.interactions;
    }

    /// Elapsed time as whole minutes and remaining seconds
    pub fn elapsed_parts(&self) -> (u64, f64) {
        let minutes = (self.elapsed_secs / 60.0).floor();
        (minutes as u64, self.elapsed_secs - minutes * 60.0)
    }
}
