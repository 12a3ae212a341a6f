use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Price of a model in USD per 1K tokens
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ModelPricing {
    pub input: f64,
    pub output: f64,
    /// Context window in tokens
    #[serde(default)]
    pub context: u64,
}

impl ModelPricing {
    /// Prompt and completion cost for the given token counts
    pub fn cost(&self, prompt_tokens: u64, completion_tokens: u64) -> (f64, f64) {
        (
            self.input * (prompt_tokens as f64 / 1000.0),
            self.output * (completion_tokens as f64 / 1000.0),
        )
    }
}

/// Prices keyed by model name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PricingTable(BTreeMap<String, ModelPricing>);

impl PricingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, model: impl Into<String>, pricing: ModelPricing) {
        self.0.insert(model.into(), pricing);
    }

    pub fn get(&self, model: &str) -> Option<&ModelPricing> {
        self.0.get(model)
    }

    /// Known model names, sorted
    pub fn models(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl From<BTreeMap<String, ModelPricing>> for PricingTable {
    fn from(map: BTreeMap<String, ModelPricing>) -> Self {
        Self(map)
    }
}
