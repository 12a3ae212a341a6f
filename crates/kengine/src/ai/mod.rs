//! Multi-turn chat with file functions, token and cost accounting

pub mod client;
pub mod error;
pub mod functions;
pub mod pricing;
pub mod stats;

pub use client::{Ai, DEFAULT_MODEL};
pub use error::{AiError, Result};
pub use functions::{FileAction, FileFunctions, FunctionOutcome};
pub use pricing::{ModelPricing, PricingTable};
pub use stats::ExecutionStats;
