//! Steps: a prompt, its model settings and what to do with the answer

pub mod error;
pub mod model;
mod run;

pub use error::{Result, StepError};
pub use model::{Step, StepReport};
