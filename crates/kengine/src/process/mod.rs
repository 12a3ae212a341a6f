//! Processes: ordered steps stored as `.kestep` files, and their runner

pub mod error;
pub mod model;
pub mod runner;
pub mod store;

pub use error::{ProcessError, Result};
pub use model::{Process, ProcessReport};
pub use runner::ProcessRunner;
pub use store::{ProcessStore, STEP_EXTENSION};
