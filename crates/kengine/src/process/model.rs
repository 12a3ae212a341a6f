use chrono::{DateTime, Utc};
use kengine_core::RunId;
use serde::{Deserialize, Serialize};

use crate::ai::ExecutionStats;
use crate::step::{Step, StepReport};

/// A named, ordered list of steps
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Process {
    pub name: String,
    /// Kept sorted by step name
    pub steps: Vec<Step>,
}

impl Process {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    /// Add a step, replacing any step with the same name
    pub fn add_step(&mut self, step: Step) {
        match self.steps.binary_search_by(|s| s.name.cmp(&step.name)) {
            Ok(idx) => self.steps[idx] = step,
            Err(idx) => self.steps.insert(idx, step),
        }
    }

    pub fn with_step(mut self, step: Step) -> Self {
        self.add_step(step);
        self
    }

    /// Restore name order after direct edits to `steps`
    pub fn sort_steps(&mut self) {
        self.steps.sort_by(|a, b| a.name.cmp(&b.name));
    }

    pub fn step(&self, name: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.name == name)
    }

    pub fn step_mut(&mut self, name: &str) -> Option<&mut Step> {
        self.steps.iter_mut().find(|s| s.name == name)
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name.as_str()).collect()
    }
}

/// Outcome of running a process or one of its steps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessReport {
    pub run_id: RunId,
    pub process: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub steps: Vec<StepReport>,
    pub totals: ExecutionStats,
}

impl ProcessReport {
    pub(crate) fn start(process: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            run_id: RunId::new(),
            process: process.into(),
            started_at: now,
            finished_at: now,
            steps: Vec::new(),
            totals: ExecutionStats::default(),
        }
    }

    pub(crate) fn record(&mut self, report: StepReport) {
        self.totals.merge(&report.stats);
        self.steps.push(report);
    }

    pub(crate) fn finish(mut self) -> Self {
        self.finished_at = Utc::now();
        self
    }
}
