//! Pipeline state
//!
//! Results of completed steps, keyed by step name. Plan factories read this
//! to wire one step's outputs into the next step's inputs.

use crate::step::fs::{Directory, File};
use crate::step::StepResult;
use std::collections::BTreeMap;

/// Completed step results visible to downstream plan factories
#[derive(Debug, Clone, Default)]
pub struct PipelineState {
    results: BTreeMap<String, StepResult>,
}

impl PipelineState {
    /// Creates an empty state
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The result of a completed step, if it ran and succeeded
    #[must_use]
    pub fn result(&self, step: &str) -> Option<&StepResult> {
        self.results.get(step)
    }

    /// A captured directory output of a completed step
    #[must_use]
    pub fn directory(&self, step: &str, path: &str) -> Option<&Directory> {
        self.results.get(step).and_then(|r| r.directory(path))
    }

    /// A captured file output of a completed step
    #[must_use]
    pub fn file(&self, step: &str, path: &str) -> Option<&File> {
        self.results.get(step).and_then(|r| r.file(path))
    }

    /// Names of steps with recorded results
    pub fn completed(&self) -> impl Iterator<Item = &str> {
        self.results.keys().map(String::as_str)
    }

    pub(crate) fn record(&mut self, step: impl Into<String>, result: StepResult) {
        self.results.insert(step.into(), result);
    }
}
