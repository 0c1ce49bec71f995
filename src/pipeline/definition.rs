//! Pipeline definitions
//!
//! A pipeline is a named, ordered list of steps. Each step carries a plan
//! factory closure over the [`PipelineState`], a [`GatePolicy`], and an
//! optional list of artifact exports collected into the final report.

use crate::executor::StepError;
use crate::pipeline::state::PipelineState;
use crate::step::{StepPlan, StepResult};
use std::fmt;
use std::sync::Arc;

/// Builds a step plan from the results of earlier steps
pub type PlanFactory = Box<dyn Fn(&PipelineState) -> Result<StepPlan, StepError>>;

/// Inspects a successful step result; a returned finding halts the pipeline
pub type GatePredicate = Arc<dyn Fn(&StepResult) -> Option<String>>;

/// How a step's outcome feeds pipeline control flow
#[derive(Clone, Default)]
pub enum GatePolicy {
    /// Stop the pipeline at the first step failure
    #[default]
    FailFast,
    /// Record the failure and keep executing subsequent steps
    Tolerate,
    /// On success, run a predicate over the result; a finding halts the
    /// pipeline. Step failures behave like [`GatePolicy::FailFast`].
    Gate(GatePredicate),
}

impl fmt::Debug for GatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FailFast => write!(f, "FailFast"),
            Self::Tolerate => write!(f, "Tolerate"),
            Self::Gate(_) => write!(f, "Gate(..)"),
        }
    }
}

/// One named step of a pipeline
pub struct PipelineStep {
    name: String,
    factory: PlanFactory,
    policy: GatePolicy,
    exports: Vec<String>,
}

impl PipelineStep {
    /// Creates a fail-fast step from a plan factory
    pub fn new<F>(name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&PipelineState) -> Result<StepPlan, StepError> + 'static,
    {
        Self {
            name: name.into(),
            factory: Box::new(factory),
            policy: GatePolicy::default(),
            exports: Vec::new(),
        }
    }

    /// Sets the gate policy
    #[must_use]
    pub fn policy(mut self, policy: GatePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Attaches a gate predicate evaluated on success
    #[must_use]
    pub fn gate<P>(self, predicate: P) -> Self
    where
        P: Fn(&StepResult) -> Option<String> + 'static,
    {
        self.policy(GatePolicy::Gate(Arc::new(predicate)))
    }

    /// Tolerates failure of this step
    #[must_use]
    pub fn tolerate_failure(self) -> Self {
        self.policy(GatePolicy::Tolerate)
    }

    /// Exports a captured output path into the final report's artifacts
    #[must_use]
    pub fn export(mut self, path: impl Into<String>) -> Self {
        self.exports.push(path.into());
        self
    }

    /// The step name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn build_plan(&self, state: &PipelineState) -> Result<StepPlan, StepError> {
        (self.factory)(state)
    }

    pub(crate) fn gate_policy(&self) -> &GatePolicy {
        &self.policy
    }

    pub(crate) fn exported_paths(&self) -> &[String] {
        &self.exports
    }
}

impl fmt::Debug for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineStep")
            .field("name", &self.name)
            .field("policy", &self.policy)
            .field("exports", &self.exports)
            .finish_non_exhaustive()
    }
}

/// A named, ordered sequence of steps
#[derive(Debug, Default)]
pub struct Pipeline {
    name: String,
    steps: Vec<PipelineStep>,
}

impl Pipeline {
    /// Creates an empty pipeline
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    /// Appends a step
    #[must_use]
    pub fn step(mut self, step: PipelineStep) -> Self {
        self.steps.push(step);
        self
    }

    /// The pipeline name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The steps in execution order
    #[must_use]
    pub fn steps(&self) -> &[PipelineStep] {
        &self.steps
    }

    /// Returns true when the pipeline has no steps
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::StepBuilder;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_pipeline_keeps_step_order() {
        let pipeline = Pipeline::new("deploy")
            .step(PipelineStep::new("build", |_| {
                StepBuilder::new("build")
                    .from("alpine:3.20")
                    .sh("make")
                    .build()
                    .map_err(Into::into)
            }))
            .step(PipelineStep::new("push", |_| {
                StepBuilder::new("push")
                    .from("alpine:3.20")
                    .sh("push")
                    .build()
                    .map_err(Into::into)
            }));
        let names: Vec<&str> = pipeline.steps().iter().map(PipelineStep::name).collect();
        assert_eq!(names, vec!["build", "push"]);
    }

    #[test]
    fn test_step_policy_and_exports() {
        let step = PipelineStep::new("scan", |_| {
            StepBuilder::new("scan")
                .from("alpine:3.20")
                .sh("scan")
                .build()
                .map_err(Into::into)
        })
        .gate(|_| None)
        .export("/report/scan.json");
        assert!(matches!(step.gate_policy(), GatePolicy::Gate(_)));
        assert_eq!(step.exported_paths(), ["/report/scan.json"]);
    }
}
