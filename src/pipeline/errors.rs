//! Error types for pipeline orchestration

use crate::executor::StepError;
use thiserror::Error;

/// Errors surfaced by the orchestrator, always tagged with the step name
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A step's plan factory or execution failed
    #[error("Step '{step}' failed: {source}")]
    Step {
        /// Name of the failing step.
        step: String,
        /// The underlying step error.
        #[source]
        source: StepError,
    },

    /// A gate predicate reported a finding on a successful step
    #[error("Gate halted pipeline at step '{step}': {finding}")]
    GateHalted {
        /// Name of the gated step.
        step: String,
        /// The finding reported by the predicate.
        finding: String,
    },

    /// Cancellation was observed before the step started
    #[error("Pipeline cancelled before step '{step}'")]
    Cancelled {
        /// Name of the step that did not run.
        step: String,
    },
}

impl PipelineError {
    /// The step this error is attached to
    #[must_use]
    pub fn step(&self) -> &str {
        match self {
            Self::Step { step, .. } | Self::GateHalted { step, .. } | Self::Cancelled { step } => {
                step
            }
        }
    }

    /// Captured stderr of the failing tool, when applicable
    #[must_use]
    pub fn stderr(&self) -> Option<&str> {
        match self {
            Self::Step { source, .. } => source.stderr(),
            _ => None,
        }
    }
}
