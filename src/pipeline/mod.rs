//! Pipeline orchestration: definitions, state wiring, and the sequential
//! orchestrator with gate policies

pub mod definition;
pub mod errors;
pub mod orchestrator;
pub mod state;

pub use definition::{GatePolicy, GatePredicate, Pipeline, PipelineStep, PlanFactory};
pub use errors::PipelineError;
pub use orchestrator::{
    Artifact, PipelineOrchestrator, PipelineReport, PipelineStatus, StepOutcome, StepRecord,
};
pub use state::PipelineState;
