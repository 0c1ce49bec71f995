//! # Stepline - A container step engine for CI/CD pipelines
//!
//! Stepline describes units of CI/CD work as immutable container step
//! plans, executes them against a Docker or Podman host runtime, and
//! chains them into pipelines with fail-fast, tolerate, and gate
//! policies. Secrets travel as references and are materialized only at
//! execution time; they never appear in plans, digests, logs, or
//! artifacts.
//!
//! ## Quick Start
//!
//! Build a plan with [`StepBuilder`], execute it with [`StepExecutor`],
//! or wire several steps into a [`Pipeline`] and hand it to a
//! [`PipelineOrchestrator`]. The [`modules`] tree ships ready-made
//! plans for common tools (helm, skopeo, trivy, sops, terraform, and
//! friends).
//!
//! ## Features
//!
//! - **Deterministic plans**: identical inputs yield identical plan digests
//! - **Secret hygiene**: references in plans, clear values only inside the runtime
//! - **Pluggable runtimes**: Docker and Podman CLIs, plus a mock for tests
//! - **Gated pipelines**: scan findings can halt a run before publish
//! - **Templates**: a small placeholder grammar with pipe functions and decks
//!
//! ## License
//!
//! Licensed under either of
//! - Apache License, Version 2.0 ([LICENSE-APACHE](LICENSE-APACHE) or <https://www.apache.org/licenses/LICENSE-2.0>)
//! - MIT license ([LICENSE-MIT](LICENSE-MIT) or <https://opensource.org/licenses/MIT>)
//!
//! at your option.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod macros;

pub mod executor;
pub mod infrastructure;
pub mod modules;
pub mod pipeline;
pub mod step;
pub mod template;

// Prelude module for common imports
pub mod prelude;

// Re-export commonly used types
pub use executor::{
    CancelToken, CliRuntime, ExecOutput, HostRuntime, RuntimeError, RuntimeKind, StepError,
    StepExecutor,
};
pub use modules::ModuleError;
pub use pipeline::{
    GatePolicy, Pipeline, PipelineError, PipelineOrchestrator, PipelineReport, PipelineState,
    PipelineStatus, PipelineStep, StepOutcome, StepRecord,
};
pub use step::{
    Directory, EnvValue, ExpectedOutput, File, Layer, LoginTool, RegistryCredential, SecretRef,
    SecretStore, StepBuilder, StepPlan, StepResult, ValidationError,
};
pub use template::{MissingKeyPolicy, TemplateEngine, TemplateError, TemplateSource, VariableMap};

/// Version of the stepline crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
