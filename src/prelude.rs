//! Prelude module for common imports

// Re-export macros
pub use crate::{argv, vars};

// Re-export step construction types with full paths
pub use crate::step::builder::{ExpectedOutput, StepBuilder, StepPlan};
pub use crate::step::errors::ValidationError;
pub use crate::step::fs::{Directory, File};
pub use crate::step::layer::{EnvValue, ExecOpts, Layer, PackageManager};
pub use crate::step::registry::{LoginTool, RegistryCredential};
pub use crate::step::result::StepResult;
pub use crate::step::secret::{
    EnvSecretStore, SecretRef, SecretStore, SecretValue, StaticSecretStore,
};

// Re-export executor types
pub use crate::executor::{CancelToken, CliRuntime, HostRuntime, StepError, StepExecutor};

// Re-export pipeline types
pub use crate::pipeline::{
    GatePolicy, Pipeline, PipelineError, PipelineOrchestrator, PipelineReport, PipelineState,
    PipelineStatus, PipelineStep,
};

// Re-export template types
pub use crate::template::{MissingKeyPolicy, TemplateEngine, TemplateSource, VariableMap};

// Re-export module-level error
pub use crate::modules::ModuleError;
