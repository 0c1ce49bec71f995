//! Error type shared by the tool adapter modules

use crate::executor::StepError;
use crate::step::errors::ValidationError;
use crate::template::TemplateError;
use thiserror::Error;

/// Errors raised by module adapter operations
#[derive(Error, Debug)]
pub enum ModuleError {
    /// Input validation failed
    #[error("Invalid module input: {0}")]
    Validation(#[from] ValidationError),

    /// Template loading or rendering failed
    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    /// A tool artifact could not be parsed
    #[error("Failed to parse {what}: {reason}")]
    Parse {
        /// What was being parsed (e.g. `Chart.yaml`).
        what: String,
        /// Parse failure description.
        reason: String,
    },

    /// Building an archive failed
    #[error("Failed to build archive: {reason}")]
    Archive {
        /// Failure description.
        reason: String,
    },

    /// A composed step failed
    #[error("Step failed: {0}")]
    Step(#[from] StepError),
}
