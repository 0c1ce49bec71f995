//! Error types for the step domain

use thiserror::Error;

/// Validation errors for step construction and module inputs
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Base image cannot be empty
    #[error("Base image cannot be empty")]
    EmptyImage,

    /// Step name cannot be empty
    #[error("Step name cannot be empty")]
    EmptyName,

    /// Package list cannot be empty
    #[error("Package list cannot be empty")]
    EmptyPackageList,

    /// A package name is empty
    #[error("Package names must be non-empty strings")]
    EmptyPackageName,

    /// Command argv cannot be empty
    #[error("Command argv cannot be empty")]
    EmptyArgv,

    /// Container paths must be absolute
    #[error("Container path must be absolute, got '{path}'")]
    RelativePath {
        /// The offending path.
        path: String,
    },

    /// Environment variable name is invalid
    #[error("Invalid environment variable name: '{name}'")]
    InvalidEnvName {
        /// The offending name.
        name: String,
    },

    /// A required input is missing
    #[error("Required input missing: {0}")]
    MissingInput(String),

    /// An enum-like input has an unsupported value
    #[error("Unsupported value for {input}: '{value}'")]
    UnsupportedValue {
        /// Input name.
        input: String,
        /// The offending value.
        value: String,
    },

    /// Registry host is empty and cannot be extracted from the image reference
    #[error("Registry host is empty and cannot be extracted from '{reference}'")]
    NoRegistryHost {
        /// The image reference inspected.
        reference: String,
    },

    /// Mutually exclusive credential inputs were both supplied
    #[error("A docker-config secret and per-registry credentials are mutually exclusive")]
    ConflictingCredentials,
}
