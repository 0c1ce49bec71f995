//! Error types for the template engine

use crate::infrastructure::http::FetchError;
use thiserror::Error;

/// Errors raised while loading or rendering templates
#[derive(Error, Debug)]
pub enum TemplateError {
    /// No template sources were provided
    #[error("Template source list cannot be empty")]
    EmptySourceList,

    /// A local source path is not present in the provided directory
    #[error("Template '{path}' not found in source directory")]
    SourceNotFound {
        /// The missing relative path.
        path: String,
    },

    /// A local source was given without a source directory
    #[error("Local template '{path}' requires a source directory")]
    NoSourceDirectory {
        /// The local path.
        path: String,
    },

    /// A remote source address is not a usable http(s) URL
    #[error("Invalid template URL '{url}': {reason}")]
    InvalidUrl {
        /// The rejected address.
        url: String,
        /// Rejection description.
        reason: String,
    },

    /// Remote retrieval failed
    #[error("Template fetch failed: {0}")]
    Fetch(#[from] FetchError),

    /// The template body is malformed
    #[error("Malformed template: {reason}")]
    Parse {
        /// Parse failure description.
        reason: String,
    },

    /// A placeholder references a key missing from the variables
    #[error("Missing template key '{key}'")]
    MissingKey {
        /// The unresolved key.
        key: String,
    },

    /// A pipeline references an unknown function
    #[error("Unknown template function '{name}'")]
    UnknownFunction {
        /// The function name.
        name: String,
    },

    /// A function was applied to an incompatible value
    #[error("Function '{name}' cannot be applied: {reason}")]
    FunctionFailed {
        /// The function name.
        name: String,
        /// Failure description.
        reason: String,
    },

    /// A variable file could not be parsed
    #[error("Malformed variable file: {reason}")]
    MalformedVars {
        /// Parse failure description.
        reason: String,
    },

    /// A presentation spec could not be parsed
    #[error("Malformed presentation spec: {reason}")]
    MalformedSpec {
        /// Parse failure description.
        reason: String,
    },
}
