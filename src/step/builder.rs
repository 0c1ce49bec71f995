//! Step builder and frozen step plans
//!
//! [`StepBuilder`] accumulates ordered layer directives and freezes them into
//! a [`StepPlan`]. Directive order is preserved verbatim; validation happens
//! in the directive methods and surfaces as a typed error at [`StepBuilder::build`].

#![allow(clippy::must_use_candidate, clippy::return_self_not_must_use)]

use crate::step::errors::ValidationError;
use crate::step::fs::{Directory, File};
use crate::step::layer::{EnvValue, ExecOpts, Layer, PackageManager};
use crate::step::secret::SecretRef;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;
use uuid::Uuid;

static ENV_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

/// An output declared for capture after a successful step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ExpectedOutput {
    /// Capture a directory tree
    Directory {
        /// Absolute container path
        path: String,
    },
    /// Capture a single file
    File {
        /// Absolute container path
        path: String,
    },
}

impl ExpectedOutput {
    /// The declared container path
    pub fn path(&self) -> &str {
        match self {
            Self::Directory { path } | Self::File { path } => path,
        }
    }
}

/// Frozen, declarative recipe for one container run
///
/// Layer order is exactly the order of the builder's directive calls.
/// Secrets appear only as references; the plan digest elides them to their
/// identifiers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepPlan {
    /// Unique plan identifier
    pub id: Uuid,
    /// Human-readable step name, used in logs and reports
    pub name: String,
    /// Base image reference
    pub image: String,
    /// Ordered layer list
    pub layers: Vec<Layer>,
    /// Optional entrypoint override
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entrypoint: Option<Vec<String>>,
    /// Outputs to capture on success
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<ExpectedOutput>,
}

/// The digest-relevant view of a plan: everything except the random id.
#[derive(Serialize)]
struct PlanFingerprint<'a> {
    name: &'a str,
    image: &'a str,
    layers: &'a [Layer],
    entrypoint: &'a Option<Vec<String>>,
    outputs: &'a [ExpectedOutput],
}

impl StepPlan {
    /// Canonical content digest of the plan
    ///
    /// Two plans built from equal-valued directives have equal digests.
    /// Secret references contribute only their identifiers; clear values are
    /// never part of the digest input.
    pub fn digest(&self) -> String {
        let fingerprint = PlanFingerprint {
            name: &self.name,
            image: &self.image,
            layers: &self.layers,
            entrypoint: &self.entrypoint,
            outputs: &self.outputs,
        };
        let bytes = serde_json::to_vec(&fingerprint).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        hasher
            .finalize()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect()
    }

    /// Iterates over the exec layers in order
    pub fn exec_layers(&self) -> impl Iterator<Item = (&Vec<String>, &ExecOpts)> {
        self.layers.iter().filter_map(|layer| match layer {
            Layer::Exec { argv, opts } => Some((argv, opts)),
            _ => None,
        })
    }

    /// Returns the secret references carried by the plan
    pub fn secrets(&self) -> Vec<&SecretRef> {
        self.layers
            .iter()
            .filter_map(|layer| match layer {
                Layer::MountSecret { secret, .. } => Some(secret),
                Layer::Env {
                    value: EnvValue::Secret(secret),
                    ..
                } => Some(secret),
                _ => None,
            })
            .collect()
    }
}

impl fmt::Display for StepPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "step '{}' from {}", self.name, self.image)?;
        for layer in &self.layers {
            writeln!(f, "  {layer}")?;
        }
        for output in &self.outputs {
            writeln!(f, "  expect {}", output.path())?;
        }
        Ok(())
    }
}

/// Fluent builder for [`StepPlan`]
///
/// Directive methods validate their inputs and record the first violation;
/// [`StepBuilder::build`] returns it as a typed error. The builder is
/// consumed by `build` and cannot be mutated afterwards.
#[derive(Debug, Clone)]
pub struct StepBuilder {
    name: String,
    image: Option<String>,
    layers: Vec<Layer>,
    entrypoint: Option<Vec<String>>,
    outputs: Vec<ExpectedOutput>,
    error: Option<ValidationError>,
}

impl StepBuilder {
    /// Creates a builder for a named step
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let error = name.trim().is_empty().then_some(ValidationError::EmptyName);
        Self {
            name,
            image: None,
            layers: Vec::new(),
            entrypoint: None,
            outputs: Vec::new(),
            error,
        }
    }

    /// Sets or replaces the base image
    pub fn from(mut self, image: impl Into<String>) -> Self {
        let image = image.into();
        if image.trim().is_empty() {
            self.record(ValidationError::EmptyImage);
        } else {
            self.image = Some(image);
        }
        self
    }

    /// Appends a package install layer
    pub fn install_packages<I, S>(mut self, manager: PackageManager, packages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let packages: Vec<String> = packages.into_iter().map(Into::into).collect();
        if packages.is_empty() {
            self.record(ValidationError::EmptyPackageList);
        } else if packages.iter().any(|p| p.trim().is_empty()) {
            self.record(ValidationError::EmptyPackageName);
        } else {
            self.layers.push(Layer::Install { manager, packages });
        }
        self
    }

    /// Attaches a directory at an absolute container path
    pub fn mount_directory(mut self, path: impl Into<String>, directory: Directory) -> Self {
        if let Some(path) = self.absolute(path) {
            self.layers.push(Layer::MountDirectory { path, directory });
        }
        self
    }

    /// Attaches a file at an absolute container path
    ///
    /// Permission bits default to the file's own mode.
    pub fn mount_file(self, path: impl Into<String>, file: File) -> Self {
        let mode = file.mode;
        self.mount_file_with_mode(path, file, mode)
    }

    /// Attaches a file with explicit permission bits
    pub fn mount_file_with_mode(
        mut self,
        path: impl Into<String>,
        file: File,
        mode: Option<u32>,
    ) -> Self {
        if let Some(path) = self.absolute(path) {
            self.layers.push(Layer::MountFile { path, file, mode });
        }
        self
    }

    /// Attaches a secret as a transient read-only file
    pub fn mount_secret(mut self, path: impl Into<String>, secret: SecretRef) -> Self {
        if let Some(path) = self.absolute(path) {
            self.layers.push(Layer::MountSecret { path, secret });
        }
        self
    }

    /// Materializes a literal file
    pub fn write_file(self, path: impl Into<String>, contents: impl Into<String>) -> Self {
        self.write_file_with_mode(path, contents, None)
    }

    /// Materializes a literal file with explicit permission bits
    pub fn write_file_with_mode(
        mut self,
        path: impl Into<String>,
        contents: impl Into<String>,
        mode: Option<u32>,
    ) -> Self {
        if let Some(path) = self.absolute(path) {
            self.layers.push(Layer::WriteFile {
                path,
                contents: contents.into(),
                mode,
            });
        }
        self
    }

    /// Adds an environment variable; the value may be a [`SecretRef`]
    pub fn env(mut self, name: impl Into<String>, value: impl Into<EnvValue>) -> Self {
        let name = name.into();
        if ENV_NAME.is_match(&name) {
            self.layers.push(Layer::Env {
                name,
                value: value.into(),
            });
        } else {
            self.record(ValidationError::InvalidEnvName { name });
        }
        self
    }

    /// Sets the working directory for subsequent exec layers
    pub fn workdir(mut self, path: impl Into<String>) -> Self {
        if let Some(path) = self.absolute(path) {
            self.layers.push(Layer::Workdir { path });
        }
        self
    }

    /// Appends an exec layer with default options
    pub fn exec<I, S>(self, argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exec_with(argv, ExecOpts::default())
    }

    /// Appends an exec layer with explicit options
    pub fn exec_with<I, S>(mut self, argv: I, opts: ExecOpts) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let argv: Vec<String> = argv.into_iter().map(Into::into).collect();
        if argv.is_empty() || argv.iter().all(|a| a.trim().is_empty()) {
            self.record(ValidationError::EmptyArgv);
        } else {
            self.layers.push(Layer::Exec { argv, opts });
        }
        self
    }

    /// Appends a shell exec layer (`sh -c <script>`)
    pub fn sh(self, script: impl Into<String>) -> Self {
        self.exec_with([script.into()], ExecOpts::new().shell())
    }

    /// Overrides the entrypoint of the resulting container image
    pub fn entrypoint<I, S>(mut self, argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let argv: Vec<String> = argv.into_iter().map(Into::into).collect();
        if argv.is_empty() {
            self.record(ValidationError::EmptyArgv);
        } else {
            self.layers.push(Layer::Entrypoint { argv: argv.clone() });
            self.entrypoint = Some(argv);
        }
        self
    }

    /// Declares a directory output to capture on success
    pub fn expect_directory(mut self, path: impl Into<String>) -> Self {
        if let Some(path) = self.absolute(path) {
            self.outputs.push(ExpectedOutput::Directory { path });
        }
        self
    }

    /// Declares a file output to capture on success
    pub fn expect_file(mut self, path: impl Into<String>) -> Self {
        if let Some(path) = self.absolute(path) {
            self.outputs.push(ExpectedOutput::File { path });
        }
        self
    }

    /// Freezes the builder into a plan
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] recorded by a directive, or
    /// [`ValidationError::EmptyImage`] when no base image was set.
    pub fn build(self) -> Result<StepPlan, ValidationError> {
        if let Some(error) = self.error {
            return Err(error);
        }
        let image = self.image.ok_or(ValidationError::EmptyImage)?;
        Ok(StepPlan {
            id: Uuid::new_v4(),
            name: self.name,
            image,
            layers: self.layers,
            entrypoint: self.entrypoint,
            outputs: self.outputs,
        })
    }

    fn record(&mut self, error: ValidationError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    fn absolute(&mut self, path: impl Into<String>) -> Option<String> {
        let path = path.into();
        if path.starts_with('/') {
            Some(path)
        } else {
            self.record(ValidationError::RelativePath { path });
            None
        }
    }
}
