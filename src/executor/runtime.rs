//! Host runtime abstraction and the CLI-driven implementation
//!
//! The executor drives a [`HostRuntime`] to realize step plans. The shipped
//! implementation shells out to the `docker` or `podman` binary; tests use
//! the in-memory mock.

#![allow(clippy::must_use_candidate)]

use std::fmt;
use std::path::Path;
use std::process::Command;
use thiserror::Error;

/// Errors surfaced by the host runtime
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    /// The runtime binary is not usable
    #[error("Container runtime '{runtime}' is not available")]
    Unavailable {
        /// Runtime binary name.
        runtime: String,
    },

    /// Pulling the base image failed; unrecoverable for the step
    #[error("Failed to pull image '{image}': {stderr}")]
    PullFailed {
        /// The image reference.
        image: String,
        /// Stderr from the pull command.
        stderr: String,
    },

    /// A runtime command exited non-zero
    #[error("Runtime command failed with exit code {code}: {stderr}")]
    CommandFailed {
        /// Exit code returned by the command.
        code: i32,
        /// Standard error output from the command.
        stderr: String,
    },

    /// Copying data in or out of the container failed
    #[error("Copy failed for '{path}': {reason}")]
    CopyFailed {
        /// Path involved in the copy.
        path: String,
        /// Failure description.
        reason: String,
    },

    /// IO error occurred
    #[error("IO error: {0}")]
    Io(String),
}

impl From<std::io::Error> for RuntimeError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Captured output of one command execution inside a container
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    /// Exit code of the command
    pub exit_code: i32,
    /// Standard output
    pub stdout: String,
    /// Standard error
    pub stderr: String,
}

impl ExecOutput {
    /// A successful empty output
    pub fn success() -> Self {
        Self::default()
    }

    /// Returns true when the command exited with status zero
    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Host container runtime contract
///
/// One container per step: the executor creates it, copies inputs in,
/// executes layers, copies declared outputs out, and removes it. The
/// runtime owns the physical containers; the core owns only plans and
/// results.
pub trait HostRuntime: Send + Sync {
    /// The runtime's display name (e.g. "docker")
    fn name(&self) -> &str;

    /// Returns true when the runtime can be used
    fn is_available(&self) -> bool;

    /// Pulls a base image
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::PullFailed`] when the image is unreachable.
    fn pull(&self, image: &str) -> Result<(), RuntimeError>;

    /// Creates a long-lived container for the step and returns its id
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError`] when creation fails.
    fn create(&self, image: &str) -> Result<String, RuntimeError>;

    /// Copies a host file or directory into the container
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::CopyFailed`] when the copy fails.
    fn copy_in(&self, container: &str, source: &Path, dest: &str) -> Result<(), RuntimeError>;

    /// Copies a container path to a host destination
    ///
    /// The destination must not exist; it is created as a file or directory
    /// matching the source.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::CopyFailed`] when the source is missing.
    fn copy_out(&self, container: &str, source: &str, dest: &Path) -> Result<(), RuntimeError>;

    /// Removes a path inside the container
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError`] when the removal command fails.
    fn remove_path(&self, container: &str, path: &str) -> Result<(), RuntimeError>;

    /// Executes a command inside the container
    ///
    /// A non-zero exit status is reported through [`ExecOutput`], not as an
    /// error; errors are reserved for runtime-level failures.
    ///
    /// `env` pairs may appear on the host command line; `env_file` points at
    /// a host file of `NAME=value` lines handed to the runtime privately.
    /// Secret-backed values travel only through the file so they are never
    /// visible in the host process table.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError`] when the exec could not be started.
    fn exec(
        &self,
        container: &str,
        argv: &[String],
        env: &[(String, String)],
        env_file: Option<&Path>,
        workdir: Option<&str>,
    ) -> Result<ExecOutput, RuntimeError>;

    /// Removes the container
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError`] when removal fails.
    fn remove(&self, container: &str) -> Result<(), RuntimeError>;
}

/// Container runtime flavor for the CLI driver
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RuntimeKind {
    /// Docker runtime
    #[default]
    Docker,
    /// Podman runtime
    Podman,
}

impl fmt::Display for RuntimeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeKind::Docker => write!(f, "docker"),
            RuntimeKind::Podman => write!(f, "podman"),
        }
    }
}

/// Runtime driven through the docker or podman binary
#[derive(Debug, Clone, Default)]
pub struct CliRuntime {
    kind: RuntimeKind,
}

impl CliRuntime {
    /// Creates a Docker-backed runtime
    pub fn docker() -> Self {
        Self {
            kind: RuntimeKind::Docker,
        }
    }

    /// Creates a Podman-backed runtime
    pub fn podman() -> Self {
        Self {
            kind: RuntimeKind::Podman,
        }
    }

    /// Creates a runtime from a binary name
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "docker" => Some(Self::docker()),
            "podman" => Some(Self::podman()),
            _ => None,
        }
    }

    fn binary(&self) -> &'static str {
        match self.kind {
            RuntimeKind::Docker => "docker",
            RuntimeKind::Podman => "podman",
        }
    }

    /// Returns the runtime version string when available
    pub fn version(&self) -> Option<String> {
        Command::new(self.binary())
            .arg("--version")
            .output()
            .ok()
            .and_then(|o| String::from_utf8(o.stdout).ok())
            .map(|v| v.trim().to_string())
    }

    fn run(&self, args: &[&str]) -> Result<ExecOutput, RuntimeError> {
        let output = Command::new(self.binary()).args(args).output()?;
        Ok(ExecOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }

    fn run_checked(&self, args: &[&str]) -> Result<ExecOutput, RuntimeError> {
        let output = self.run(args)?;
        if !output.is_success() {
            return Err(RuntimeError::CommandFailed {
                code: output.exit_code,
                stderr: output.stderr,
            });
        }
        Ok(output)
    }
}

impl HostRuntime for CliRuntime {
    fn name(&self) -> &str {
        self.binary()
    }

    fn is_available(&self) -> bool {
        Command::new(self.binary())
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn pull(&self, image: &str) -> Result<(), RuntimeError> {
        tracing::debug!(runtime = %self.binary(), image = %image, "Pulling base image");
        let output = self.run(&["pull", image])?;
        if !output.is_success() {
            return Err(RuntimeError::PullFailed {
                image: image.to_string(),
                stderr: output.stderr,
            });
        }
        Ok(())
    }

    fn create(&self, image: &str) -> Result<String, RuntimeError> {
        // The container idles so that layers can be applied as execs.
        let output = self.run_checked(&[
            "run",
            "-d",
            "--entrypoint",
            "sleep",
            image,
            "infinity",
        ])?;
        Ok(output.stdout.trim().to_string())
    }

    fn copy_in(&self, container: &str, source: &Path, dest: &str) -> Result<(), RuntimeError> {
        let source_arg = if source.is_dir() {
            format!("{}/.", source.display())
        } else {
            source.display().to_string()
        };
        if source.is_dir() {
            self.run_checked(&["exec", container, "mkdir", "-p", dest])?;
        } else if let Some((parent, _)) = dest.rsplit_once('/') {
            if !parent.is_empty() {
                self.run_checked(&["exec", container, "mkdir", "-p", parent])?;
            }
        }
        self.run_checked(&["cp", &source_arg, &format!("{container}:{dest}")])
            .map_err(|e| RuntimeError::CopyFailed {
                path: dest.to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }

    fn copy_out(&self, container: &str, source: &str, dest: &Path) -> Result<(), RuntimeError> {
        let dest_arg = dest.display().to_string();
        self.run_checked(&["cp", &format!("{container}:{source}"), &dest_arg])
            .map_err(|e| RuntimeError::CopyFailed {
                path: source.to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }

    fn remove_path(&self, container: &str, path: &str) -> Result<(), RuntimeError> {
        self.run_checked(&["exec", container, "rm", "-rf", path])?;
        Ok(())
    }

    fn exec(
        &self,
        container: &str,
        argv: &[String],
        env: &[(String, String)],
        env_file: Option<&Path>,
        workdir: Option<&str>,
    ) -> Result<ExecOutput, RuntimeError> {
        let mut args: Vec<String> = vec!["exec".into()];
        for (name, value) in env {
            args.push("-e".into());
            args.push(format!("{name}={value}"));
        }
        if let Some(file) = env_file {
            args.push("--env-file".into());
            args.push(file.display().to_string());
        }
        if let Some(dir) = workdir {
            args.push("-w".into());
            args.push(dir.to_string());
        }
        args.push(container.to_string());
        args.extend(argv.iter().cloned());

        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        self.run(&arg_refs)
    }

    fn remove(&self, container: &str) -> Result<(), RuntimeError> {
        self.run_checked(&["rm", "-f", container])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_kind_display() {
        assert_eq!(RuntimeKind::Docker.to_string(), "docker");
        assert_eq!(RuntimeKind::Podman.to_string(), "podman");
    }

    #[test]
    fn test_cli_runtime_from_name() {
        assert!(CliRuntime::from_name("docker").is_some());
        assert!(CliRuntime::from_name("podman").is_some());
        assert!(CliRuntime::from_name("lxc").is_none());
    }

    #[test]
    fn test_exec_output_success_predicate() {
        assert!(ExecOutput::success().is_success());
        let failed = ExecOutput {
            exit_code: 1,
            ..ExecOutput::default()
        };
        assert!(!failed.is_success());
    }
}
