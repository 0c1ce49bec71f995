//! Layer types for container steps
//!
//! A layer is one entry in a step's ordered directive list. The executor
//! applies layers strictly in order; no layer may depend on a later one.

#![allow(clippy::must_use_candidate)]

use crate::step::fs::{Directory, File};
use crate::step::secret::SecretRef;
use serde::Serialize;
use std::fmt;

/// Package managers supported by install layers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PackageManager {
    /// Alpine `apk add`
    Apk,
    /// Python `pip install`
    Pip,
    /// Debian `apt-get install`
    AptGet,
    /// Node `npm install -g`
    NpmGlobal,
    /// Ruby `gem install`
    Gem,
    /// Freeform shell script; packages are appended as arguments
    Shell(String),
}

impl PackageManager {
    /// Builds the install argv for the given packages
    pub fn install_argv(&self, packages: &[String]) -> Vec<String> {
        let mut argv: Vec<String> = match self {
            Self::Apk => vec!["apk".into(), "add".into(), "--no-cache".into()],
            Self::Pip => vec!["pip".into(), "install".into(), "--no-cache-dir".into()],
            Self::AptGet => vec!["apt-get".into(), "install".into(), "-y".into()],
            Self::NpmGlobal => vec!["npm".into(), "install".into(), "-g".into()],
            Self::Gem => vec!["gem".into(), "install".into()],
            Self::Shell(script) => {
                shell_words::split(script).unwrap_or_else(|_| vec![script.clone()])
            }
        };
        argv.extend(packages.iter().cloned());
        argv
    }
}

impl fmt::Display for PackageManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Apk => write!(f, "apk"),
            Self::Pip => write!(f, "pip"),
            Self::AptGet => write!(f, "apt-get"),
            Self::NpmGlobal => write!(f, "npm-global"),
            Self::Gem => write!(f, "gem"),
            Self::Shell(script) => write!(f, "shell({script})"),
        }
    }
}

/// Value of an environment variable layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum EnvValue {
    /// Plain text, visible in plans and logs
    Plain(String),
    /// Secret reference, resolved at execution and never logged
    Secret(SecretRef),
}

impl EnvValue {
    /// Returns true for secret-backed values
    pub fn is_secret(&self) -> bool {
        matches!(self, Self::Secret(_))
    }
}

impl From<&str> for EnvValue {
    fn from(value: &str) -> Self {
        Self::Plain(value.to_string())
    }
}

impl From<String> for EnvValue {
    fn from(value: String) -> Self {
        Self::Plain(value)
    }
}

impl From<SecretRef> for EnvValue {
    fn from(secret: SecretRef) -> Self {
        Self::Secret(secret)
    }
}

impl fmt::Display for EnvValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain(value) => write!(f, "{value}"),
            Self::Secret(secret) => write!(f, "{secret}"),
        }
    }
}

/// Options for an exec layer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExecOpts {
    /// Treat a non-zero exit status as success
    pub ignore_exit: bool,
    /// Run the argv through `sh -c` instead of directly
    pub shell: bool,
}

impl ExecOpts {
    /// Default options: fail on non-zero exit, no shell
    pub fn new() -> Self {
        Self::default()
    }

    /// Tolerates non-zero exit codes
    #[must_use]
    pub fn ignore_exit(mut self) -> Self {
        self.ignore_exit = true;
        self
    }

    /// Runs the command through a shell
    #[must_use]
    pub fn shell(mut self) -> Self {
        self.shell = true;
        self
    }
}

/// One directive in a step's ordered layer list
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Layer {
    /// Install packages via a package manager
    Install {
        /// Manager to invoke
        manager: PackageManager,
        /// Packages to install
        packages: Vec<String>,
    },

    /// Attach a directory at an absolute container path
    MountDirectory {
        /// Absolute container path
        path: String,
        /// Directory to attach
        directory: Directory,
    },

    /// Attach a file at an absolute container path
    MountFile {
        /// Absolute container path
        path: String,
        /// File to attach
        file: File,
        /// Optional permission bits
        mode: Option<u32>,
    },

    /// Attach a secret as a transient read-only file
    ///
    /// The file exists during the step only and is removed before any output
    /// capture.
    MountSecret {
        /// Absolute container path
        path: String,
        /// Secret to materialize
        secret: SecretRef,
    },

    /// Materialize a literal file
    WriteFile {
        /// Absolute container path
        path: String,
        /// File content
        contents: String,
        /// Optional permission bits
        mode: Option<u32>,
    },

    /// Set an environment variable for subsequent exec layers
    Env {
        /// Variable name
        name: String,
        /// Plain or secret value
        value: EnvValue,
    },

    /// Set the working directory for subsequent exec layers
    Workdir {
        /// Absolute container path
        path: String,
    },

    /// Run a command
    Exec {
        /// Command and arguments
        argv: Vec<String>,
        /// Execution options
        opts: ExecOpts,
    },

    /// Override the entrypoint of the resulting container image
    Entrypoint {
        /// Entrypoint argv
        argv: Vec<String>,
    },
}

impl Layer {
    /// A short label for logs and reports
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Install { .. } => "install",
            Self::MountDirectory { .. } => "mount-directory",
            Self::MountFile { .. } => "mount-file",
            Self::MountSecret { .. } => "mount-secret",
            Self::WriteFile { .. } => "write-file",
            Self::Env { .. } => "env",
            Self::Workdir { .. } => "workdir",
            Self::Exec { .. } => "exec",
            Self::Entrypoint { .. } => "entrypoint",
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Install { manager, packages } => {
                write!(f, "install[{manager}]({})", packages.join(", "))
            }
            Self::MountDirectory { path, directory } => {
                write!(f, "mount-dir({path}, {} files)", directory.len())
            }
            Self::MountFile { path, file, .. } => write!(f, "mount-file({path}, {})", file.name),
            Self::MountSecret { path, secret } => write!(f, "mount-secret({path}, {secret})"),
            Self::WriteFile { path, contents, .. } => {
                write!(f, "write-file({path}, {} bytes)", contents.len())
            }
            Self::Env { name, value } => match value {
                EnvValue::Plain(v) => write!(f, "env({name}={v})"),
                EnvValue::Secret(s) => write!(f, "env({name}={s})"),
            },
            Self::Workdir { path } => write!(f, "workdir({path})"),
            Self::Exec { argv, .. } => write!(f, "exec({})", shell_words::join(argv)),
            Self::Entrypoint { argv } => write!(f, "entrypoint({})", shell_words::join(argv)),
        }
    }
}
