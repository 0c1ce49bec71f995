//! `stepline copy` - Copy an image between registries
//!
//! Credentials come in as a username plus the name of an environment
//! variable holding the password; the clear value stays in the process
//! environment and is resolved only at execution.

use crate::cli::RuntimeArg;
use anyhow::{bail, Result};
use std::sync::Arc;
use stepline::executor::{CliRuntime, StepExecutor};
use stepline::infrastructure::Config;
use stepline::modules::image::{copy, CopyRequest};
use stepline::step::registry::RegistryCredential;
use stepline::step::secret::{EnvSecretStore, SecretRef};

/// Arguments for the copy command
#[derive(Debug, Clone)]
pub struct CopyArgs {
    /// Source image reference
    pub source: String,
    /// Target image reference
    pub target: String,
    /// Copy platform
    pub platform: Option<String>,
    /// Source registry username
    pub source_user: Option<String>,
    /// Env var holding the source registry password
    pub source_password_env: Option<String>,
    /// Target registry username
    pub target_user: Option<String>,
    /// Env var holding the target registry password
    pub target_password_env: Option<String>,
    /// Host runtime to execute with; `None` uses the configured default
    pub runtime: Option<RuntimeArg>,
}

pub fn run(args: &CopyArgs) -> Result<()> {
    let request = CopyRequest {
        source: args.source.clone(),
        target: args.target.clone(),
        platform: args.platform.clone(),
        source_credential: credential(
            "source",
            args.source_user.as_deref(),
            args.source_password_env.as_deref(),
        )?,
        target_credential: credential(
            "target",
            args.target_user.as_deref(),
            args.target_password_env.as_deref(),
        )?,
        docker_config: None,
    };
    let plan = copy(&request)?;

    let runtime = match args.runtime {
        Some(RuntimeArg::Docker) => CliRuntime::docker(),
        Some(RuntimeArg::Podman) => CliRuntime::podman(),
        None => {
            let config = Config::from_env();
            CliRuntime::from_name(&config.runtime).ok_or_else(|| {
                anyhow::anyhow!("Unknown runtime '{}' in configuration", config.runtime)
            })?
        }
    };
    let executor = StepExecutor::new(Arc::new(runtime), Arc::new(EnvSecretStore::new()));
    let result = executor.execute(&plan)?;
    print!("{}", result.stdout);
    Ok(())
}

fn credential(
    side: &str,
    user: Option<&str>,
    password_env: Option<&str>,
) -> Result<Option<RegistryCredential>> {
    match (user, password_env) {
        (Some(user), Some(var)) => Ok(Some(RegistryCredential::new(
            "",
            user,
            SecretRef::from_env(format!("{side}-registry-password"), var),
        ))),
        (None, None) => Ok(None),
        _ => bail!("Both --{side}-user and --{side}-password-env are required for {side} credentials"),
    }
}
