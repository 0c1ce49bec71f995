//! `stepline doctor` - Check host runtime health

use crate::cli::RuntimeArg;
use anyhow::{bail, Result};
use stepline::executor::{CliRuntime, HostRuntime};

pub fn run(runtime: Option<RuntimeArg>) -> Result<()> {
    let candidates: Vec<CliRuntime> = match runtime {
        Some(RuntimeArg::Docker) => vec![CliRuntime::docker()],
        Some(RuntimeArg::Podman) => vec![CliRuntime::podman()],
        None => vec![CliRuntime::docker(), CliRuntime::podman()],
    };

    let mut healthy = 0;
    for candidate in &candidates {
        if candidate.is_available() {
            let version = candidate
                .version()
                .unwrap_or_else(|| "unknown version".to_string());
            println!("{}: ok ({})", candidate.name(), version.trim());
            healthy += 1;
        } else {
            println!("{}: not available", candidate.name());
        }
    }

    if healthy == 0 {
        bail!("No healthy container runtime found");
    }
    Ok(())
}
