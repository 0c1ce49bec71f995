//! SOPS encrypt/decrypt operations
//!
//! AGE key material reaches the tool only through secret environment
//! variables (`SOPS_AGE_KEY`, `SOPS_AGE_RECIPIENTS`); it never appears in
//! argv or in the plan.

use crate::modules::errors::ModuleError;
use crate::step::fs::File;
use crate::step::secret::SecretRef;
use crate::step::{StepBuilder, StepPlan, ValidationError};

/// Default image carrying the sops tool
pub const DEFAULT_SOPS_IMAGE: &str = "ghcr.io/getsops/sops:v3.9.0-alpine";

const INPUT_PATH: &str = "/workspace";
const OUTPUT_PATH: &str = "/out";

/// Builds a decrypt step
///
/// The plaintext is captured as `/out/<name>`; the AGE key is bound to the
/// `SOPS_AGE_KEY` secret env var.
///
/// # Errors
///
/// Returns a validation error for a file without a name.
pub fn decrypt(encrypted: &File, age_key: SecretRef) -> Result<StepPlan, ModuleError> {
    let name = named(encrypted)?;
    let input = format!("{INPUT_PATH}/{name}");
    let output = format!("{OUTPUT_PATH}/{name}");
    Ok(StepBuilder::new("sops-decrypt")
        .from(DEFAULT_SOPS_IMAGE)
        .mount_file(&input, encrypted.clone())
        .env("SOPS_AGE_KEY", age_key)
        .sh(format!("mkdir -p {OUTPUT_PATH} && sops --decrypt {input} > {output}"))
        .expect_file(&output)
        .build()?)
}

/// Builds an encrypt step
///
/// Recipients are AGE public keys, passed via `SOPS_AGE_RECIPIENTS`.
///
/// # Errors
///
/// Returns validation errors for a file without a name or empty recipients.
pub fn encrypt(plaintext: &File, recipients: &str) -> Result<StepPlan, ModuleError> {
    let name = named(plaintext)?;
    if recipients.is_empty() {
        return Err(ValidationError::MissingInput("AGE recipients".to_string()).into());
    }
    let input = format!("{INPUT_PATH}/{name}");
    let output = format!("{OUTPUT_PATH}/{name}");
    Ok(StepBuilder::new("sops-encrypt")
        .from(DEFAULT_SOPS_IMAGE)
        .mount_file(&input, plaintext.clone())
        .env("SOPS_AGE_RECIPIENTS", recipients)
        .sh(format!("mkdir -p {OUTPUT_PATH} && sops --encrypt {input} > {output}"))
        .expect_file(&output)
        .build()?)
}

fn named(file: &File) -> Result<&str, ValidationError> {
    if file.name.is_empty() {
        Err(ValidationError::MissingInput("file name".to_string()))
    } else {
        Ok(&file.name)
    }
}
