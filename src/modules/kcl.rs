//! KCL module operations
//!
//! Pushes a KCL module to an OCI registry using the tool's own CLI login.

use crate::modules::errors::ModuleError;
use crate::step::fs::Directory;
use crate::step::registry::{LoginTool, RegistryCredential};
use crate::step::{StepBuilder, StepPlan, ValidationError};

/// Default image carrying the kcl tool
pub const DEFAULT_KCL_IMAGE: &str = "kcllang/kcl:v0.9.0";

const MODULE_PATH: &str = "/workspace/module";

/// Builds a module-push step: CLI login, then `kcl mod push`
///
/// `reference` is the OCI target without the `oci://` scheme, e.g.
/// `ghcr.io/acme/modules/net`.
///
/// # Errors
///
/// Returns validation errors for an empty module tree, an empty reference,
/// or a credential whose host is neither given nor extractable.
pub fn push(
    module: &Directory,
    reference: &str,
    credential: &RegistryCredential,
) -> Result<StepPlan, ModuleError> {
    if module.is_empty() {
        return Err(ValidationError::MissingInput("module directory".to_string()).into());
    }
    if reference.is_empty() {
        return Err(ValidationError::MissingInput("module reference".to_string()).into());
    }
    let host = credential.resolved_host(reference)?;
    let mut login = RegistryCredential::new(host, credential.username(), credential.password().clone());
    if credential.is_insecure() {
        login = login.insecure();
    }

    let target = format!("oci://{reference}");
    let builder = StepBuilder::new("kcl-push")
        .from(DEFAULT_KCL_IMAGE)
        .mount_directory(MODULE_PATH, module.clone())
        .workdir(MODULE_PATH);
    Ok(login
        .attach_login(builder, LoginTool::Kcl)
        .exec(["kcl", "mod", "push", target.as_str()])
        .build()?)
}
