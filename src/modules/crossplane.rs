//! Crossplane package operations
//!
//! Builds a configuration package into a single `.xpkg` file and pushes it
//! with a mounted auth config.

use crate::modules::errors::ModuleError;
use crate::step::fs::{Directory, File};
use crate::step::registry::{attach_docker_config, RegistryCredential, DEFAULT_DOCKER_CONFIG_PATH};
use crate::step::{StepBuilder, StepPlan, ValidationError};

/// Default image carrying the crossplane CLI
pub const DEFAULT_CROSSPLANE_IMAGE: &str = "crossplane/crossplane-cli:v1.16.0";

const PACKAGE_ROOT: &str = "/workspace/pkg";

/// Container path of the built package file
pub const XPKG_PATH: &str = "/out/package.xpkg";

/// Builds an xpkg-build step over a mounted package root
///
/// # Errors
///
/// Returns a validation error for an empty package tree.
pub fn build(package: &Directory) -> Result<StepPlan, ModuleError> {
    if package.is_empty() {
        return Err(ValidationError::MissingInput("package directory".to_string()).into());
    }
    Ok(StepBuilder::new("xpkg-build")
        .from(DEFAULT_CROSSPLANE_IMAGE)
        .mount_directory(PACKAGE_ROOT, package.clone())
        .exec([
            "crossplane",
            "xpkg",
            "build",
            "--package-root",
            PACKAGE_ROOT,
            "--package-file",
            XPKG_PATH,
        ])
        .expect_file(XPKG_PATH)
        .build()?)
}

/// Builds an xpkg-push step with the derived auth config mounted
///
/// # Errors
///
/// Returns a validation error for an empty reference.
pub fn push(
    xpkg: &File,
    reference: &str,
    credential: &RegistryCredential,
) -> Result<StepPlan, ModuleError> {
    if reference.is_empty() {
        return Err(ValidationError::MissingInput("package reference".to_string()).into());
    }
    let package_path = format!("/workspace/{}", xpkg.name);
    let builder = StepBuilder::new("xpkg-push")
        .from(DEFAULT_CROSSPLANE_IMAGE)
        .mount_file(&package_path, xpkg.clone());
    let builder = attach_docker_config(
        builder,
        std::slice::from_ref(credential),
        DEFAULT_DOCKER_CONFIG_PATH,
        true,
    );
    Ok(builder
        .exec([
            "crossplane",
            "xpkg",
            "push",
            "--package-files",
            package_path.as_str(),
            reference,
        ])
        .build()?)
}
