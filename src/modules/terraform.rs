//! Terraform operations
//!
//! The classic sub-operations over a mounted working directory, plus the
//! sops-backed variable flow: decrypt AGE-encrypted tfvars, materialize
//! `terraform.tfvars.json`, init and apply, and remove the plaintext vars
//! before the directory is captured.

use crate::modules::errors::ModuleError;
use crate::step::fs::{Directory, File};
use crate::step::secret::SecretRef;
use crate::step::{PackageManager, StepBuilder, StepPlan, ValidationError};
use std::fmt;
use std::str::FromStr;

/// Default image carrying the terraform tool
pub const DEFAULT_TERRAFORM_IMAGE: &str = "hashicorp/terraform:1.9";

const SOURCE_PATH: &str = "/workspace/src";
const TFVARS_FILE: &str = "terraform.tfvars.json";

/// Supported terraform sub-operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerraformOp {
    /// `terraform init`
    Init,
    /// `terraform validate`
    Validate,
    /// `terraform plan -out=tfplan`
    Plan,
    /// `terraform apply -auto-approve`
    Apply,
    /// `terraform destroy -auto-approve`
    Destroy,
}

impl TerraformOp {
    fn argv(self) -> Vec<&'static str> {
        match self {
            Self::Init => vec!["terraform", "init"],
            Self::Validate => vec!["terraform", "validate"],
            Self::Plan => vec!["terraform", "plan", "-out=tfplan"],
            Self::Apply => vec!["terraform", "apply", "-auto-approve"],
            Self::Destroy => vec!["terraform", "destroy", "-auto-approve"],
        }
    }
}

impl fmt::Display for TerraformOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::Validate => "validate",
            Self::Plan => "plan",
            Self::Apply => "apply",
            Self::Destroy => "destroy",
        };
        write!(f, "{name}")
    }
}

impl FromStr for TerraformOp {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "init" => Ok(Self::Init),
            "validate" => Ok(Self::Validate),
            "plan" => Ok(Self::Plan),
            "apply" => Ok(Self::Apply),
            "destroy" => Ok(Self::Destroy),
            other => Err(ValidationError::UnsupportedValue {
                input: "terraform operation".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

/// Builds a step running one sub-operation over a mounted working directory
///
/// The working directory is captured back after the run.
///
/// # Errors
///
/// Returns a validation error for an empty working directory.
pub fn run(op: TerraformOp, workspace: &Directory) -> Result<StepPlan, ModuleError> {
    if workspace.is_empty() {
        return Err(ValidationError::MissingInput("terraform working directory".to_string()).into());
    }
    Ok(StepBuilder::new(format!("terraform-{op}"))
        .from(DEFAULT_TERRAFORM_IMAGE)
        .mount_directory(SOURCE_PATH, workspace.clone())
        .workdir(SOURCE_PATH)
        .exec(op.argv())
        .expect_directory(SOURCE_PATH)
        .build()?)
}

/// Builds the sops-backed apply step
///
/// Decrypts the given tfvars with the AGE key, writes the plaintext as
/// `terraform.tfvars.json`, runs init and apply, and removes the plaintext
/// vars before the working directory is captured.
///
/// # Errors
///
/// Returns validation errors for an empty working directory or a tfvars
/// file without a name.
pub fn apply_with_sops_vars(
    workspace: &Directory,
    encrypted_tfvars: &File,
    age_key: SecretRef,
) -> Result<StepPlan, ModuleError> {
    if workspace.is_empty() {
        return Err(ValidationError::MissingInput("terraform working directory".to_string()).into());
    }
    if encrypted_tfvars.name.is_empty() {
        return Err(ValidationError::MissingInput("tfvars file name".to_string()).into());
    }
    let encrypted_path = format!("{SOURCE_PATH}/{}", encrypted_tfvars.name);
    Ok(StepBuilder::new("terraform-apply")
        .from(DEFAULT_TERRAFORM_IMAGE)
        .mount_directory(SOURCE_PATH, workspace.clone())
        .mount_file(&encrypted_path, encrypted_tfvars.clone())
        .env("SOPS_AGE_KEY", age_key)
        .install_packages(PackageManager::Apk, ["sops"])
        .workdir(SOURCE_PATH)
        .sh(format!(
            "sops --decrypt {} > {TFVARS_FILE}",
            encrypted_tfvars.name
        ))
        .exec(["terraform", "init"])
        .exec(["terraform", "apply", "-auto-approve"])
        .sh(format!("rm -f {TFVARS_FILE}"))
        .expect_directory(SOURCE_PATH)
        .build()?)
}
