//! Ansible collection assembly
//!
//! A pure accumulator: folds input files into the canonical collection
//! layout `namespace/name/{playbooks,playbooks/vars,playbooks/templates,
//! plugins/module_utils,meta,roles}` and generates a `galaxy.yml` manifest.
//! No container step is involved.

use crate::modules::errors::ModuleError;
use crate::step::fs::{Directory, File};
use crate::step::ValidationError;
use serde::Serialize;

/// The generated collection manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GalaxyManifest {
    /// Collection namespace
    pub namespace: String,
    /// Collection name
    pub name: String,
    /// Collection version
    pub version: String,
    /// Manifest readme pointer
    pub readme: String,
    /// Declared authors
    pub authors: Vec<String>,
}

/// Inputs for a collection assembly
#[derive(Debug, Clone, Default)]
pub struct CollectionRequest {
    /// Collection namespace
    pub namespace: String,
    /// Collection name
    pub name: String,
    /// Collection version
    pub version: String,
    /// Declared authors
    pub authors: Vec<String>,
    /// Playbook files
    pub playbooks: Vec<File>,
    /// Variable files referenced by playbooks
    pub vars_files: Vec<File>,
    /// Template files referenced by playbooks
    pub templates: Vec<File>,
    /// Shared python module utilities
    pub module_utils: Vec<File>,
    /// Collection metadata files
    pub meta: Vec<File>,
    /// Roles as named directory trees
    pub roles: Vec<(String, Directory)>,
}

/// Folds the request into an immutable collection tree
///
/// # Errors
///
/// Returns validation errors for an empty namespace, name, or version.
pub fn assemble(request: &CollectionRequest) -> Result<Directory, ModuleError> {
    for (label, value) in [
        ("collection namespace", &request.namespace),
        ("collection name", &request.name),
        ("collection version", &request.version),
    ] {
        if value.is_empty() {
            return Err(ValidationError::MissingInput(label.to_string()).into());
        }
    }

    let root = format!("{}/{}", request.namespace, request.name);
    let mut tree = Directory::new();

    for (subdir, files) in [
        ("playbooks", &request.playbooks),
        ("playbooks/vars", &request.vars_files),
        ("playbooks/templates", &request.templates),
        ("plugins/module_utils", &request.module_utils),
        ("meta", &request.meta),
    ] {
        for file in files {
            tree = tree.with_file(format!("{root}/{subdir}/{}", file.name), file.clone());
        }
    }
    for (role, contents) in &request.roles {
        tree = tree.with_directory(format!("{root}/roles/{role}"), contents);
    }

    let manifest = GalaxyManifest {
        namespace: request.namespace.clone(),
        name: request.name.clone(),
        version: request.version.clone(),
        readme: "README.md".to_string(),
        authors: request.authors.clone(),
    };
    let rendered = serde_yaml::to_string(&manifest).map_err(|e| ModuleError::Parse {
        what: "galaxy.yml".to_string(),
        reason: e.to_string(),
    })?;
    Ok(tree.with_file(
        format!("{root}/galaxy.yml"),
        File::new("galaxy.yml", rendered),
    ))
}
