//! Helm chart operations
//!
//! Dependency update, lint, package, and OCI push, plus the full
//! dependency-update → lint → package → push pipeline. Chart metadata is
//! read from `Chart.yaml`; the packaged archive is expected under
//! `<name>-<version>.tgz`. The push step mounts only the archive and the
//! derived auth config, never the chart source.

use crate::executor::StepError;
use crate::modules::errors::ModuleError;
use crate::pipeline::{Pipeline, PipelineStep};
use crate::step::fs::{Directory, File};
use crate::step::registry::{attach_docker_config, RegistryCredential, DEFAULT_DOCKER_CONFIG_PATH};
use crate::step::{StepBuilder, StepPlan, ValidationError};
use serde::Deserialize;

/// Default image carrying the chart tool
pub const DEFAULT_HELM_IMAGE: &str = "alpine/helm:3.15.2";

const CHART_PATH: &str = "/workspace/chart";
const OUTPUT_PATH: &str = "/out";

/// Name and version as declared by `Chart.yaml`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChartMetadata {
    /// Chart name
    pub name: String,
    /// Chart version
    pub version: String,
}

impl ChartMetadata {
    /// The archive filename the chart tool will produce
    #[must_use]
    pub fn archive_name(&self) -> String {
        format!("{}-{}.tgz", self.name, self.version)
    }
}

/// Reads chart metadata from a chart directory
///
/// # Errors
///
/// Returns [`ValidationError::MissingInput`] when `Chart.yaml` is absent and
/// [`ModuleError::Parse`] when it is malformed.
pub fn chart_metadata(chart: &Directory) -> Result<ChartMetadata, ModuleError> {
    let manifest = chart
        .file("Chart.yaml")
        .ok_or_else(|| ValidationError::MissingInput("Chart.yaml".to_string()))?;
    serde_yaml::from_slice(&manifest.contents).map_err(|e| ModuleError::Parse {
        what: "Chart.yaml".to_string(),
        reason: e.to_string(),
    })
}

/// Builds a dependency-update step over a mounted chart
///
/// # Errors
///
/// Returns a validation error when the chart has no `Chart.yaml`.
pub fn dependency_update(chart: &Directory) -> Result<StepPlan, ModuleError> {
    chart_metadata(chart)?;
    Ok(StepBuilder::new("dependency-update")
        .from(DEFAULT_HELM_IMAGE)
        .mount_directory(CHART_PATH, chart.clone())
        .exec(["helm", "dependency", "update", CHART_PATH])
        .expect_directory(CHART_PATH)
        .build()?)
}

/// Builds a lint step over a mounted chart
///
/// # Errors
///
/// Returns a validation error when the chart has no `Chart.yaml`.
pub fn lint(chart: &Directory) -> Result<StepPlan, ModuleError> {
    chart_metadata(chart)?;
    Ok(StepBuilder::new("lint")
        .from(DEFAULT_HELM_IMAGE)
        .mount_directory(CHART_PATH, chart.clone())
        .exec(["helm", "lint", CHART_PATH])
        .build()?)
}

/// Builds a package step; returns the plan and the archive's container path
///
/// # Errors
///
/// Returns a validation error when the chart has no `Chart.yaml`.
pub fn package(chart: &Directory) -> Result<(StepPlan, String), ModuleError> {
    let metadata = chart_metadata(chart)?;
    let archive_path = format!("{OUTPUT_PATH}/{}", metadata.archive_name());
    let plan = StepBuilder::new("package")
        .from(DEFAULT_HELM_IMAGE)
        .mount_directory(CHART_PATH, chart.clone())
        .exec(["helm", "package", CHART_PATH, "-d", OUTPUT_PATH])
        .expect_file(&archive_path)
        .build()?;
    Ok((plan, archive_path))
}

/// Builds a push step for a packaged archive
///
/// # Errors
///
/// Returns validation errors for an empty registry or repository.
pub fn push(
    archive: &File,
    registry: &str,
    repository: &str,
    credential: &RegistryCredential,
) -> Result<StepPlan, ModuleError> {
    Ok(push_plan(archive, registry, repository, credential)?)
}

fn push_plan(
    archive: &File,
    registry: &str,
    repository: &str,
    credential: &RegistryCredential,
) -> Result<StepPlan, ValidationError> {
    if registry.is_empty() {
        return Err(ValidationError::MissingInput("registry".to_string()));
    }
    if repository.is_empty() {
        return Err(ValidationError::MissingInput("repository".to_string()));
    }
    let archive_path = format!("/workspace/{}", archive.name);
    let builder = StepBuilder::new("push")
        .from(DEFAULT_HELM_IMAGE)
        .mount_file(&archive_path, archive.clone());
    let builder = attach_docker_config(
        builder,
        std::slice::from_ref(credential),
        DEFAULT_DOCKER_CONFIG_PATH,
        false,
    );
    let target = format!("oci://{registry}/{repository}");
    builder
        .exec([
            "helm",
            "push",
            archive_path.as_str(),
            target.as_str(),
            "--registry-config",
            DEFAULT_DOCKER_CONFIG_PATH,
        ])
        .build()
}

/// Assembles the dependency-update → lint → package → push pipeline
///
/// The push step reads the packaged archive from the package step's result
/// and exports nothing else; the archive itself is exported into the final
/// report.
///
/// # Errors
///
/// Returns validation errors for a chart without `Chart.yaml` or an empty
/// registry or repository.
pub fn chart_push_pipeline(
    chart: &Directory,
    registry: &str,
    repository: &str,
    credential: RegistryCredential,
) -> Result<Pipeline, ModuleError> {
    let update = dependency_update(chart)?;
    let lint = lint(chart)?;
    let (package, archive_path) = package(chart)?;
    // Surface empty registry/repository now, not at push time.
    if registry.is_empty() {
        return Err(ValidationError::MissingInput("registry".to_string()).into());
    }
    if repository.is_empty() {
        return Err(ValidationError::MissingInput("repository".to_string()).into());
    }

    let registry = registry.to_string();
    let repository = repository.to_string();
    let factory_archive_path = archive_path.clone();

    Ok(Pipeline::new("chart-push")
        .step(PipelineStep::new("dependency-update", move |_| {
            Ok(update.clone())
        }))
        .step(PipelineStep::new("lint", move |_| Ok(lint.clone())))
        .step(
            PipelineStep::new("package", move |_| Ok(package.clone()))
                .export(&archive_path),
        )
        .step(PipelineStep::new("push", move |state| {
            let archive = state
                .file("package", &factory_archive_path)
                .ok_or_else(|| {
                    StepError::Validation(ValidationError::MissingInput(
                        "packaged chart archive".to_string(),
                    ))
                })?;
            push_plan(archive, &registry, &repository, &credential).map_err(Into::into)
        })))
}
