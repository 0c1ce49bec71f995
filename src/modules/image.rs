//! Container image operations
//!
//! Registry-to-registry copy (skopeo-shaped CLI) and the build → scan gate →
//! push publish pipeline. Credentials attach either as CLI-login layers or
//! as a caller-provided docker-config secret; supplying both is rejected.

use crate::modules::errors::ModuleError;
use crate::modules::scan;
use crate::pipeline::{Pipeline, PipelineStep};
use crate::step::fs::Directory;
use crate::step::registry::{LoginTool, RegistryCredential, DEFAULT_DOCKER_CONFIG_PATH};
use crate::step::secret::SecretRef;
use crate::step::{StepBuilder, StepPlan, ValidationError};

/// Default image carrying the copy tool
pub const DEFAULT_SKOPEO_IMAGE: &str = "quay.io/skopeo/stable:v1.15";

/// Default image carrying the container build CLI
pub const DEFAULT_DOCKER_CLI_IMAGE: &str = "docker:27-cli";

/// Default platform for registry copies
pub const DEFAULT_PLATFORM: &str = "linux/amd64";

const BUILD_CONTEXT_PATH: &str = "/workspace/src";

/// Inputs for a registry-to-registry copy
#[derive(Debug, Clone, Default)]
pub struct CopyRequest {
    /// Source image reference
    pub source: String,
    /// Target image reference
    pub target: String,
    /// Copy platform; defaults to [`DEFAULT_PLATFORM`]
    pub platform: Option<String>,
    /// Credential for the source registry
    pub source_credential: Option<RegistryCredential>,
    /// Credential for the target registry
    pub target_credential: Option<RegistryCredential>,
    /// Pre-built docker-config secret, mutually exclusive with credentials
    pub docker_config: Option<SecretRef>,
}

/// Builds a copy step: source login, target login, then the copy itself
///
/// # Errors
///
/// Returns a validation error for empty references, for a credential whose
/// host is neither given nor extractable, and when both a docker-config
/// secret and per-registry credentials are supplied.
pub fn copy(request: &CopyRequest) -> Result<StepPlan, ModuleError> {
    if request.source.is_empty() {
        return Err(ValidationError::MissingInput("source reference".to_string()).into());
    }
    if request.target.is_empty() {
        return Err(ValidationError::MissingInput("target reference".to_string()).into());
    }
    if request.docker_config.is_some()
        && (request.source_credential.is_some() || request.target_credential.is_some())
    {
        return Err(ValidationError::ConflictingCredentials.into());
    }

    let mut builder = StepBuilder::new("copy")
        .from(DEFAULT_SKOPEO_IMAGE)
        .entrypoint(["skopeo"]);

    if let Some(secret) = &request.docker_config {
        builder = builder
            .mount_secret(DEFAULT_DOCKER_CONFIG_PATH, secret.clone())
            .env("DOCKER_CONFIG", "/workspace/.docker");
    }
    if let Some(credential) = &request.source_credential {
        let credential = with_resolved_host(credential, &request.source)?;
        builder = credential.attach_login(builder, LoginTool::Skopeo);
    }
    if let Some(credential) = &request.target_credential {
        let credential = with_resolved_host(credential, &request.target)?;
        builder = credential.attach_login(builder, LoginTool::Skopeo);
    }

    let platform = request.platform.as_deref().unwrap_or(DEFAULT_PLATFORM);
    Ok(builder
        .exec([
            "copy",
            "--platform",
            platform,
            request.source.as_str(),
            request.target.as_str(),
        ])
        .build()?)
}

/// Inputs for the publish pipeline
#[derive(Debug, Clone, Default)]
pub struct PublishRequest {
    /// Build context
    pub context: Directory,
    /// Target image reference
    pub reference: String,
    /// Severities that halt the publish (e.g. `HIGH`, `CRITICAL`)
    pub severities: Vec<String>,
    /// Credential for the target registry
    pub credential: Option<RegistryCredential>,
    /// Pre-built docker-config secret, mutually exclusive with `credential`
    pub docker_config: Option<SecretRef>,
}

/// Assembles the build → scan gate → push pipeline
///
/// The scan gate halts the pipeline (and skips the push) when the report
/// contains findings at the requested severities.
///
/// # Errors
///
/// Returns validation errors for an empty reference, an empty build context,
/// or conflicting credential inputs.
pub fn publish_pipeline(request: &PublishRequest) -> Result<Pipeline, ModuleError> {
    if request.reference.is_empty() {
        return Err(ValidationError::MissingInput("image reference".to_string()).into());
    }
    if request.context.is_empty() {
        return Err(ValidationError::MissingInput("build context".to_string()).into());
    }
    if request.docker_config.is_some() && request.credential.is_some() {
        return Err(ValidationError::ConflictingCredentials.into());
    }

    let build = build_step(&request.context, &request.reference)?;
    let scan = scan::scan_image(&request.reference, &request.severities)?;
    let push = push_step(
        &request.reference,
        request.credential.as_ref(),
        request.docker_config.as_ref(),
    )?;
    let severities = request.severities.clone();

    Ok(Pipeline::new("publish")
        .step(PipelineStep::new("build", move |_| Ok(build.clone())))
        .step(PipelineStep::new("scan", move |_| Ok(scan.clone())).gate(scan::gate(severities.clone())))
        .step(PipelineStep::new("push", move |_| Ok(push.clone()))))
}

/// Builds a container-build step over a mounted context
///
/// # Errors
///
/// Returns a validation error for an empty reference.
pub fn build_step(context: &Directory, reference: &str) -> Result<StepPlan, ModuleError> {
    if reference.is_empty() {
        return Err(ValidationError::MissingInput("image reference".to_string()).into());
    }
    Ok(StepBuilder::new("build")
        .from(DEFAULT_DOCKER_CLI_IMAGE)
        .mount_directory(BUILD_CONTEXT_PATH, context.clone())
        .workdir(BUILD_CONTEXT_PATH)
        .exec(["docker", "build", "-t", reference, "."])
        .build()?)
}

/// Builds a push step with either login mode
fn push_step(
    reference: &str,
    credential: Option<&RegistryCredential>,
    docker_config: Option<&SecretRef>,
) -> Result<StepPlan, ModuleError> {
    let mut builder = StepBuilder::new("push").from(DEFAULT_DOCKER_CLI_IMAGE);
    if let Some(secret) = docker_config {
        builder = builder
            .mount_secret(DEFAULT_DOCKER_CONFIG_PATH, secret.clone())
            .env("DOCKER_CONFIG", "/workspace/.docker");
    }
    if let Some(credential) = credential {
        let credential = with_resolved_host(credential, reference)?;
        builder = credential.attach_login(builder, LoginTool::Docker);
    }
    Ok(builder.exec(["docker", "push", reference]).build()?)
}

fn with_resolved_host(
    credential: &RegistryCredential,
    reference: &str,
) -> Result<RegistryCredential, ValidationError> {
    let host = credential.resolved_host(reference)?;
    let resolved =
        RegistryCredential::new(host, credential.username(), credential.password().clone());
    Ok(if credential.is_insecure() {
        resolved.insecure()
    } else {
        resolved
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::Layer;
    use pretty_assertions::assert_eq;

    fn creds() -> (RegistryCredential, RegistryCredential) {
        (
            RegistryCredential::new("harbor.example.com", "alice", SecretRef::new("pw1")),
            RegistryCredential::new("ghcr.io", "bot", SecretRef::new("pw2")),
        )
    }

    #[test]
    fn test_copy_logins_then_copies() {
        let (source, target) = creds();
        let plan = copy(&CopyRequest {
            source: "harbor.example.com/lib/redis:7.2".to_string(),
            target: "ghcr.io/acme/redis:7.2".to_string(),
            platform: Some("linux/amd64".to_string()),
            source_credential: Some(source),
            target_credential: Some(target),
            docker_config: None,
        })
        .unwrap();

        // env+sh per login, then the copy exec.
        assert_eq!(plan.layers.len(), 5);
        let scripts: Vec<&str> = plan
            .layers
            .iter()
            .filter_map(|l| match l {
                Layer::Exec { argv, opts } if opts.shell => Some(argv[0].as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(scripts.len(), 2);
        assert!(scripts[0].contains("-u alice"));
        assert!(scripts[0].contains("harbor.example.com"));
        assert!(scripts[1].contains("-u bot"));
        assert!(scripts[1].contains("ghcr.io"));

        let Layer::Exec { argv, .. } = plan.layers.last().unwrap() else {
            panic!("expected exec layer");
        };
        assert_eq!(
            argv,
            &[
                "copy",
                "--platform",
                "linux/amd64",
                "harbor.example.com/lib/redis:7.2",
                "ghcr.io/acme/redis:7.2",
            ]
        );
        assert_eq!(plan.entrypoint.as_deref(), Some(&["skopeo".to_string()][..]));
    }

    #[test]
    fn test_copy_defaults_platform() {
        let plan = copy(&CopyRequest {
            source: "a.example/x:1".to_string(),
            target: "b.example/x:1".to_string(),
            ..CopyRequest::default()
        })
        .unwrap();
        let Layer::Exec { argv, .. } = plan.layers.last().unwrap() else {
            panic!("expected exec layer");
        };
        assert_eq!(argv[2], DEFAULT_PLATFORM);
    }

    #[test]
    fn test_copy_rejects_conflicting_credentials() {
        let (source, _) = creds();
        let err = copy(&CopyRequest {
            source: "a.example/x:1".to_string(),
            target: "b.example/x:1".to_string(),
            source_credential: Some(source),
            docker_config: Some(SecretRef::new("cfg")),
            ..CopyRequest::default()
        })
        .unwrap_err();
        assert!(matches!(
            err,
            ModuleError::Validation(ValidationError::ConflictingCredentials)
        ));
    }

    #[test]
    fn test_copy_rejects_inextractable_host() {
        let cred = RegistryCredential::new("", "alice", SecretRef::new("pw"));
        let err = copy(&CopyRequest {
            source: "library/redis:7.2".to_string(),
            target: "b.example/x:1".to_string(),
            source_credential: Some(cred),
            ..CopyRequest::default()
        })
        .unwrap_err();
        assert!(matches!(
            err,
            ModuleError::Validation(ValidationError::NoRegistryHost { .. })
        ));
    }

    #[test]
    fn test_copy_credential_host_extracted_from_reference() {
        let cred = RegistryCredential::new("", "alice", SecretRef::new("pw"));
        let plan = copy(&CopyRequest {
            source: "quay.io/lib/app:1".to_string(),
            target: "b.example/x:1".to_string(),
            source_credential: Some(cred),
            ..CopyRequest::default()
        })
        .unwrap();
        let Layer::Exec { argv, .. } = &plan.layers[1] else {
            panic!("expected login layer");
        };
        assert!(argv[0].contains("quay.io"));
    }

    #[test]
    fn test_publish_pipeline_order() {
        let request = PublishRequest {
            context: Directory::new().with_file(
                "Dockerfile",
                crate::step::fs::File::new("Dockerfile", "FROM alpine:3.20"),
            ),
            reference: "r/i:1".to_string(),
            severities: vec!["HIGH".to_string(), "CRITICAL".to_string()],
            credential: None,
            docker_config: None,
        };
        let pipeline = publish_pipeline(&request).unwrap();
        let names: Vec<&str> = pipeline.steps().iter().map(PipelineStep::name).collect();
        assert_eq!(names, vec!["build", "scan", "push"]);
    }

    #[test]
    fn test_publish_rejects_empty_context() {
        let err = publish_pipeline(&PublishRequest {
            reference: "r/i:1".to_string(),
            ..PublishRequest::default()
        })
        .unwrap_err();
        assert!(matches!(
            err,
            ModuleError::Validation(ValidationError::MissingInput(_))
        ));
    }
}
