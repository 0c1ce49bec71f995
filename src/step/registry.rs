//! Registry credential engine
//!
//! Compiles user-provided registry credentials into step layers. Two
//! attachment modes exist: a CLI-login exec layer (password via a secret env
//! var, never argv) and a mounted docker-style auth-config document derived
//! as a secret. The password is always a [`SecretRef`]; no mode stringifies
//! it into the plan.

#![allow(clippy::must_use_candidate)]

use crate::step::builder::StepBuilder;
use crate::step::errors::ValidationError;
use crate::step::secret::SecretRef;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::Serialize;
use std::fmt;

/// Default mount path for a derived auth-config document
pub const DEFAULT_DOCKER_CONFIG_PATH: &str = "/workspace/.docker/config.json";

/// Auth for one registry host
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RegistryCredential {
    host: String,
    username: String,
    password: SecretRef,
    insecure: bool,
}

impl RegistryCredential {
    /// Creates a credential for a registry host
    ///
    /// `host` may be empty when it can be extracted from the image reference
    /// the credential is used with; see [`RegistryCredential::resolved_host`].
    pub fn new(
        host: impl Into<String>,
        username: impl Into<String>,
        password: SecretRef,
    ) -> Self {
        Self {
            host: host.into(),
            username: username.into(),
            password,
            insecure: false,
        }
    }

    /// Asserts that the registry may be reached without TLS verification
    #[must_use]
    pub fn insecure(mut self) -> Self {
        self.insecure = true;
        self
    }

    /// The registry host, possibly empty
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The username
    pub fn username(&self) -> &str {
        &self.username
    }

    /// The password reference
    pub fn password(&self) -> &SecretRef {
        &self.password
    }

    /// Returns true when the insecure flag was asserted
    pub fn is_insecure(&self) -> bool {
        self.insecure
    }

    /// The effective host for an image reference
    ///
    /// Uses the explicit host when present, otherwise falls back to
    /// [`extract_registry`] on the reference.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::NoRegistryHost`] when the host is empty and
    /// nothing can be extracted.
    pub fn resolved_host(&self, reference: &str) -> Result<String, ValidationError> {
        if !self.host.is_empty() {
            return Ok(self.host.clone());
        }
        extract_registry(reference).ok_or_else(|| ValidationError::NoRegistryHost {
            reference: reference.to_string(),
        })
    }

    /// Appends a CLI-login exec layer for this credential
    ///
    /// The password is bound to a transient secret env var and piped to the
    /// tool's `--password-stdin`; it never appears in the command line.
    pub fn attach_login(&self, builder: StepBuilder, tool: LoginTool) -> StepBuilder {
        let var = password_var(&self.host);
        let mut login = tool.login_argv(&self.host, &self.username);
        if self.insecure {
            if let Some(flag) = tool.insecure_flag() {
                login.push(flag.to_string());
            }
        }
        let script = format!(
            "printf '%s' \"${var}\" | {}",
            shell_words::join(&login)
        );
        builder.env(var, self.password.clone()).sh(script)
    }
}

impl fmt::Display for RegistryCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.username, self.host)
    }
}

/// Tools that expose an authentication command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginTool {
    /// `docker login`
    Docker,
    /// `helm registry login`
    Helm,
    /// `skopeo login`
    Skopeo,
    /// `kcl registry login`
    Kcl,
}

impl LoginTool {
    fn login_argv(self, host: &str, username: &str) -> Vec<String> {
        match self {
            Self::Docker => vec![
                "docker".into(),
                "login".into(),
                "-u".into(),
                username.into(),
                "--password-stdin".into(),
                host.into(),
            ],
            Self::Helm => vec![
                "helm".into(),
                "registry".into(),
                "login".into(),
                host.into(),
                "-u".into(),
                username.into(),
                "--password-stdin".into(),
            ],
            Self::Skopeo => vec![
                "skopeo".into(),
                "login".into(),
                "-u".into(),
                username.into(),
                "--password-stdin".into(),
                host.into(),
            ],
            Self::Kcl => vec![
                "kcl".into(),
                "registry".into(),
                "login".into(),
                host.into(),
                "-u".into(),
                username.into(),
                "--password-stdin".into(),
            ],
        }
    }

    fn insecure_flag(self) -> Option<&'static str> {
        match self {
            Self::Docker | Self::Kcl => None,
            Self::Helm => Some("--insecure"),
            Self::Skopeo => Some("--tls-verify=false"),
        }
    }
}

impl fmt::Display for LoginTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Docker => write!(f, "docker"),
            Self::Helm => write!(f, "helm"),
            Self::Skopeo => write!(f, "skopeo"),
            Self::Kcl => write!(f, "kcl"),
        }
    }
}

/// Extracts the registry host from an image reference
///
/// The host is the first `/`-segment iff it contains a `.` or `:`; plain
/// Docker Hub style references have no extractable host.
pub fn extract_registry(reference: &str) -> Option<String> {
    let first = reference.split('/').next()?;
    if first.contains('.') || first.contains(':') {
        Some(first.to_string())
    } else {
        None
    }
}

/// Encodes a user/password pair for an auth-config entry
pub fn encode_auth(username: &str, password: &str) -> String {
    STANDARD.encode(format!("{username}:{password}"))
}

/// Decodes an auth-config entry back to (user, password)
pub fn decode_auth(auth: &str) -> Option<(String, String)> {
    let decoded = STANDARD.decode(auth.as_bytes()).ok()?;
    let pair = String::from_utf8(decoded).ok()?;
    let (user, password) = pair.split_once(':')?;
    Some((user.to_string(), password.to_string()))
}

/// Renders a docker-style auth-config document
///
/// Entries are `(host, username, clear password)` tuples. Called by the
/// secret store during resolution of a derived auth-config reference; the
/// result lives only inside a [`crate::step::secret::SecretValue`].
pub fn render_docker_config(entries: &[(String, String, String)]) -> String {
    let mut auths = serde_json::Map::new();
    for (host, username, password) in entries {
        auths.insert(
            host.clone(),
            serde_json::json!({ "auth": encode_auth(username, password) }),
        );
    }
    serde_json::json!({ "auths": auths }).to_string()
}

/// Builds the derived auth-config secret for a set of credentials
///
/// The returned reference resolves to the rendered document at execution
/// time; the identifier encodes only hosts and usernames.
pub fn docker_config_secret(credentials: &[RegistryCredential]) -> SecretRef {
    let label: Vec<String> = credentials
        .iter()
        .map(|c| format!("{}@{}", c.username(), c.host()))
        .collect();
    SecretRef::docker_config(
        format!("docker-config[{}]", label.join(",")),
        credentials.to_vec(),
    )
}

/// Mounts the derived auth config for the given credentials
///
/// When `point_docker_config` is set, a `DOCKER_CONFIG` env var pointing at
/// the parent directory of the mount is added for tools that honor it.
pub fn attach_docker_config(
    builder: StepBuilder,
    credentials: &[RegistryCredential],
    mount_path: &str,
    point_docker_config: bool,
) -> StepBuilder {
    let secret = docker_config_secret(credentials);
    let builder = builder.mount_secret(mount_path, secret);
    if point_docker_config {
        let parent = mount_path
            .rsplit_once('/')
            .map_or("/", |(dir, _)| if dir.is_empty() { "/" } else { dir });
        builder.env("DOCKER_CONFIG", parent)
    } else {
        builder
    }
}

fn password_var(host: &str) -> String {
    let sanitized: String = host
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    if sanitized.is_empty() {
        "REGISTRY_PASSWORD".to_string()
    } else {
        format!("REGISTRY_PASSWORD_{sanitized}")
    }
}
