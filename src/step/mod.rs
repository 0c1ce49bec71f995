//! Step domain: plans, layers, secrets, filesystem values, registry auth
//!
//! A step is a single container-based unit of work described declaratively.
//! [`StepBuilder`] produces a frozen [`StepPlan`]; the executor realizes it
//! and yields a [`StepResult`].

pub mod builder;
pub mod errors;
pub mod fs;
pub mod layer;
pub mod registry;
pub mod result;
pub mod secret;

pub use builder::{ExpectedOutput, StepBuilder, StepPlan};
pub use errors::ValidationError;
pub use fs::{Directory, File, FsError};
pub use layer::{EnvValue, ExecOpts, Layer, PackageManager};
pub use registry::{
    attach_docker_config, decode_auth, docker_config_secret, encode_auth, extract_registry,
    LoginTool, RegistryCredential, DEFAULT_DOCKER_CONFIG_PATH,
};
pub use result::StepResult;
pub use secret::{
    EnvSecretStore, SecretError, SecretRef, SecretStore, SecretValue, StaticSecretStore,
};
