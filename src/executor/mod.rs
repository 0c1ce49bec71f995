//! Step execution layer
//!
//! Realizes frozen step plans against a host container runtime and yields
//! observable results. The runtime is abstracted behind [`HostRuntime`];
//! the shipped driver shells out to docker or podman.

pub mod cancel;
#[cfg(test)]
pub mod mock;
pub mod runtime;
pub mod step_executor;

pub use cancel::CancelToken;
pub use runtime::{CliRuntime, ExecOutput, HostRuntime, RuntimeError, RuntimeKind};
pub use step_executor::{StepError, StepExecutor};
