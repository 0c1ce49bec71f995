//! Step executor
//!
//! Realizes a [`StepPlan`] against a [`HostRuntime`]: applies layers in
//! order, materializes mounts and secrets, accumulates exec output, removes
//! secret files before capture, and captures declared outputs.

use crate::executor::cancel::CancelToken;
use crate::executor::runtime::{HostRuntime, RuntimeError};
use crate::step::errors::ValidationError;
use crate::step::fs::{Directory, File, FsError};
use crate::step::layer::{EnvValue, ExecOpts, Layer};
use crate::step::secret::{SecretError, SecretStore};
use crate::step::{ExpectedOutput, StepPlan, StepResult};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

/// Errors raised while executing a step
#[derive(Error, Debug)]
pub enum StepError {
    /// Plan validation failed
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// A secret could not be resolved
    #[error("Secret resolution failed: {0}")]
    Secret(#[from] SecretError),

    /// The host runtime failed
    #[error("Host runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    /// Host filesystem access failed
    #[error("Filesystem error: {0}")]
    Fs(#[from] FsError),

    /// An exec layer exited non-zero and was not tolerated
    #[error("Step '{step}' failed with exit code {code}: {stderr}")]
    ExecFailed {
        /// Name of the failing step.
        step: String,
        /// Exit code of the failing exec layer.
        code: i32,
        /// Accumulated standard output up to the failure.
        stdout: String,
        /// Accumulated standard error up to the failure.
        stderr: String,
        /// The invoked command line with secrets elided.
        argv: String,
    },

    /// A declared output was not present after execution
    #[error("Step '{step}' did not produce expected output '{path}'")]
    MissingOutput {
        /// Name of the step.
        step: String,
        /// The declared output path.
        path: String,
    },

    /// Execution was cancelled at a layer boundary
    #[error("Step '{step}' was cancelled")]
    Cancelled {
        /// Name of the step.
        step: String,
    },
}

impl StepError {
    /// Captured stderr of the failing tool, when applicable
    #[must_use]
    pub fn stderr(&self) -> Option<&str> {
        match self {
            Self::ExecFailed { stderr, .. } => Some(stderr),
            _ => None,
        }
    }
}

/// Executes step plans against a host runtime
///
/// The runtime connection is single-owner per pipeline invocation; the
/// executor holds no mutable state of its own.
#[derive(Clone)]
pub struct StepExecutor {
    runtime: Arc<dyn HostRuntime>,
    secrets: Arc<dyn SecretStore>,
}

/// Arguments for one exec layer invocation.
struct ExecCall<'a> {
    plan: &'a StepPlan,
    container: &'a str,
    argv: &'a [String],
    opts: &'a ExecOpts,
    env: &'a [(String, String)],
    secret_env: &'a [(String, String)],
    sandbox: &'a Path,
    index: usize,
    workdir: Option<&'a str>,
    result: &'a mut StepResult,
    secret_paths: &'a [String],
}

/// Removes the container when the step scope ends, also on error paths.
struct ContainerGuard<'a> {
    runtime: &'a dyn HostRuntime,
    id: String,
}

impl Drop for ContainerGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.runtime.remove(&self.id) {
            tracing::warn!(container = %self.id, error = %e, "Failed to remove container");
        }
    }
}

impl StepExecutor {
    /// Creates an executor over a runtime and a secret store
    pub fn new(runtime: Arc<dyn HostRuntime>, secrets: Arc<dyn SecretStore>) -> Self {
        Self { runtime, secrets }
    }

    /// Executes a plan to completion
    ///
    /// # Errors
    ///
    /// Returns [`StepError`] on pull failures, secret resolution failures,
    /// non-tolerated non-zero exits, and missing declared outputs.
    pub fn execute(&self, plan: &StepPlan) -> Result<StepResult, StepError> {
        self.execute_with_cancel(plan, &CancelToken::new())
    }

    /// Executes a plan, honoring cancellation at layer boundaries
    ///
    /// On cancellation, mounted secrets are released and no partial result is
    /// committed.
    ///
    /// # Errors
    ///
    /// Same as [`StepExecutor::execute`], plus [`StepError::Cancelled`].
    pub fn execute_with_cancel(
        &self,
        plan: &StepPlan,
        cancel: &CancelToken,
    ) -> Result<StepResult, StepError> {
        let start = Instant::now();
        tracing::info!(step = %plan.name, image = %plan.image, "Executing step");

        self.runtime.pull(&plan.image)?;
        let container = self.runtime.create(&plan.image)?;
        let guard = ContainerGuard {
            runtime: self.runtime.as_ref(),
            id: container.clone(),
        };

        let sandbox = tempfile::tempdir().map_err(|e| FsError::Io {
            path: "step sandbox".to_string(),
            source: e,
        })?;

        let mut result = StepResult::new();
        let mut env: Vec<(String, String)> = Vec::new();
        // Secret-backed env travels via a staged env file, never on the
        // host command line.
        let mut secret_env: Vec<(String, String)> = Vec::new();
        let mut workdir: Option<String> = None;
        let mut secret_paths: Vec<String> = Vec::new();

        for (index, layer) in plan.layers.iter().enumerate() {
            if cancel.is_cancelled() {
                self.release_secrets(&container, &secret_paths);
                return Err(StepError::Cancelled {
                    step: plan.name.clone(),
                });
            }
            tracing::debug!(step = %plan.name, layer = %layer.kind(), "Applying layer");

            match layer {
                Layer::Install { manager, packages } => {
                    let argv = manager.install_argv(packages);
                    self.run_exec(ExecCall {
                        plan,
                        container: &container,
                        argv: &argv,
                        opts: &ExecOpts::default(),
                        env: &env,
                        secret_env: &secret_env,
                        sandbox: sandbox.path(),
                        index,
                        workdir: workdir.as_deref(),
                        result: &mut result,
                        secret_paths: &secret_paths,
                    })?;
                }
                Layer::MountDirectory { path, directory } => {
                    let staging = sandbox.path().join(format!("mnt{index}"));
                    std::fs::create_dir_all(&staging).map_err(|e| io_err(&staging, e))?;
                    directory.export(&staging)?;
                    self.runtime.copy_in(&container, &staging, path)?;
                }
                Layer::MountFile { path, file, mode } => {
                    let staging = sandbox.path().join(format!("mnt{index}"));
                    write_host_file(&staging, &file.contents, mode.or(file.mode))?;
                    self.runtime.copy_in(&container, &staging, path)?;
                }
                Layer::WriteFile {
                    path,
                    contents,
                    mode,
                } => {
                    let staging = sandbox.path().join(format!("mnt{index}"));
                    write_host_file(&staging, contents.as_bytes(), *mode)?;
                    self.runtime.copy_in(&container, &staging, path)?;
                }
                Layer::MountSecret { path, secret } => {
                    let value = self.secrets.resolve(secret)?;
                    let staging = sandbox.path().join(format!("mnt{index}"));
                    write_host_file(&staging, value.reveal(), Some(0o600))?;
                    self.runtime.copy_in(&container, &staging, path)?;
                    // Shred the staging copy; the sandbox outlives the layer.
                    let _ = std::fs::remove_file(&staging);
                    secret_paths.push(path.clone());
                }
                Layer::Env { name, value } => match value {
                    EnvValue::Plain(v) => env.push((name.clone(), v.clone())),
                    EnvValue::Secret(secret) => {
                        tracing::debug!(step = %plan.name, name = %name, "Binding secret env var");
                        let resolved = self.secrets.resolve(secret)?;
                        secret_env.push((name.clone(), resolved.reveal_str()));
                    }
                },
                Layer::Workdir { path } => workdir = Some(path.clone()),
                Layer::Exec { argv, opts } => {
                    self.run_exec(ExecCall {
                        plan,
                        container: &container,
                        argv,
                        opts,
                        env: &env,
                        secret_env: &secret_env,
                        sandbox: sandbox.path(),
                        index,
                        workdir: workdir.as_deref(),
                        result: &mut result,
                        secret_paths: &secret_paths,
                    })?;
                }
                // Entrypoint overrides concern the committed image, not the
                // step's own execution.
                Layer::Entrypoint { .. } => {}
            }
        }

        // Secrets must not be visible in any captured output.
        self.release_secrets(&container, &secret_paths);

        if cancel.is_cancelled() {
            return Err(StepError::Cancelled {
                step: plan.name.clone(),
            });
        }

        for (index, output) in plan.outputs.iter().enumerate() {
            let dest = sandbox.path().join(format!("cap{index}"));
            self.runtime
                .copy_out(&container, output.path(), &dest)
                .map_err(|_| StepError::MissingOutput {
                    step: plan.name.clone(),
                    path: output.path().to_string(),
                })?;
            match output {
                ExpectedOutput::Directory { path } => {
                    result.record_directory(path.clone(), Directory::load(&dest)?);
                }
                ExpectedOutput::File { path } => {
                    let mut file = File::load(&dest)?;
                    file.name = path.rsplit('/').next().unwrap_or(path).to_string();
                    result.record_file(path.clone(), file);
                }
            }
        }

        drop(guard);
        result.duration = start.elapsed();
        tracing::info!(
            step = %plan.name,
            exit_code = result.exit_code,
            duration_ms = result.duration.as_millis(),
            "Step completed"
        );
        Ok(result)
    }

    fn run_exec(&self, call: ExecCall<'_>) -> Result<(), StepError> {
        let final_argv: Vec<String> = if call.opts.shell {
            let script = if call.argv.len() == 1 {
                call.argv[0].clone()
            } else {
                shell_words::join(call.argv)
            };
            vec!["sh".to_string(), "-c".to_string(), script]
        } else {
            call.argv.to_vec()
        };

        let env_file = if call.secret_env.is_empty() {
            None
        } else {
            let path = call.sandbox.join(format!("env{}", call.index));
            write_host_file(&path, render_env_file(call.secret_env).as_bytes(), Some(0o600))?;
            Some(path)
        };

        let output = self.runtime.exec(
            call.container,
            &final_argv,
            call.env,
            env_file.as_deref(),
            call.workdir,
        );
        // Shred the staged secrets regardless of the exec outcome.
        if let Some(path) = &env_file {
            let _ = std::fs::remove_file(path);
        }
        let output = output?;

        call.result.stdout.push_str(&output.stdout);
        call.result.stderr.push_str(&output.stderr);
        call.result.exit_code = output.exit_code;

        if !output.is_success() && !call.opts.ignore_exit {
            self.release_secrets(call.container, call.secret_paths);
            return Err(StepError::ExecFailed {
                step: call.plan.name.clone(),
                code: output.exit_code,
                stdout: call.result.stdout.clone(),
                stderr: call.result.stderr.clone(),
                argv: shell_words::join(call.argv),
            });
        }
        Ok(())
    }

    fn release_secrets(&self, container: &str, paths: &[String]) {
        for path in paths {
            if let Err(e) = self.runtime.remove_path(container, path) {
                tracing::warn!(path = %path, error = %e, "Failed to remove secret mount");
            }
        }
    }
}

/// `NAME=value` lines for the runtime's env-file flag.
///
/// Values are written verbatim; the format carries single-line values only,
/// which covers tokens, passwords, and age keys.
fn render_env_file(pairs: &[(String, String)]) -> String {
    pairs
        .iter()
        .map(|(name, value)| format!("{name}={value}\n"))
        .collect()
}

fn write_host_file(path: &Path, contents: &[u8], mode: Option<u32>) -> Result<(), FsError> {
    std::fs::write(path, contents).map_err(|e| io_err(path, e))?;
    #[cfg(unix)]
    if let Some(mode) = mode {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
            .map_err(|e| io_err(path, e))?;
    }
    #[cfg(not(unix))]
    let _ = mode;
    Ok(())
}

fn io_err(path: &Path, source: std::io::Error) -> FsError {
    FsError::Io {
        path: path.display().to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::mock::MockRuntime;
    use crate::executor::runtime::ExecOutput;
    use crate::step::secret::StaticSecretStore;
    use crate::step::{PackageManager, StepBuilder};
    use pretty_assertions::assert_eq;

    fn executor(runtime: Arc<MockRuntime>) -> (StepExecutor, StaticSecretStore) {
        let store = StaticSecretStore::new();
        (
            StepExecutor::new(runtime, Arc::new(store.clone())),
            store,
        )
    }

    #[test]
    fn test_layers_apply_in_order() {
        let runtime = Arc::new(MockRuntime::new());
        let (executor, _) = executor(Arc::clone(&runtime));

        let plan = StepBuilder::new("build")
            .from("alpine:3.20")
            .install_packages(PackageManager::Apk, ["git"])
            .workdir("/workspace")
            .exec(["git", "status"])
            .build()
            .unwrap();

        executor.execute(&plan).unwrap();

        let execs = runtime.execs();
        assert_eq!(execs.len(), 2);
        assert_eq!(execs[0].argv, vec!["apk", "add", "--no-cache", "git"]);
        assert_eq!(execs[1].argv, vec!["git", "status"]);
        assert_eq!(execs[1].workdir.as_deref(), Some("/workspace"));
        assert_eq!(runtime.pulled(), vec!["alpine:3.20"]);
        assert_eq!(runtime.removed_containers().len(), 1);
    }

    #[test]
    fn test_stdout_accumulates_across_execs() {
        let runtime = Arc::new(MockRuntime::new());
        runtime.script_exec(ExecOutput {
            exit_code: 0,
            stdout: "one\n".into(),
            stderr: String::new(),
        });
        runtime.script_exec(ExecOutput {
            exit_code: 0,
            stdout: "two\n".into(),
            stderr: "warn\n".into(),
        });
        let (executor, _) = executor(Arc::clone(&runtime));

        let plan = StepBuilder::new("x")
            .from("alpine:3.20")
            .exec(["echo", "one"])
            .exec(["echo", "two"])
            .build()
            .unwrap();

        let result = executor.execute(&plan).unwrap();
        assert_eq!(result.stdout, "one\ntwo\n");
        assert_eq!(result.stderr, "warn\n");
        assert!(result.is_success());
    }

    #[test]
    fn test_nonzero_exit_fails_the_step() {
        let runtime = Arc::new(MockRuntime::new());
        runtime.script_failure(2, "boom");
        let (executor, _) = executor(Arc::clone(&runtime));

        let plan = StepBuilder::new("x")
            .from("alpine:3.20")
            .exec(["false"])
            .exec(["echo", "unreachable"])
            .build()
            .unwrap();

        let err = executor.execute(&plan).unwrap_err();
        match err {
            StepError::ExecFailed { code, stderr, .. } => {
                assert_eq!(code, 2);
                assert_eq!(stderr, "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
        // The second exec never ran.
        assert_eq!(runtime.execs().len(), 1);
        // The container was still torn down.
        assert_eq!(runtime.removed_containers().len(), 1);
    }

    #[test]
    fn test_ignore_exit_tolerates_failure() {
        let runtime = Arc::new(MockRuntime::new());
        runtime.script_failure(1, "lint findings");
        let (executor, _) = executor(Arc::clone(&runtime));

        let plan = StepBuilder::new("lint")
            .from("alpine:3.20")
            .exec_with(["lint", "."], ExecOpts::new().ignore_exit())
            .build()
            .unwrap();

        let result = executor.execute(&plan).unwrap();
        assert_eq!(result.exit_code, 1);
        assert_eq!(result.stderr, "lint findings");
    }

    #[test]
    fn test_pull_failure_is_fatal() {
        let runtime = Arc::new(MockRuntime::new());
        runtime.fail_pull();
        let (executor, _) = executor(Arc::clone(&runtime));

        let plan = StepBuilder::new("x").from("ghost:1").build().unwrap();
        assert!(matches!(
            executor.execute(&plan),
            Err(StepError::Runtime(RuntimeError::PullFailed { .. }))
        ));
    }

    #[test]
    fn test_secret_mount_is_removed_before_capture() {
        let runtime = Arc::new(MockRuntime::new());
        let (executor, store) = executor(Arc::clone(&runtime));
        let secret = store.insert("age-key", "AGE-SECRET-KEY-1");

        let plan = StepBuilder::new("decrypt")
            .from("alpine:3.20")
            .mount_secret("/workspace/out/key.txt", secret)
            .exec(["true"])
            .expect_directory("/workspace/out")
            .build()
            .unwrap();

        // The tool writes a plaintext artifact next to the key.
        runtime.seed_file("/workspace/out/plain.json", "{}");

        let result = executor.execute(&plan).unwrap();
        assert_eq!(runtime.removed_paths(), vec!["/workspace/out/key.txt"]);

        let captured = result.directory("/workspace/out").unwrap();
        assert!(captured.file("plain.json").is_some());
        assert!(captured.file("key.txt").is_none());
    }

    #[test]
    fn test_secret_env_resolved_at_exec() {
        let runtime = Arc::new(MockRuntime::new());
        let (executor, store) = executor(Arc::clone(&runtime));
        let secret = store.insert("token", "tok-123");

        let plan = StepBuilder::new("login")
            .from("alpine:3.20")
            .env("GITHUB_TOKEN", secret)
            .sh("gh auth login")
            .build()
            .unwrap();

        executor.execute(&plan).unwrap();
        let execs = runtime.execs();
        assert_eq!(
            execs[0].all_env(),
            vec![("GITHUB_TOKEN".to_string(), "tok-123".to_string())]
        );
        assert_eq!(execs[0].argv[..2], ["sh".to_string(), "-c".to_string()]);
    }

    #[test]
    fn test_secret_env_kept_off_the_command_line() {
        let runtime = Arc::new(MockRuntime::new());
        let (executor, store) = executor(Arc::clone(&runtime));
        let secret = store.insert("registry-password", "hunter2");

        let plan = StepBuilder::new("login")
            .from("alpine:3.20")
            .env("REGISTRY_USER", "alice")
            .env("REGISTRY_PASSWORD", secret)
            .sh("printf '%s' \"$REGISTRY_PASSWORD\" | docker login --password-stdin")
            .build()
            .unwrap();

        executor.execute(&plan).unwrap();
        let exec = &runtime.execs()[0];
        // Plain env rides inline; the secret only through the env file.
        assert_eq!(
            exec.env,
            vec![("REGISTRY_USER".to_string(), "alice".to_string())]
        );
        assert_eq!(
            exec.file_env,
            vec![("REGISTRY_PASSWORD".to_string(), "hunter2".to_string())]
        );
        assert!(!exec.argv.iter().any(|arg| arg.contains("hunter2")));
    }

    #[test]
    fn test_render_env_file_format() {
        let rendered = render_env_file(&[
            ("A".to_string(), "1".to_string()),
            ("B".to_string(), "two words".to_string()),
        ]);
        assert_eq!(rendered, "A=1\nB=two words\n");
    }

    #[test]
    fn test_missing_declared_output() {
        let runtime = Arc::new(MockRuntime::new());
        let (executor, _) = executor(Arc::clone(&runtime));

        let plan = StepBuilder::new("package")
            .from("alpine:3.20")
            .exec(["true"])
            .expect_file("/workspace/out.tgz")
            .build()
            .unwrap();

        assert!(matches!(
            executor.execute(&plan),
            Err(StepError::MissingOutput { path, .. }) if path == "/workspace/out.tgz"
        ));
    }

    #[test]
    fn test_file_output_capture_names_by_basename() {
        let runtime = Arc::new(MockRuntime::new());
        let (executor, _) = executor(Arc::clone(&runtime));
        runtime.seed_file("/workspace/foo-1.2.3.tgz", "archive-bytes");

        let plan = StepBuilder::new("package")
            .from("alpine:3.20")
            .exec(["true"])
            .expect_file("/workspace/foo-1.2.3.tgz")
            .build()
            .unwrap();

        let result = executor.execute(&plan).unwrap();
        let file = result.file("/workspace/foo-1.2.3.tgz").unwrap();
        assert_eq!(file.name, "foo-1.2.3.tgz");
        assert_eq!(file.contents, b"archive-bytes");
    }

    #[test]
    fn test_undeclared_path_reachable_via_result_root() {
        let runtime = Arc::new(MockRuntime::new());
        let (executor, _) = executor(Arc::clone(&runtime));
        runtime.seed_file("/out/scan.json", "{}");
        runtime.seed_file("/out/nested/sbom.json", "[]");

        let plan = StepBuilder::new("scan")
            .from("alpine:3.20")
            .exec(["true"])
            .expect_directory("/out")
            .build()
            .unwrap();

        let result = executor.execute(&plan).unwrap();
        // Only "/out" was declared, yet the files inside it are addressable
        // through the root by their container paths.
        assert!(result.file("/out/scan.json").is_none());
        assert_eq!(result.root().file("/out/scan.json").unwrap().contents, b"{}");
        assert_eq!(
            result.root().file("/out/nested/sbom.json").unwrap().contents,
            b"[]"
        );
    }

    #[test]
    fn test_cancellation_stops_at_layer_boundary() {
        let runtime = Arc::new(MockRuntime::new());
        let (executor, _) = executor(Arc::clone(&runtime));
        let cancel = CancelToken::new();
        cancel.cancel();

        let plan = StepBuilder::new("x")
            .from("alpine:3.20")
            .exec(["echo", "hi"])
            .build()
            .unwrap();

        assert!(matches!(
            executor.execute_with_cancel(&plan, &cancel),
            Err(StepError::Cancelled { .. })
        ));
        assert!(runtime.execs().is_empty());
    }

    #[test]
    fn test_mounted_directory_reaches_container() {
        let runtime = Arc::new(MockRuntime::new());
        let (executor, _) = executor(Arc::clone(&runtime));

        let dir = Directory::new().with_file(
            "Chart.yaml",
            File::new("Chart.yaml", "name: foo\nversion: 1.2.3\n"),
        );
        let plan = StepBuilder::new("mount")
            .from("alpine:3.20")
            .mount_directory("/workspace/chart", dir)
            .exec(["true"])
            .build()
            .unwrap();

        executor.execute(&plan).unwrap();
        assert_eq!(
            runtime.file("/workspace/chart/Chart.yaml").unwrap(),
            b"name: foo\nversion: 1.2.3\n"
        );
    }
}
