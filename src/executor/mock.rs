//! In-memory host runtime test double
//!
//! Records runtime calls and replays scripted exec outputs. The container
//! filesystem is a flat path map; `copy_in`/`copy_out` bridge it to the host
//! filesystem so the executor's capture path is exercised for real.

use crate::executor::runtime::{ExecOutput, HostRuntime, RuntimeError};
use ahash::AHashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::Path;

/// One recorded exec call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedExec {
    /// Command and arguments
    pub argv: Vec<String>,
    /// Environment pairs passed inline to the exec
    pub env: Vec<(String, String)>,
    /// Environment pairs delivered through an env file
    pub file_env: Vec<(String, String)>,
    /// Working directory, when set
    pub workdir: Option<String>,
}

impl RecordedExec {
    /// All environment pairs seen by the command, inline and file-delivered
    pub fn all_env(&self) -> Vec<(String, String)> {
        let mut all = self.env.clone();
        all.extend(self.file_env.iter().cloned());
        all
    }
}

#[derive(Default)]
struct MockState {
    fs: AHashMap<String, Vec<u8>>,
    execs: Vec<RecordedExec>,
    scripted: VecDeque<ExecOutput>,
    removed_paths: Vec<String>,
    removed_containers: Vec<String>,
    pulled: Vec<String>,
    fail_pull: bool,
    next_container: u32,
}

/// Scriptable in-memory runtime
#[derive(Default)]
pub struct MockRuntime {
    state: Mutex<MockState>,
}

impl MockRuntime {
    /// Creates an empty mock
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the output for the next exec call
    pub fn script_exec(&self, output: ExecOutput) {
        self.state.lock().scripted.push_back(output);
    }

    /// Queues a failing exec with the given exit code and stderr
    pub fn script_failure(&self, exit_code: i32, stderr: impl Into<String>) {
        self.script_exec(ExecOutput {
            exit_code,
            stdout: String::new(),
            stderr: stderr.into(),
        });
    }

    /// Makes the next pull fail
    pub fn fail_pull(&self) {
        self.state.lock().fail_pull = true;
    }

    /// Seeds a file into the container filesystem, as if a tool had written it
    pub fn seed_file(&self, path: impl Into<String>, contents: impl Into<Vec<u8>>) {
        self.state.lock().fs.insert(path.into(), contents.into());
    }

    /// Returns the bytes at a container path, when present
    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.state.lock().fs.get(path).cloned()
    }

    /// All recorded exec calls, in order
    pub fn execs(&self) -> Vec<RecordedExec> {
        self.state.lock().execs.clone()
    }

    /// Paths removed via `remove_path`, in order
    pub fn removed_paths(&self) -> Vec<String> {
        self.state.lock().removed_paths.clone()
    }

    /// Images pulled, in order
    pub fn pulled(&self) -> Vec<String> {
        self.state.lock().pulled.clone()
    }

    /// Containers removed, in order
    pub fn removed_containers(&self) -> Vec<String> {
        self.state.lock().removed_containers.clone()
    }
}

impl HostRuntime for MockRuntime {
    fn name(&self) -> &str {
        "mock"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn pull(&self, image: &str) -> Result<(), RuntimeError> {
        let mut state = self.state.lock();
        if state.fail_pull {
            return Err(RuntimeError::PullFailed {
                image: image.to_string(),
                stderr: "manifest unknown".to_string(),
            });
        }
        state.pulled.push(image.to_string());
        Ok(())
    }

    fn create(&self, _image: &str) -> Result<String, RuntimeError> {
        let mut state = self.state.lock();
        state.next_container += 1;
        Ok(format!("mock-{}", state.next_container))
    }

    fn copy_in(&self, _container: &str, source: &Path, dest: &str) -> Result<(), RuntimeError> {
        let mut state = self.state.lock();
        if source.is_dir() {
            copy_tree_in(&mut state.fs, source, source, dest)?;
        } else {
            let bytes = std::fs::read(source)?;
            state.fs.insert(dest.to_string(), bytes);
        }
        Ok(())
    }

    fn copy_out(&self, _container: &str, source: &str, dest: &Path) -> Result<(), RuntimeError> {
        let state = self.state.lock();
        if let Some(bytes) = state.fs.get(source) {
            if let Some(parent) = dest.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(dest, bytes)?;
            return Ok(());
        }

        let prefix = format!("{}/", source.trim_end_matches('/'));
        let entries: Vec<(&String, &Vec<u8>)> = state
            .fs
            .iter()
            .filter(|(path, _)| path.starts_with(&prefix))
            .collect();
        if entries.is_empty() {
            return Err(RuntimeError::CopyFailed {
                path: source.to_string(),
                reason: "no such path in container".to_string(),
            });
        }
        for (path, bytes) in entries {
            let rel = &path[prefix.len()..];
            let target = dest.join(rel);
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(target, bytes)?;
        }
        Ok(())
    }

    fn remove_path(&self, _container: &str, path: &str) -> Result<(), RuntimeError> {
        let mut state = self.state.lock();
        let prefix = format!("{}/", path.trim_end_matches('/'));
        state
            .fs
            .retain(|entry, _| entry != path && !entry.starts_with(&prefix));
        state.removed_paths.push(path.to_string());
        Ok(())
    }

    fn exec(
        &self,
        _container: &str,
        argv: &[String],
        env: &[(String, String)],
        env_file: Option<&Path>,
        workdir: Option<&str>,
    ) -> Result<ExecOutput, RuntimeError> {
        let file_env = match env_file {
            Some(path) => std::fs::read_to_string(path)
                .unwrap_or_default()
                .lines()
                .filter_map(|line| {
                    line.split_once('=')
                        .map(|(name, value)| (name.to_string(), value.to_string()))
                })
                .collect(),
            None => Vec::new(),
        };
        let mut state = self.state.lock();
        state.execs.push(RecordedExec {
            argv: argv.to_vec(),
            env: env.to_vec(),
            file_env,
            workdir: workdir.map(ToString::to_string),
        });
        Ok(state.scripted.pop_front().unwrap_or_default())
    }

    fn remove(&self, container: &str) -> Result<(), RuntimeError> {
        self.state
            .lock()
            .removed_containers
            .push(container.to_string());
        Ok(())
    }
}

fn copy_tree_in(
    fs: &mut AHashMap<String, Vec<u8>>,
    root: &Path,
    current: &Path,
    dest: &str,
) -> Result<(), RuntimeError> {
    for entry in std::fs::read_dir(current)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            copy_tree_in(fs, root, &path, dest)?;
        } else {
            let rel = path
                .strip_prefix(root)
                .unwrap_or(&path)
                .to_string_lossy()
                .replace('\\', "/");
            let bytes = std::fs::read(&path)?;
            fs.insert(format!("{}/{rel}", dest.trim_end_matches('/')), bytes);
        }
    }
    Ok(())
}
