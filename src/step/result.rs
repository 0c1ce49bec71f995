//! Observable outcome of an executed step

#![allow(clippy::must_use_candidate)]

use crate::step::fs::{Directory, File};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Post-exec observable of one step
///
/// Captured stdout and stderr are always present, also when the step failed
/// and the caller chose to tolerate the failure. Declared outputs are present
/// only when every exec layer succeeded (or was tolerated). The result holds
/// no references to secrets.
///
/// Besides the per-declared-path handles, [`StepResult::root`] exposes the
/// captured slice of the post-exec filesystem as one tree addressable by
/// absolute container path, including files the plan never named.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepResult {
    /// Exit code of the last exec layer (0 when none ran)
    pub exit_code: i32,
    /// Accumulated standard output of all exec layers
    pub stdout: String,
    /// Accumulated standard error of all exec layers
    pub stderr: String,
    /// Wall-clock duration of the step
    pub duration: Duration,
    /// Captured directory outputs, keyed by declared path
    directories: BTreeMap<String, Directory>,
    /// Captured file outputs, keyed by declared path
    files: BTreeMap<String, File>,
    /// Captured outputs merged into one tree rooted at `/`
    root: Directory,
}

impl StepResult {
    /// Creates an empty result
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when the step exited with status zero
    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }

    /// Returns true when the step exited with a non-zero status
    pub fn is_failure(&self) -> bool {
        self.exit_code != 0
    }

    /// Records a captured directory output
    pub fn record_directory(&mut self, path: impl Into<String>, directory: Directory) {
        let path = path.into();
        self.root = std::mem::take(&mut self.root).with_directory(&path, &directory);
        self.directories.insert(path, directory);
    }

    /// Records a captured file output
    pub fn record_file(&mut self, path: impl Into<String>, file: File) {
        let path = path.into();
        self.root = std::mem::take(&mut self.root).with_file(&path, file.clone());
        self.files.insert(path, file);
    }

    /// Looks up a captured directory by its declared path
    pub fn directory(&self, path: &str) -> Option<&Directory> {
        self.directories.get(path)
    }

    /// Looks up a captured file by its declared path
    pub fn file(&self, path: &str) -> Option<&File> {
        self.files.get(path)
    }

    /// Iterates over captured directory outputs
    pub fn directories(&self) -> impl Iterator<Item = (&str, &Directory)> {
        self.directories.iter().map(|(p, d)| (p.as_str(), d))
    }

    /// Iterates over captured file outputs
    pub fn files(&self) -> impl Iterator<Item = (&str, &File)> {
        self.files.iter().map(|(p, f)| (p.as_str(), f))
    }

    /// Root view of the captured post-exec filesystem
    ///
    /// Every captured file is reachable here by its absolute container path,
    /// whether or not that exact path was declared as an output. A file a
    /// tool wrote inside a declared directory shows up under the same path
    /// it had in the container.
    pub fn root(&self) -> &Directory {
        &self.root
    }
}

impl fmt::Display for StepResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "StepResult(exit={}, {} dirs, {} files)",
            self.exit_code,
            self.directories.len(),
            self.files.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_result_success_predicates() {
        let mut result = StepResult::new();
        assert!(result.is_success());
        result.exit_code = 2;
        assert!(result.is_failure());
    }

    #[test]
    fn test_result_records_outputs() {
        let mut result = StepResult::new();
        result.record_file("/out/report.json", File::new("report.json", "{}"));
        result.record_directory("/out", Directory::new());
        assert!(result.file("/out/report.json").is_some());
        assert!(result.directory("/out").is_some());
        assert_eq!(result.to_string(), "StepResult(exit=0, 1 dirs, 1 files)");
    }

    #[test]
    fn test_root_addresses_captures_by_absolute_path() {
        let mut result = StepResult::new();
        let out = Directory::new().with_file("scan.json", File::new("scan.json", "{}"));
        result.record_directory("/report", out);
        result.record_file("/workspace/app.tgz", File::new("app.tgz", "bytes"));

        assert!(result.root().file("/report/scan.json").is_some());
        assert!(result.root().file("/workspace/app.tgz").is_some());
        // Undeclared as a file handle, but reachable through the root.
        assert!(result.file("/report/scan.json").is_none());
    }
}
