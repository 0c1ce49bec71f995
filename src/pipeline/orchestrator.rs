//! Pipeline orchestrator
//!
//! Runs a [`Pipeline`] sequentially: builds each step's plan from the
//! accumulated [`PipelineState`], executes it, applies the step's gate
//! policy, and collects exported artifacts into the final report.
//!
//! Policy semantics: `FailFast` stops at the first failure, `Tolerate`
//! records the failure and keeps going, `Gate` runs its predicate strictly
//! after a successful result is observed. Internal step errors are never
//! treated as gate findings.

use crate::executor::{CancelToken, StepExecutor};
use crate::pipeline::definition::{GatePolicy, Pipeline, PipelineStep};
use crate::pipeline::errors::PipelineError;
use crate::pipeline::state::PipelineState;
use crate::step::fs::{Directory, File};
use crate::step::{StepPlan, StepResult};
use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Terminal status of a pipeline run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineStatus {
    /// Every step completed; tolerated failures may still be in the records
    Succeeded,
    /// A step failed (or was cancelled) and the pipeline could not finish
    Failed {
        /// Name of the first failing step.
        step: String,
    },
    /// A gate predicate reported a finding and halted the pipeline
    Halted {
        /// Name of the gated step.
        gate: String,
    },
}

impl fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed { step } => write!(f, "failed at '{step}'"),
            Self::Halted { gate } => write!(f, "halted by gate '{gate}'"),
        }
    }
}

/// Outcome of one step inside a run
#[derive(Debug)]
pub enum StepOutcome {
    /// The step completed with exit code zero
    Succeeded,
    /// The step failed; under `Tolerate` the run continued
    Failed(PipelineError),
    /// A gate predicate halted the run at this step
    Halted {
        /// The finding reported by the predicate.
        finding: String,
    },
    /// The step never ran (earlier failure or cancellation)
    Skipped,
}

/// Per-step record in a [`PipelineReport`]
#[derive(Debug)]
pub struct StepRecord {
    /// Step name
    pub name: String,
    /// What happened
    pub outcome: StepOutcome,
    /// Captured stderr (empty when the step was skipped)
    pub stderr: String,
    /// The step's exec command lines, secrets elided
    pub argv: String,
    /// Wall-clock duration
    pub duration: Duration,
}

impl StepRecord {
    fn skipped(name: &str) -> Self {
        Self {
            name: name.to_string(),
            outcome: StepOutcome::Skipped,
            stderr: String::new(),
            argv: String::new(),
            duration: Duration::ZERO,
        }
    }
}

/// An artifact exported from a step into the final report
#[derive(Debug, Clone, PartialEq)]
pub enum Artifact {
    /// A captured directory output
    Directory(Directory),
    /// A captured file output
    File(File),
}

/// Full account of a pipeline run
#[derive(Debug)]
pub struct PipelineReport {
    /// Pipeline name
    pub pipeline: String,
    /// Run identifier
    pub id: Uuid,
    /// Terminal status
    pub status: PipelineStatus,
    /// One record per defined step, in definition order
    pub records: Vec<StepRecord>,
    /// Exported artifacts, keyed `<step>:<path>`
    pub artifacts: BTreeMap<String, Artifact>,
    /// Wall-clock duration of the whole run
    pub duration: Duration,
}

impl PipelineReport {
    /// Returns true when the run finished without a fatal failure or halt
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == PipelineStatus::Succeeded
    }

    /// The record for a named step
    #[must_use]
    pub fn record(&self, step: &str) -> Option<&StepRecord> {
        self.records.iter().find(|r| r.name == step)
    }

    /// An exported artifact, keyed `<step>:<path>`
    #[must_use]
    pub fn artifact(&self, key: &str) -> Option<&Artifact> {
        self.artifacts.get(key)
    }
}

/// Drives pipelines to completion over a step executor
#[derive(Clone)]
pub struct PipelineOrchestrator {
    executor: StepExecutor,
}

impl PipelineOrchestrator {
    /// Creates an orchestrator over an executor
    pub fn new(executor: StepExecutor) -> Self {
        Self { executor }
    }

    /// Runs a pipeline to completion
    #[must_use]
    pub fn run(&self, pipeline: &Pipeline) -> PipelineReport {
        self.run_with_cancel(pipeline, &CancelToken::new())
    }

    /// Runs a pipeline, honoring cancellation between steps
    ///
    /// A cancelled run records the interrupted step as failed and every
    /// later step as skipped.
    #[must_use]
    pub fn run_with_cancel(&self, pipeline: &Pipeline, cancel: &CancelToken) -> PipelineReport {
        let start = Instant::now();
        let id = Uuid::new_v4();
        tracing::info!(pipeline = %pipeline.name(), %id, "Starting pipeline");

        let mut state = PipelineState::new();
        let mut records = Vec::with_capacity(pipeline.steps().len());
        let mut artifacts = BTreeMap::new();
        let mut status = PipelineStatus::Succeeded;
        let mut halted_at: Option<usize> = None;

        for (index, step) in pipeline.steps().iter().enumerate() {
            if cancel.is_cancelled() {
                tracing::warn!(pipeline = %pipeline.name(), step = %step.name(), "Pipeline cancelled");
                records.push(StepRecord {
                    outcome: StepOutcome::Failed(PipelineError::Cancelled {
                        step: step.name().to_string(),
                    }),
                    ..StepRecord::skipped(step.name())
                });
                status = failed_status(status, step.name());
                halted_at = Some(index + 1);
                break;
            }

            let (record, fatal) = self.run_step(step, &mut state, &mut artifacts, cancel);
            let is_halt = matches!(record.outcome, StepOutcome::Halted { .. });
            if let StepOutcome::Failed(_) = record.outcome {
                status = failed_status(status, step.name());
            }
            records.push(record);

            if is_halt {
                status = PipelineStatus::Halted {
                    gate: step.name().to_string(),
                };
                halted_at = Some(index + 1);
                break;
            }
            if fatal {
                halted_at = Some(index + 1);
                break;
            }
        }

        if let Some(from) = halted_at {
            for step in &pipeline.steps()[from..] {
                records.push(StepRecord::skipped(step.name()));
            }
        }

        let duration = start.elapsed();
        tracing::info!(pipeline = %pipeline.name(), status = %status, ?duration, "Pipeline finished");
        PipelineReport {
            pipeline: pipeline.name().to_string(),
            id,
            status,
            records,
            artifacts,
            duration,
        }
    }

    /// Runs one step and returns its record plus whether the run must stop.
    fn run_step(
        &self,
        step: &PipelineStep,
        state: &mut PipelineState,
        artifacts: &mut BTreeMap<String, Artifact>,
        cancel: &CancelToken,
    ) -> (StepRecord, bool) {
        let started = Instant::now();
        let plan = match step.build_plan(state) {
            Ok(plan) => plan,
            Err(e) => {
                tracing::error!(step = %step.name(), error = %e, "Plan construction failed");
                let error = PipelineError::Step {
                    step: step.name().to_string(),
                    source: e,
                };
                let fatal = !matches!(step.gate_policy(), GatePolicy::Tolerate);
                return (
                    StepRecord {
                        duration: started.elapsed(),
                        outcome: StepOutcome::Failed(error),
                        ..StepRecord::skipped(step.name())
                    },
                    fatal,
                );
            }
        };
        let argv = elided_argv(&plan);

        match self.executor.execute_with_cancel(&plan, cancel) {
            Ok(result) => {
                // Gates look at successful results only, after capture.
                if let GatePolicy::Gate(predicate) = step.gate_policy() {
                    if let Some(finding) = predicate(&result) {
                        tracing::warn!(step = %step.name(), %finding, "Gate finding");
                        return (
                            StepRecord {
                                name: step.name().to_string(),
                                outcome: StepOutcome::Halted { finding },
                                stderr: result.stderr.clone(),
                                argv,
                                duration: started.elapsed(),
                            },
                            true,
                        );
                    }
                }
                collect_exports(step, &result, artifacts);
                let stderr = result.stderr.clone();
                state.record(step.name(), result);
                (
                    StepRecord {
                        name: step.name().to_string(),
                        outcome: StepOutcome::Succeeded,
                        stderr,
                        argv,
                        duration: started.elapsed(),
                    },
                    false,
                )
            }
            Err(e) => {
                tracing::error!(step = %step.name(), error = %e, "Step failed");
                let stderr = e.stderr().unwrap_or_default().to_string();
                let fatal = !matches!(step.gate_policy(), GatePolicy::Tolerate);
                (
                    StepRecord {
                        name: step.name().to_string(),
                        outcome: StepOutcome::Failed(PipelineError::Step {
                            step: step.name().to_string(),
                            source: e,
                        }),
                        stderr,
                        argv,
                        duration: started.elapsed(),
                    },
                    fatal,
                )
            }
        }
    }
}

/// Keeps the first failing step as the reported one.
fn failed_status(current: PipelineStatus, step: &str) -> PipelineStatus {
    match current {
        PipelineStatus::Succeeded => PipelineStatus::Failed {
            step: step.to_string(),
        },
        other => other,
    }
}

fn elided_argv(plan: &StepPlan) -> String {
    plan.exec_layers()
        .map(|(argv, _)| shell_words::join(argv.iter().map(String::as_str)))
        .collect::<Vec<_>>()
        .join(" && ")
}

fn collect_exports(step: &PipelineStep, result: &StepResult, artifacts: &mut BTreeMap<String, Artifact>) {
    for path in step.exported_paths() {
        let key = format!("{}:{}", step.name(), path);
        if let Some(dir) = result.directory(path) {
            artifacts.insert(key, Artifact::Directory(dir.clone()));
        } else if let Some(file) = result.file(path) {
            artifacts.insert(key, Artifact::File(file.clone()));
        } else {
            tracing::warn!(step = %step.name(), %path, "Exported path was not captured");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::mock::MockRuntime;
    use crate::executor::runtime::ExecOutput;
    use crate::pipeline::definition::PipelineStep;
    use crate::step::secret::StaticSecretStore;
    use crate::step::StepBuilder;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn orchestrator(runtime: Arc<MockRuntime>) -> PipelineOrchestrator {
        PipelineOrchestrator::new(StepExecutor::new(
            runtime,
            Arc::new(StaticSecretStore::new()),
        ))
    }

    fn shell_step(name: &'static str, script: &'static str) -> PipelineStep {
        PipelineStep::new(name, move |_| {
            StepBuilder::new(name)
                .from("alpine:3.20")
                .sh(script)
                .build()
                .map_err(Into::into)
        })
    }

    #[test]
    fn test_sequential_success() {
        let runtime = Arc::new(MockRuntime::new());
        let pipeline = Pipeline::new("deploy")
            .step(shell_step("build", "make"))
            .step(shell_step("push", "make push"));

        let report = orchestrator(runtime).run(&pipeline);

        assert_eq!(report.status, PipelineStatus::Succeeded);
        assert_eq!(report.records.len(), 2);
        assert!(matches!(report.records[0].outcome, StepOutcome::Succeeded));
        assert!(matches!(report.records[1].outcome, StepOutcome::Succeeded));
    }

    #[test]
    fn test_fail_fast_skips_rest() {
        let runtime = Arc::new(MockRuntime::new());
        runtime.script_failure(2, "make: *** error");
        let pipeline = Pipeline::new("deploy")
            .step(shell_step("build", "make"))
            .step(shell_step("push", "make push"));

        let report = orchestrator(runtime).run(&pipeline);

        assert_eq!(
            report.status,
            PipelineStatus::Failed {
                step: "build".to_string()
            }
        );
        assert!(matches!(report.records[0].outcome, StepOutcome::Failed(_)));
        assert!(matches!(report.records[1].outcome, StepOutcome::Skipped));
        assert_eq!(report.records[0].stderr, "make: *** error");
    }

    #[test]
    fn test_tolerate_continues_past_failure() {
        let runtime = Arc::new(MockRuntime::new());
        runtime.script_failure(1, "lint warnings");
        let pipeline = Pipeline::new("deploy")
            .step(shell_step("lint", "lint").tolerate_failure())
            .step(shell_step("build", "make"));

        let report = orchestrator(runtime).run(&pipeline);

        // The tolerated failure still marks the run as failed, but the
        // second step ran.
        assert_eq!(
            report.status,
            PipelineStatus::Failed {
                step: "lint".to_string()
            }
        );
        assert!(matches!(report.records[1].outcome, StepOutcome::Succeeded));
    }

    #[test]
    fn test_gate_halts_on_finding() {
        let runtime = Arc::new(MockRuntime::new());
        runtime.script_exec(ExecOutput {
            exit_code: 0,
            stdout: "CRITICAL: CVE-2024-0001".to_string(),
            stderr: String::new(),
        });
        let pipeline = Pipeline::new("publish")
            .step(
                shell_step("scan", "scan").gate(|result| {
                    result
                        .stdout
                        .contains("CRITICAL")
                        .then(|| "critical vulnerability".to_string())
                }),
            )
            .step(shell_step("push", "push"));

        let report = orchestrator(runtime).run(&pipeline);

        assert_eq!(
            report.status,
            PipelineStatus::Halted {
                gate: "scan".to_string()
            }
        );
        assert!(matches!(
            report.records[0].outcome,
            StepOutcome::Halted { ref finding } if finding == "critical vulnerability"
        ));
        assert!(matches!(report.records[1].outcome, StepOutcome::Skipped));
    }

    #[test]
    fn test_gate_passes_clean_result() {
        let runtime = Arc::new(MockRuntime::new());
        let pipeline = Pipeline::new("publish")
            .step(shell_step("scan", "scan").gate(|_| None))
            .step(shell_step("push", "push"));

        let report = orchestrator(runtime).run(&pipeline);
        assert_eq!(report.status, PipelineStatus::Succeeded);
    }

    #[test]
    fn test_gate_step_failure_is_not_a_finding() {
        let runtime = Arc::new(MockRuntime::new());
        runtime.script_failure(1, "scanner crashed");
        let pipeline = Pipeline::new("publish").step(
            shell_step("scan", "scan").gate(|_| Some("never evaluated".to_string())),
        );

        let report = orchestrator(runtime).run(&pipeline);
        assert_eq!(
            report.status,
            PipelineStatus::Failed {
                step: "scan".to_string()
            }
        );
    }

    #[test]
    fn test_state_wires_outputs_forward() {
        let runtime = Arc::new(MockRuntime::new());
        runtime.script_exec(ExecOutput {
            exit_code: 0,
            stdout: "v1.2.3".to_string(),
            stderr: String::new(),
        });

        let pipeline = Pipeline::new("release")
            .step(shell_step("version", "cat VERSION"))
            .step(PipelineStep::new("tag", |state| {
                let version = state
                    .result("version")
                    .map(|r| r.stdout.trim().to_string())
                    .unwrap_or_default();
                StepBuilder::new("tag")
                    .from("alpine:3.20")
                    .exec(["git", "tag", &version])
                    .build()
                    .map_err(Into::into)
            }));

        let report = orchestrator(Arc::clone(&runtime)).run(&pipeline);

        assert_eq!(report.status, PipelineStatus::Succeeded);
        let execs = runtime.execs();
        assert_eq!(execs.last().unwrap().argv, vec!["git", "tag", "v1.2.3"]);
    }

    #[test]
    fn test_exports_collected_into_report() {
        let runtime = Arc::new(MockRuntime::new());
        runtime.seed_file("/out/app.txt", "artifact");
        let pipeline = Pipeline::new("build").step(
            PipelineStep::new("build", |_| {
                StepBuilder::new("build")
                    .from("alpine:3.20")
                    .sh("make")
                    .expect_file("/out/app.txt")
                    .build()
                    .map_err(Into::into)
            })
            .export("/out/app.txt"),
        );

        let report = orchestrator(runtime).run(&pipeline);

        assert!(report.is_success());
        let Some(Artifact::File(file)) = report.artifact("build:/out/app.txt") else {
            panic!("missing exported artifact");
        };
        assert_eq!(file.contents_utf8(), "artifact");
    }

    #[test]
    fn test_cancellation_between_steps() {
        let runtime = Arc::new(MockRuntime::new());
        let cancel = CancelToken::new();
        cancel.cancel();
        let pipeline = Pipeline::new("deploy").step(shell_step("build", "make"));

        let report = orchestrator(runtime).run_with_cancel(&pipeline, &cancel);

        assert_eq!(
            report.status,
            PipelineStatus::Failed {
                step: "build".to_string()
            }
        );
        assert!(matches!(
            report.records[0].outcome,
            StepOutcome::Failed(PipelineError::Cancelled { .. })
        ));
    }

    #[test]
    fn test_factory_error_fails_step() {
        let runtime = Arc::new(MockRuntime::new());
        let pipeline = Pipeline::new("deploy").step(PipelineStep::new("bad", |_| {
            StepBuilder::new("bad").build().map_err(Into::into)
        }));

        let report = orchestrator(runtime).run(&pipeline);
        assert_eq!(
            report.status,
            PipelineStatus::Failed {
                step: "bad".to_string()
            }
        );
    }
}
