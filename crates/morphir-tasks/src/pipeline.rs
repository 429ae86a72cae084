//! Pipeline orchestration and outcome aggregation.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Instant;

use crate::error::FailureCause;
use crate::obs;
use crate::runner::CommandRunner;
use crate::stage::{FailurePolicy, Stage, StageResult};

/// Result of one executed stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageReport {
    /// Stage name.
    pub stage_name: String,

    /// What the stage reported.
    pub result: StageResult,

    /// Duration in milliseconds.
    pub duration_ms: u64,
}

/// Overall verdict of a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PipelineOutcome {
    Succeeded,

    /// Carries the first failed stage and its cause.
    Failed { stage: String, cause: FailureCause },
}

/// Process exit status for a finished task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TaskExitCode {
    Success = 0,
    Failure = 1,
}

impl TaskExitCode {
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl From<TaskExitCode> for std::process::ExitCode {
    fn from(code: TaskExitCode) -> Self {
        std::process::ExitCode::from(code.code())
    }
}

/// Result of a complete pipeline execution.
///
/// Only stages that actually ran appear in `stages`; stages after a
/// fail-fast abort are absent, not recorded as skipped.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    /// Pipeline name.
    pub pipeline: String,

    /// Executed stages in order.
    pub stages: Vec<StageReport>,

    /// When the pipeline started.
    pub started_at: DateTime<Utc>,

    /// Total duration in milliseconds.
    pub duration_ms: u64,
}

impl PipelineResult {
    /// Succeeded iff no executed stage failed.
    pub fn outcome(&self) -> PipelineOutcome {
        let first_failure = self
            .stages
            .iter()
            .find_map(|s| s.result.cause().map(|cause| (s, cause)));

        match first_failure {
            Some((report, cause)) => PipelineOutcome::Failed {
                stage: report.stage_name.clone(),
                cause: cause.clone(),
            },
            None => PipelineOutcome::Succeeded,
        }
    }

    /// Whether every executed stage succeeded or skipped.
    pub fn success(&self) -> bool {
        self.failed_stage().is_none()
    }

    /// First stage that failed, if any.
    pub fn failed_stage(&self) -> Option<&StageReport> {
        self.stages.iter().find(|s| s.result.is_failed())
    }

    pub fn exit_code(&self) -> TaskExitCode {
        if self.success() {
            TaskExitCode::Success
        } else {
            TaskExitCode::Failure
        }
    }

    /// Number of stages that succeeded.
    pub fn passed_count(&self) -> usize {
        self.stages
            .iter()
            .filter(|s| s.result == StageResult::Succeeded)
            .count()
    }

    /// Number of stages that skipped themselves.
    pub fn skipped_count(&self) -> usize {
        self.stages.iter().filter(|s| s.result.is_skipped()).count()
    }

    /// Number of stages that failed.
    pub fn failed_count(&self) -> usize {
        self.stages.iter().filter(|s| s.result.is_failed()).count()
    }
}

/// An ordered sequence of stages composing one task.
#[derive(Debug)]
pub struct Pipeline {
    name: String,
    stages: Vec<Stage>,
}

impl Pipeline {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
        }
    }

    /// Append a stage.
    pub fn stage(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Execute the stages strictly in order.
    ///
    /// A failed stage with the default fail-fast policy stops the pipeline.
    /// A failed `continue_on_failure` stage is recorded and execution moves
    /// on; the outcome is still failed.
    pub async fn run(&self, runner: &dyn CommandRunner) -> PipelineResult {
        let started_at = Utc::now();
        let start = Instant::now();
        let mut reports = Vec::with_capacity(self.stages.len());

        for stage in &self.stages {
            let stage_start = Instant::now();
            let result = stage.execute(runner).await;
            let abort = result.is_failed() && stage.policy() == FailurePolicy::FailFast;

            reports.push(StageReport {
                stage_name: stage.name().to_string(),
                result,
                duration_ms: stage_start.elapsed().as_millis() as u64,
            });

            if abort {
                break;
            }
        }

        let result = PipelineResult {
            pipeline: self.name.clone(),
            stages: reports,
            started_at,
            duration_ms: start.elapsed().as_millis() as u64,
        };
        obs::emit_pipeline_finished(
            &self.name,
            result.duration_ms,
            result.stages.len(),
            result.success(),
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CommandFailure;
    use crate::fakes::RecordingRunner;
    use crate::runner::CommandLine;

    fn step(name: &str) -> Stage {
        Stage::command(name, CommandLine::new(name))
    }

    fn report(name: &str, result: StageResult) -> StageReport {
        StageReport {
            stage_name: name.to_string(),
            result,
            duration_ms: 1,
        }
    }

    fn exited(program: &str, code: i32) -> FailureCause {
        FailureCause::Command(CommandFailure::Exited {
            program: program.to_string(),
            code: Some(code),
        })
    }

    #[test]
    fn test_pipeline_result_counts() {
        let result = PipelineResult {
            pipeline: "ci-local".to_string(),
            stages: vec![
                report("setup", StageResult::Succeeded),
                report("build-elm", StageResult::Skipped),
                report("lint", StageResult::Failed(exited("./mill", 1))),
            ],
            started_at: Utc::now(),
            duration_ms: 3,
        };

        assert_eq!(result.passed_count(), 1);
        assert_eq!(result.skipped_count(), 1);
        assert_eq!(result.failed_count(), 1);
        assert!(!result.success());
        assert_eq!(result.exit_code(), TaskExitCode::Failure);
        assert_eq!(result.exit_code().code(), 1);
    }

    #[test]
    fn test_outcome_carries_first_failure() {
        let result = PipelineResult {
            pipeline: "p".to_string(),
            stages: vec![
                report("a", StageResult::Failed(exited("one", 1))),
                report("b", StageResult::Failed(exited("two", 2))),
            ],
            started_at: Utc::now(),
            duration_ms: 2,
        };

        assert_eq!(
            result.outcome(),
            PipelineOutcome::Failed {
                stage: "a".to_string(),
                cause: exited("one", 1),
            }
        );
    }

    #[tokio::test]
    async fn test_fail_fast_stops_pipeline() {
        let runner = RecordingRunner::new().fail_on("s2", 1);
        let pipeline = Pipeline::new("p").stage(step("s1")).stage(step("s2")).stage(step("s3"));

        let result = pipeline.run(&runner).await;

        let names: Vec<&str> = result.stages.iter().map(|s| s.stage_name.as_str()).collect();
        assert_eq!(names, vec!["s1", "s2"], "s3 must be absent, not skipped");
        assert_eq!(result.stages[0].result, StageResult::Succeeded);
        assert!(result.stages[1].result.is_failed());
        assert!(!result.success());
        assert_eq!(result.exit_code(), TaskExitCode::Failure);
        assert_eq!(runner.call_count(), 2);
    }

    #[tokio::test]
    async fn test_skipped_then_succeeded_is_success() {
        let runner = RecordingRunner::new();
        let pipeline = Pipeline::new("p")
            .stage(step("s1").skip_unless(false))
            .stage(step("s2"));

        let result = pipeline.run(&runner).await;

        assert_eq!(result.stages[0].result, StageResult::Skipped);
        assert_eq!(result.stages[1].result, StageResult::Succeeded);
        assert_eq!(result.outcome(), PipelineOutcome::Succeeded);
        assert_eq!(result.exit_code(), TaskExitCode::Success);
        assert_eq!(runner.call_count(), 1);
    }

    #[tokio::test]
    async fn test_continue_on_failure_runs_later_stages() {
        let runner = RecordingRunner::new().fail_on("s1", 7);
        let pipeline = Pipeline::new("p")
            .stage(step("s1").continue_on_failure())
            .stage(step("s2"));

        let result = pipeline.run(&runner).await;

        assert_eq!(result.stages.len(), 2);
        assert_eq!(result.stages[1].result, StageResult::Succeeded);
        match result.outcome() {
            PipelineOutcome::Failed { stage, cause } => {
                assert_eq!(stage, "s1");
                assert_eq!(cause.root_command().exit_code(), Some(7));
            }
            PipelineOutcome::Succeeded => panic!("pipeline should fail"),
        }
    }

    #[tokio::test]
    async fn test_empty_pipeline_succeeds() {
        let runner = RecordingRunner::new();
        let result = Pipeline::new("empty").run(&runner).await;
        assert!(result.success());
        assert!(result.stages.is_empty());
    }

    #[tokio::test]
    async fn test_nested_pipeline_as_stage() {
        let runner = RecordingRunner::new().fail_on("inner-b", 1);
        let inner = Pipeline::new("inner")
            .stage(step("inner-a"))
            .stage(step("inner-b"));
        let outer = Pipeline::new("outer")
            .stage(Stage::pipeline(inner))
            .stage(step("after"));

        let result = outer.run(&runner).await;

        assert_eq!(result.stages.len(), 1);
        let failed = result.failed_stage().unwrap();
        assert_eq!(failed.stage_name, "inner");
        assert_eq!(failed.result.cause().unwrap().stage_path(), vec!["inner-b"]);
        assert_eq!(runner.call_count(), 2);
    }

    #[test]
    fn test_exit_code_conversion() {
        let _: std::process::ExitCode = TaskExitCode::Success.into();
        assert_eq!(TaskExitCode::Success.code(), 0);
        assert_eq!(TaskExitCode::Failure.code(), 1);
    }
}
