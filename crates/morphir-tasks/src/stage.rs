//! Stage definitions and execution.

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::error::FailureCause;
use crate::gate::ProjectDescriptor;
use crate::matrix::{ToolchainVersion, VersionSet};
use crate::obs;
use crate::pipeline::{Pipeline, PipelineOutcome};
use crate::runner::{CommandLine, CommandRunner};

/// Builds the command for one matrix version.
pub type VersionTemplate = Arc<dyn Fn(&ToolchainVersion) -> CommandLine + Send + Sync>;

/// Builds the command for one participating sub-project directory.
pub type ProjectTemplate = Arc<dyn Fn(&Path) -> CommandLine + Send + Sync>;

/// Outcome of one stage, however many commands it ran.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "cause", rename_all = "snake_case")]
pub enum StageResult {
    Skipped,
    Succeeded,
    Failed(FailureCause),
}

impl StageResult {
    /// Succeeded or Skipped.
    pub fn passed(&self) -> bool {
        !self.is_failed()
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, StageResult::Failed(_))
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, StageResult::Skipped)
    }

    pub fn cause(&self) -> Option<&FailureCause> {
        match self {
            StageResult::Failed(cause) => Some(cause),
            _ => None,
        }
    }
}

/// What the enclosing pipeline does after this stage fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Abort the pipeline; later stages never run.
    #[default]
    FailFast,

    /// Record the failure and keep going.
    Continue,
}

/// The work a stage performs.
pub enum StageAction {
    /// One fixed command.
    Command(CommandLine),

    /// One command per version, sequentially, in set order.
    Matrix {
        versions: VersionSet,
        template: VersionTemplate,
    },

    /// One command per participating sub-project, run inside its directory.
    Projects {
        projects: Vec<ProjectDescriptor>,
        template: ProjectTemplate,
    },

    /// A whole nested pipeline.
    Pipeline(Pipeline),
}

impl StageAction {
    fn kind(&self) -> &'static str {
        match self {
            StageAction::Command(_) => "command",
            StageAction::Matrix { .. } => "matrix",
            StageAction::Projects { .. } => "projects",
            StageAction::Pipeline(_) => "pipeline",
        }
    }
}

/// A named unit of orchestrated work.
pub struct Stage {
    name: String,
    action: StageAction,
    enabled: bool,
    policy: FailurePolicy,
}

impl Stage {
    /// Create a stage from an explicit action.
    pub fn new(name: impl Into<String>, action: StageAction) -> Self {
        Self {
            name: name.into(),
            action,
            enabled: true,
            policy: FailurePolicy::FailFast,
        }
    }

    /// A stage running one fixed command.
    pub fn command(name: impl Into<String>, command: CommandLine) -> Self {
        Self::new(name, StageAction::Command(command))
    }

    /// A stage fanned out over `versions`.
    pub fn matrix<F>(name: impl Into<String>, versions: VersionSet, template: F) -> Self
    where
        F: Fn(&ToolchainVersion) -> CommandLine + Send + Sync + 'static,
    {
        Self::new(
            name,
            StageAction::Matrix {
                versions,
                template: Arc::new(template),
            },
        )
    }

    /// A stage over individually gated sub-projects.
    pub fn projects<F>(
        name: impl Into<String>,
        projects: Vec<ProjectDescriptor>,
        template: F,
    ) -> Self
    where
        F: Fn(&Path) -> CommandLine + Send + Sync + 'static,
    {
        Self::new(
            name,
            StageAction::Projects {
                projects,
                template: Arc::new(template),
            },
        )
    }

    /// A stage wrapping another task's pipeline. Takes the pipeline's name.
    pub fn pipeline(pipeline: Pipeline) -> Self {
        Self::new(pipeline.name().to_string(), StageAction::Pipeline(pipeline))
    }

    /// Skip this stage, without failing, unless `condition` holds.
    pub fn skip_unless(mut self, condition: bool) -> Self {
        self.enabled = self.enabled && condition;
        self
    }

    /// Let the pipeline continue past a failure of this stage.
    pub fn continue_on_failure(mut self) -> Self {
        self.policy = FailurePolicy::Continue;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    pub fn action(&self) -> &StageAction {
        &self.action
    }

    /// Run the stage and report its single result.
    pub fn execute<'a>(&'a self, runner: &'a dyn CommandRunner) -> BoxFuture<'a, StageResult> {
        Box::pin(async move {
            if !self.enabled {
                obs::emit_stage_skipped(&self.name);
                return StageResult::Skipped;
            }

            obs::emit_stage_started(&self.name);
            let start = Instant::now();

            let result = match self.run_action(runner).await {
                Ok(()) => StageResult::Succeeded,
                Err(cause) => StageResult::Failed(cause),
            };

            let duration_ms = start.elapsed().as_millis() as u64;
            match &result {
                StageResult::Failed(cause) => obs::emit_stage_failed(&self.name, duration_ms, cause),
                _ => obs::emit_stage_succeeded(&self.name, duration_ms),
            }
            result
        })
    }

    async fn run_action(&self, runner: &dyn CommandRunner) -> Result<(), FailureCause> {
        match &self.action {
            StageAction::Command(command) => self.invoke(runner, command).await,
            StageAction::Matrix { versions, template } => {
                for version in versions {
                    self.invoke(runner, &template(version)).await?;
                }
                Ok(())
            }
            StageAction::Projects { projects, template } => {
                for project in projects {
                    if !project.participates {
                        obs::emit_project_skipped(&self.name, &project.dir);
                        continue;
                    }
                    let command = template(&project.dir).current_dir(&project.dir);
                    self.invoke(runner, &command).await?;
                }
                Ok(())
            }
            StageAction::Pipeline(pipeline) => match pipeline.run(runner).await.outcome() {
                PipelineOutcome::Succeeded => Ok(()),
                PipelineOutcome::Failed { stage, cause } => Err(FailureCause::Nested {
                    stage,
                    cause: Box::new(cause),
                }),
            },
        }
    }

    async fn invoke(&self, runner: &dyn CommandRunner, command: &CommandLine) -> Result<(), FailureCause> {
        obs::emit_command_started(&self.name, command);
        runner.run(command).await.map_err(FailureCause::from)
    }
}

impl fmt::Debug for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stage")
            .field("name", &self.name)
            .field("action", &self.action.kind())
            .field("enabled", &self.enabled)
            .field("policy", &self.policy)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CommandFailure;
    use crate::fakes::RecordingRunner;
    use std::path::PathBuf;

    fn echo(version: &ToolchainVersion) -> CommandLine {
        CommandLine::new("build").arg(version.as_str())
    }

    #[tokio::test]
    async fn test_command_stage_succeeds() {
        let runner = RecordingRunner::new();
        let stage = Stage::command("setup", CommandLine::new("bun").arg("install"));

        assert_eq!(stage.execute(&runner).await, StageResult::Succeeded);
        assert_eq!(runner.call_count(), 1);
    }

    #[tokio::test]
    async fn test_command_stage_reports_cause() {
        let runner = RecordingRunner::new().fail_on("checkfmt", 1);
        let stage = Stage::command("lint", CommandLine::new("./mill").args(["Alias/run", "checkfmt"]));

        let result = stage.execute(&runner).await;
        assert_eq!(
            result,
            StageResult::Failed(FailureCause::Command(CommandFailure::Exited {
                program: "./mill".to_string(),
                code: Some(1),
            }))
        );
    }

    #[tokio::test]
    async fn test_matrix_runs_in_version_order() {
        let runner = RecordingRunner::new();
        let versions = VersionSet::resolve(Some("A,B,C"), "A");
        let stage = Stage::matrix("jvm", versions, echo);

        assert_eq!(stage.execute(&runner).await, StageResult::Succeeded);
        let order: Vec<String> = runner.calls().into_iter().map(|c| c.args[0].clone()).collect();
        assert_eq!(order, vec!["A", "B", "C"]);
    }

    #[tokio::test]
    async fn test_matrix_stops_at_first_failure() {
        let runner = RecordingRunner::new().fail_when(|c| c.args == ["A"], 1);
        let versions = VersionSet::resolve(Some("A,B"), "A");
        let stage = Stage::matrix("jvm", versions, echo);

        let result = stage.execute(&runner).await;
        assert!(result.is_failed());
        assert_eq!(runner.call_count(), 1, "version B must never be invoked");
    }

    #[tokio::test]
    async fn test_matrix_failure_on_later_version() {
        let runner = RecordingRunner::new().fail_when(|c| c.args == ["B"], 4);
        let versions = VersionSet::resolve(Some("A,B,C"), "A");
        let stage = Stage::matrix("jvm", versions, echo);

        let result = stage.execute(&runner).await;
        assert_eq!(result.cause().unwrap().root_command().exit_code(), Some(4));
        assert_eq!(runner.call_count(), 2);
    }

    #[tokio::test]
    async fn test_projects_skip_absent_and_run_present() {
        let runner = RecordingRunner::new();
        let projects = vec![
            ProjectDescriptor::new("present", true),
            ProjectDescriptor::new("absent", false),
        ];
        let stage = Stage::projects("build-elm", projects, |_| {
            CommandLine::new("morphir-elm").arg("make")
        });

        assert_eq!(stage.execute(&runner).await, StageResult::Succeeded);
        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].cwd, Some(PathBuf::from("present")));
    }

    #[tokio::test]
    async fn test_projects_all_skipped_is_success() {
        let runner = RecordingRunner::new();
        let projects = vec![
            ProjectDescriptor::new("a", false),
            ProjectDescriptor::new("b", false),
        ];
        let stage = Stage::projects("build-elm", projects, |_| CommandLine::new("morphir-elm"));

        assert_eq!(stage.execute(&runner).await, StageResult::Succeeded);
        assert_eq!(runner.call_count(), 0);
    }

    #[tokio::test]
    async fn test_projects_failure_stops_remaining() {
        let runner = RecordingRunner::new().fail_when(
            |c| c.cwd.as_deref() == Some(Path::new("first")),
            2,
        );
        let projects = vec![
            ProjectDescriptor::new("first", true),
            ProjectDescriptor::new("second", true),
        ];
        let stage = Stage::projects("build-elm", projects, |_| CommandLine::new("morphir-elm"));

        assert!(stage.execute(&runner).await.is_failed());
        assert_eq!(runner.call_count(), 1);
    }

    #[tokio::test]
    async fn test_skip_unless_false_runs_nothing() {
        let runner = RecordingRunner::new();
        let stage = Stage::command("optional", CommandLine::new("false")).skip_unless(false);

        let result = stage.execute(&runner).await;
        assert!(result.is_skipped());
        assert!(result.passed());
        assert_eq!(runner.call_count(), 0);
    }

    #[tokio::test]
    async fn test_nested_pipeline_failure_names_inner_stage() {
        let runner = RecordingRunner::new().fail_on("checkfmt", 1);
        let inner = Pipeline::new("lint").stage(Stage::command(
            "checkfmt",
            CommandLine::new("./mill").args(["Alias/run", "checkfmt"]),
        ));
        let stage = Stage::pipeline(inner);
        assert_eq!(stage.name(), "lint");

        let result = stage.execute(&runner).await;
        let cause = result.cause().expect("stage should fail");
        assert_eq!(cause.stage_path(), vec!["checkfmt"]);
        assert_eq!(cause.root_command().program(), "./mill");
    }

    #[test]
    fn test_stage_builders() {
        let stage = Stage::command("x", CommandLine::new("true")).continue_on_failure();
        assert_eq!(stage.policy(), FailurePolicy::Continue);
        assert!(matches!(stage.action(), StageAction::Command(_)));
        assert!(format!("{stage:?}").contains("command"));
    }

    #[test]
    fn test_stage_result_serializes_with_status_tag() {
        let json = serde_json::to_value(StageResult::Skipped).unwrap();
        assert_eq!(json["status"], "skipped");

        let failed = StageResult::Failed(FailureCause::Command(CommandFailure::Exited {
            program: "bun".to_string(),
            code: Some(1),
        }));
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["cause"]["command"]["code"], 1);
    }
}
