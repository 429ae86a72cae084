//! The task catalogue.
//!
//! Each task is a function from a resolved [`TaskConfig`] to exactly one
//! [`Pipeline`]. Composite tasks nest other tasks' pipelines as stages.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::{TaskConfig, BUN, EVALUATOR_TESTS_DIR, MILL, MORPHIR_ELM, OUT_DIR};
use crate::matrix::ToolchainVersion;
use crate::obs::task_span;
use crate::pipeline::{Pipeline, PipelineOutcome, PipelineResult};
use crate::runner::{CommandLine, CommandRunner};
use crate::stage::Stage;

/// Named entry points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskName {
    /// bun install
    Setup,

    /// ./mill Alias/run checkfmt
    Lint,

    /// ./mill Alias/run fmt
    Fmt,

    /// rm -rf out/
    Clean,

    /// ./mill mill.idea.GenIdea/idea
    SetupIdea,

    /// morphir-elm make in every model project with a manifest
    BuildElm,

    /// morphir-elm make in the evaluator tests project
    BuildMorphirElm,

    /// Model build, then JVM tests per Scala version
    TestJvm,

    /// All model builds, then runtime JVM tests per Scala version
    TestRuntimeJvm,

    /// JS tests for the primary Scala version
    TestJs,

    /// setup, lint, model build, JVM and JS tests
    CiLocal,
}

impl TaskName {
    pub const ALL: [TaskName; 11] = [
        TaskName::Setup,
        TaskName::Lint,
        TaskName::Fmt,
        TaskName::Clean,
        TaskName::SetupIdea,
        TaskName::BuildElm,
        TaskName::BuildMorphirElm,
        TaskName::TestJvm,
        TaskName::TestRuntimeJvm,
        TaskName::TestJs,
        TaskName::CiLocal,
    ];

    /// Get the task name as a string.
    pub fn name(&self) -> &'static str {
        match self {
            TaskName::Setup => "setup",
            TaskName::Lint => "lint",
            TaskName::Fmt => "fmt",
            TaskName::Clean => "clean",
            TaskName::SetupIdea => "setup-idea",
            TaskName::BuildElm => "build-elm",
            TaskName::BuildMorphirElm => "build-morphir-elm",
            TaskName::TestJvm => "test-jvm",
            TaskName::TestRuntimeJvm => "test-runtime-jvm",
            TaskName::TestJs => "test-js",
            TaskName::CiLocal => "ci-local",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            TaskName::Setup => "Install package dependencies",
            TaskName::Lint => "Check Scala formatting",
            TaskName::Fmt => "Format Scala sources",
            TaskName::Clean => "Remove build output",
            TaskName::SetupIdea => "Generate IntelliJ IDEA project files",
            TaskName::BuildElm => "Build every Morphir Elm project that has a morphir.json",
            TaskName::BuildMorphirElm => "Build the Morphir Elm evaluator tests",
            TaskName::TestJvm => "Run JVM tests for each Scala version",
            TaskName::TestRuntimeJvm => "Run runtime JVM tests for each Scala version",
            TaskName::TestJs => "Run JS compile and tests for the primary Scala version",
            TaskName::CiLocal => "Run the CI sequence locally",
        }
    }

    /// Build this task's pipeline.
    pub fn pipeline(&self, config: &TaskConfig) -> Pipeline {
        match self {
            TaskName::Setup => setup(config),
            TaskName::Lint => lint(config),
            TaskName::Fmt => format(config),
            TaskName::Clean => clean(config),
            TaskName::SetupIdea => setup_idea(config),
            TaskName::BuildElm => build_elm(config),
            TaskName::BuildMorphirElm => build_morphir_elm(config),
            TaskName::TestJvm => test_jvm(config),
            TaskName::TestRuntimeJvm => test_runtime_jvm(config),
            TaskName::TestJs => test_js(config),
            TaskName::CiLocal => ci_local(config),
        }
    }
}

impl fmt::Display for TaskName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Unknown task name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown task: {0}")]
pub struct UnknownTask(pub String);

impl FromStr for TaskName {
    type Err = UnknownTask;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        TaskName::ALL
            .into_iter()
            .find(|task| task.name() == wanted)
            .ok_or_else(|| UnknownTask(s.to_string()))
    }
}

/// Build and run `task` under a task-scoped span.
///
/// The configuration, including every existence gate, is resolved before the
/// first stage runs.
pub async fn run_task(
    task: TaskName,
    config: &TaskConfig,
    runner: &dyn CommandRunner,
) -> PipelineResult {
    let run_id = Uuid::new_v4().to_string();
    let span = task_span(task.name(), &run_id);
    span.in_scope(|| {
        tracing::info!(
            root = %config.root.display(),
            scala_versions = %config.versions,
            "Running task"
        )
    });

    let pipeline = span.in_scope(|| task.pipeline(config));
    pipeline.run(runner).instrument(span).await
}

/// One human-readable line describing how `task` ended.
pub fn summary_line(task: TaskName, result: &PipelineResult) -> String {
    match result.outcome() {
        PipelineOutcome::Succeeded => format!(
            "✓ {task} completed successfully ({} passed, {} skipped, {}ms)",
            result.passed_count(),
            result.skipped_count(),
            result.duration_ms
        ),
        PipelineOutcome::Failed { stage, cause } => {
            let mut path = vec![stage.as_str()];
            path.extend(cause.stage_path());
            format!(
                "✗ {task} failed at stage '{}': {}",
                path.join(" > "),
                cause.root_command()
            )
        }
    }
}

fn mill(config: &TaskConfig) -> CommandLine {
    CommandLine::new(MILL).rooted_at(&config.root)
}

/// `./mill -i -k -j 0 <compile> + <publish> + <test>` for one module family.
fn mill_suite(config: &TaskConfig, version: &ToolchainVersion, platform: &str) -> CommandLine {
    let module = format!("morphir[{version}].__.{platform}");
    mill(config).args(["-i", "-k", "-j", "0"]).args([
        format!("{module}.__.compile"),
        "+".to_string(),
        format!("{module}.publishArtifacts"),
        "+".to_string(),
        format!("{module}.__.test"),
    ])
}

fn morphir_elm_make() -> CommandLine {
    CommandLine::new(MORPHIR_ELM).arg("make")
}

pub fn setup(config: &TaskConfig) -> Pipeline {
    Pipeline::new(TaskName::Setup.name()).stage(Stage::command(
        "install-dependencies",
        CommandLine::new(BUN).arg("install").rooted_at(&config.root),
    ))
}

pub fn lint(config: &TaskConfig) -> Pipeline {
    Pipeline::new(TaskName::Lint.name()).stage(Stage::command(
        "check-format",
        mill(config).args(["Alias/run", "checkfmt"]),
    ))
}

pub fn format(config: &TaskConfig) -> Pipeline {
    Pipeline::new(TaskName::Fmt.name()).stage(Stage::command(
        "format",
        mill(config).args(["Alias/run", "fmt"]),
    ))
}

pub fn clean(config: &TaskConfig) -> Pipeline {
    Pipeline::new(TaskName::Clean.name()).stage(Stage::command(
        "remove-build-output",
        CommandLine::new("rm").args(["-rf", OUT_DIR]).rooted_at(&config.root),
    ))
}

pub fn setup_idea(config: &TaskConfig) -> Pipeline {
    Pipeline::new(TaskName::SetupIdea.name()).stage(Stage::command(
        "generate-idea",
        mill(config).arg("mill.idea.GenIdea/idea"),
    ))
}

pub fn build_elm(config: &TaskConfig) -> Pipeline {
    Pipeline::new(TaskName::BuildElm.name()).stage(Stage::projects(
        "morphir-elm-make",
        config.elm_project_descriptors(),
        |_| morphir_elm_make(),
    ))
}

pub fn build_morphir_elm(config: &TaskConfig) -> Pipeline {
    Pipeline::new(TaskName::BuildMorphirElm.name()).stage(Stage::command(
        "evaluator-tests",
        morphir_elm_make().current_dir(config.resolve(EVALUATOR_TESTS_DIR)),
    ))
}

/// JVM compile, publish and test, once per configured Scala version.
pub fn jvm_tests(config: &TaskConfig) -> Stage {
    let cfg = config.clone();
    Stage::matrix("jvm-tests", config.versions.clone(), move |version| {
        mill_suite(&cfg, version, "jvm")
    })
}

pub fn test_jvm(config: &TaskConfig) -> Pipeline {
    Pipeline::new(TaskName::TestJvm.name())
        .stage(Stage::pipeline(build_morphir_elm(config)))
        .stage(jvm_tests(config))
}

pub fn test_runtime_jvm(config: &TaskConfig) -> Pipeline {
    let cfg = config.clone();
    Pipeline::new(TaskName::TestRuntimeJvm.name())
        .stage(Stage::pipeline(build_elm(config)))
        .stage(Stage::matrix(
            "runtime-jvm-tests",
            config.versions.clone(),
            move |version| mill_suite(&cfg, version, "runtime.jvm"),
        ))
}

pub fn test_js(config: &TaskConfig) -> Pipeline {
    Pipeline::new(TaskName::TestJs.name()).stage(Stage::command(
        "js-tests",
        mill_suite(config, config.versions.primary(), "js"),
    ))
}

/// The CI sequence: setup, lint, gated model builds, JVM matrix, JS suite.
pub fn ci_local(config: &TaskConfig) -> Pipeline {
    Pipeline::new(TaskName::CiLocal.name())
        .stage(Stage::pipeline(setup(config)))
        .stage(Stage::pipeline(lint(config)))
        .stage(Stage::pipeline(build_elm(config)))
        .stage(jvm_tests(config))
        .stage(Stage::pipeline(test_js(config)))
}
