//! Morphir Tasks - build orchestration for the Morphir polyglot workspace
//!
//! Provides a task pipeline orchestrator that:
//! - Sequences morphir-elm, mill and bun invocations as named stages
//! - Fans JVM stages out over a Scala version matrix (`SCALA_VERSIONS`)
//! - Skips optional model projects that have no `morphir.json`
//! - Reduces every run to one pass/fail outcome and exit code

pub mod config;
pub mod error;
pub mod fakes;
pub mod gate;
pub mod matrix;
pub mod obs;
pub mod pipeline;
pub mod runner;
pub mod stage;
pub mod tasks;
pub mod telemetry;

// Re-export key types
pub use config::TaskConfig;
pub use error::{CommandFailure, FailureCause};
pub use gate::{ExistenceGate, ProjectDescriptor};
pub use matrix::{ToolchainVersion, VersionSet};
pub use pipeline::{Pipeline, PipelineOutcome, PipelineResult, StageReport, TaskExitCode};
pub use runner::{CommandLine, CommandOutcome, CommandRunner, ProcessRunner};
pub use stage::{FailurePolicy, Stage, StageAction, StageResult};
pub use tasks::{run_task, summary_line, TaskName};
pub use telemetry::init_tracing;
