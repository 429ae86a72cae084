//! Morphir Tasks - build task runner
//!
//! The `morphir-tasks` command runs one named build task and exits 0 on
//! success, 1 on failure.
//!
//! ## Commands
//!
//! - `setup`, `lint`, `fmt`, `clean`, `setup-idea`: single tool invocations
//! - `build-elm`, `build-morphir-elm`: Morphir Elm model builds
//! - `test-jvm`, `test-runtime-jvm`, `test-js`: test suites per Scala version
//! - `ci-local`: the CI sequence
//!
//! Set `SCALA_VERSIONS=3.7.4,3.3.4` to run the JVM suites once per version.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::Level;

use morphir_tasks::config::ROOT_ENV;
use morphir_tasks::{
    init_tracing, run_task, summary_line, CommandRunner, PipelineResult, ProcessRunner,
    StageResult, TaskConfig, TaskName,
};

#[derive(Parser)]
#[command(name = "morphir-tasks")]
#[command(author = "Morphir Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Morphir build task runner", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines and a JSON summary
    #[arg(long, global = true)]
    json: bool,

    /// Workspace root
    #[arg(long, global = true, env = ROOT_ENV, default_value = ".")]
    root: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Commands {
    /// Install package dependencies (bun install)
    Setup,

    /// Check Scala formatting
    Lint,

    /// Format Scala sources
    Fmt,

    /// Remove build output
    Clean,

    /// Generate IntelliJ IDEA project files
    SetupIdea,

    /// Build every Morphir Elm project that has a morphir.json
    BuildElm,

    /// Build the Morphir Elm evaluator tests
    BuildMorphirElm,

    /// Run JVM tests for each Scala version
    TestJvm,

    /// Run runtime JVM tests for each Scala version
    TestRuntimeJvm,

    /// Run JS compile and tests for the primary Scala version
    TestJs,

    /// Run the CI sequence locally
    CiLocal,

    /// List available tasks
    List,
}

impl Commands {
    fn task(self) -> Option<TaskName> {
        match self {
            Commands::Setup => Some(TaskName::Setup),
            Commands::Lint => Some(TaskName::Lint),
            Commands::Fmt => Some(TaskName::Fmt),
            Commands::Clean => Some(TaskName::Clean),
            Commands::SetupIdea => Some(TaskName::SetupIdea),
            Commands::BuildElm => Some(TaskName::BuildElm),
            Commands::BuildMorphirElm => Some(TaskName::BuildMorphirElm),
            Commands::TestJvm => Some(TaskName::TestJvm),
            Commands::TestRuntimeJvm => Some(TaskName::TestRuntimeJvm),
            Commands::TestJs => Some(TaskName::TestJs),
            Commands::CiLocal => Some(TaskName::CiLocal),
            Commands::List => None,
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(cli.json, level);

    let Some(task) = cli.command.task() else {
        cmd_list();
        return Ok(ExitCode::SUCCESS);
    };

    let config = TaskConfig::from_env(&cli.root);
    let result = cmd_run(task, &config, &ProcessRunner::new()).await;
    report(task, &result, cli.json)?;

    Ok(result.exit_code().into())
}

/// List the task catalogue
fn cmd_list() {
    for task in TaskName::ALL {
        println!("  {:<18} {}", task.name(), task.description());
    }
}

/// Run one task to completion
async fn cmd_run(
    task: TaskName,
    config: &TaskConfig,
    runner: &dyn CommandRunner,
) -> PipelineResult {
    if !config.root.is_dir() {
        tracing::warn!(root = %config.root.display(), "Workspace root is not a directory");
    }
    run_task(task, config, runner).await
}

/// Print the per-stage listing and the final banner
fn report(task: TaskName, result: &PipelineResult, json: bool) -> Result<()> {
    if json {
        let summary = json!({
            "task": task,
            "outcome": result.outcome(),
            "exit_code": result.exit_code().code(),
            "result": result,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("Failed to serialize summary")?
        );
        return Ok(());
    }

    println!();
    for line in stage_lines(result) {
        println!("{line}");
    }
    println!();
    let banner = summary_line(task, result);
    if result.success() {
        println!("{banner}");
    } else {
        eprintln!("{banner}");
    }
    Ok(())
}

fn stage_lines(result: &PipelineResult) -> Vec<String> {
    result
        .stages
        .iter()
        .map(|stage| {
            let status = match &stage.result {
                StageResult::Succeeded => "✓",
                StageResult::Skipped => "-",
                StageResult::Failed(_) => "✗",
            };
            format!("  {} {} ({}ms)", status, stage.stage_name, stage.duration_ms)
        })
        .collect()
}
