//! Structured progress events for task runs.
//!
//! Every stage transition is emitted as an `info!` event with an `event`
//! field (`stage.started`, `stage.skipped`, ...). With the default formatter
//! these read as progress lines on the console; with `--json` they become
//! newline-delimited JSON.

use std::path::Path;

use tracing::{info, warn};

/// Span covering one task invocation, tagged with the task name and run id.
///
/// # Example
///
/// ```ignore
/// pipeline.run(runner).instrument(task_span("ci-local", &run_id)).await;
/// // every event inside is tagged with task = ci-local
/// ```
pub fn task_span(task: &str, run_id: &str) -> tracing::Span {
    tracing::info_span!("task.run", task = %task, run_id = %run_id)
}

/// Emit event: a stage is about to run.
pub fn emit_stage_started(stage: &str) {
    info!(event = "stage.started", stage = %stage, "Executing stage");
}

/// Emit event: a stage's precondition was false.
pub fn emit_stage_skipped(stage: &str) {
    info!(event = "stage.skipped", stage = %stage, "Skipping stage");
}

/// Emit event: one optional sub-project opted out of a stage.
pub fn emit_project_skipped(stage: &str, dir: &Path) {
    info!(
        event = "project.skipped",
        stage = %stage,
        dir = %dir.display(),
        "Skipping {} (no manifest)",
        dir.display()
    );
}

/// Emit event: one command of a stage is being invoked.
pub fn emit_command_started(stage: &str, command: &dyn std::fmt::Display) {
    info!(event = "command.started", stage = %stage, command = %command);
}

/// Emit event: a stage completed successfully.
pub fn emit_stage_succeeded(stage: &str, duration_ms: u64) {
    info!(
        event = "stage.succeeded",
        stage = %stage,
        duration_ms = duration_ms,
        "Stage succeeded"
    );
}

/// Emit event: a stage failed (warning level).
pub fn emit_stage_failed(stage: &str, duration_ms: u64, error: &dyn std::fmt::Display) {
    warn!(
        event = "stage.failed",
        stage = %stage,
        duration_ms = duration_ms,
        error = %error,
        "Stage failed"
    );
}

/// Emit event: a pipeline finished.
pub fn emit_pipeline_finished(pipeline: &str, duration_ms: u64, stages_run: usize, success: bool) {
    info!(
        event = "pipeline.finished",
        pipeline = %pipeline,
        duration_ms = duration_ms,
        stages_run = stages_run,
        success = success,
    );
}
