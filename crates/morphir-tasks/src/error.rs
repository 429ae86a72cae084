//! Failure taxonomy for orchestrated work.

use serde::{Deserialize, Serialize};

/// Why a single external command did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CommandFailure {
    /// The process could not be started (binary missing, not executable, bad cwd).
    #[error("failed to spawn {program}: {reason}")]
    Spawn { program: String, reason: String },

    /// The process ran and exited unsuccessfully. `code` is `None` when it was
    /// terminated by a signal.
    #[error("{program} exited with {}", exit_label(.code))]
    Exited { program: String, code: Option<i32> },
}

impl CommandFailure {
    /// Name of the tool that failed.
    pub fn program(&self) -> &str {
        match self {
            CommandFailure::Spawn { program, .. } | CommandFailure::Exited { program, .. } => {
                program
            }
        }
    }

    /// Exit code reported by the tool, if it ran and produced one.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            CommandFailure::Spawn { .. } => None,
            CommandFailure::Exited { code, .. } => *code,
        }
    }
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("code {code}"),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

/// Cause attached to a failed stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "snake_case")]
pub enum FailureCause {
    #[error(transparent)]
    Command(#[from] CommandFailure),

    /// A nested pipeline failed; `stage` is the inner stage that failed.
    #[error("stage '{stage}' failed: {cause}")]
    Nested {
        stage: String,
        cause: Box<FailureCause>,
    },
}

impl FailureCause {
    /// The innermost command failure, following nested pipelines down.
    pub fn root_command(&self) -> &CommandFailure {
        match self {
            FailureCause::Command(failure) => failure,
            FailureCause::Nested { cause, .. } => cause.root_command(),
        }
    }

    /// Stage names from the outermost nested pipeline down to the failing leaf.
    pub fn stage_path(&self) -> Vec<&str> {
        let mut path = Vec::new();
        let mut current = self;
        while let FailureCause::Nested { stage, cause } = current {
            path.push(stage.as_str());
            current = cause;
        }
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exited_display_includes_code() {
        let err = CommandFailure::Exited {
            program: "./mill".to_string(),
            code: Some(2),
        };
        assert_eq!(err.to_string(), "./mill exited with code 2");
        assert_eq!(err.exit_code(), Some(2));
    }

    #[test]
    fn test_signal_exit_has_no_code() {
        let err = CommandFailure::Exited {
            program: "bun".to_string(),
            code: None,
        };
        assert!(err.to_string().contains("terminated by signal"));
        assert_eq!(err.exit_code(), None);
    }

    #[test]
    fn test_spawn_failure_display() {
        let err = CommandFailure::Spawn {
            program: "morphir-elm".to_string(),
            reason: "No such file or directory".to_string(),
        };
        assert!(err.to_string().contains("failed to spawn morphir-elm"));
        assert_eq!(err.program(), "morphir-elm");
        assert_eq!(err.exit_code(), None);
    }

    #[test]
    fn test_nested_cause_reaches_root() {
        let cause = FailureCause::Nested {
            stage: "test-jvm".to_string(),
            cause: Box::new(FailureCause::Nested {
                stage: "jvm-matrix".to_string(),
                cause: Box::new(FailureCause::Command(CommandFailure::Exited {
                    program: "./mill".to_string(),
                    code: Some(1),
                })),
            }),
        };

        assert_eq!(cause.root_command().exit_code(), Some(1));
        assert_eq!(cause.stage_path(), vec!["test-jvm", "jvm-matrix"]);
        assert_eq!(
            cause.to_string(),
            "stage 'test-jvm' failed: stage 'jvm-matrix' failed: ./mill exited with code 1"
        );
    }
}
