//! External command execution.

use crate::error::CommandFailure;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command;
use tracing::debug;

/// Outcome of one external command.
pub type CommandOutcome = Result<(), CommandFailure>;

/// A fully resolved invocation: executable, discrete argument tokens and an
/// optional working directory. Arguments are passed to the process as-is,
/// never through a shell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandLine {
    /// Executable name or path.
    pub program: String,

    /// Argument tokens, one per argv slot.
    pub args: Vec<String>,

    /// Working directory; inherits the caller's when `None`.
    pub cwd: Option<PathBuf>,
}

impl CommandLine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
        }
    }

    /// Append a single argument token.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several argument tokens.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Run the command inside `dir`.
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Resolve the working directory against `root` when it is relative.
    pub fn rooted_at(mut self, root: &Path) -> Self {
        self.cwd = Some(match self.cwd.take() {
            Some(dir) if dir.is_absolute() => dir,
            Some(dir) => root.join(dir),
            None => root.to_path_buf(),
        });
        self
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " {arg:?}")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        if let Some(dir) = &self.cwd {
            write!(f, " (in {})", dir.display())?;
        }
        Ok(())
    }
}

/// Executes external commands on behalf of stages.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `command` to completion.
    async fn run(&self, command: &CommandLine) -> CommandOutcome;
}

/// Runs commands as child processes of the current process.
///
/// Stdout and stderr are inherited, so tool output reaches the operator's
/// console as it is produced.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, command: &CommandLine) -> CommandOutcome {
        if command.program.is_empty() {
            return Err(CommandFailure::Spawn {
                program: String::new(),
                reason: "empty program name".to_string(),
            });
        }

        let start = Instant::now();
        let mut process = Command::new(&command.program);
        process
            .args(&command.args)
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        if let Some(dir) = &command.cwd {
            process.current_dir(dir);
        }

        let status = process
            .status()
            .await
            .map_err(|e| CommandFailure::Spawn {
                program: command.program.clone(),
                reason: e.to_string(),
            })?;

        debug!(
            command = %command,
            exit_code = ?status.code(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Command finished"
        );

        if status.success() {
            Ok(())
        } else {
            Err(CommandFailure::Exited {
                program: command.program.clone(),
                code: status.code(),
            })
        }
    }
}
