//! In-memory command runner (testing only)
//!
//! `RecordingRunner` never spawns a process. It records every command it is
//! asked to run, in order, and fails the ones matching a configured rule.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::CommandFailure;
use crate::runner::{CommandLine, CommandOutcome, CommandRunner};

type FailRule = Box<dyn Fn(&CommandLine) -> bool + Send + Sync>;

/// Records invocations instead of executing them.
#[derive(Default)]
pub struct RecordingRunner {
    calls: Mutex<Vec<CommandLine>>,
    fail_rules: Vec<(FailRule, i32)>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every command matching `rule` with `exit_code`.
    pub fn fail_when<F>(mut self, rule: F, exit_code: i32) -> Self
    where
        F: Fn(&CommandLine) -> bool + Send + Sync + 'static,
    {
        self.fail_rules.push((Box::new(rule), exit_code));
        self
    }

    /// Fail every command whose program or any argument contains `needle`.
    pub fn fail_on(self, needle: &str, exit_code: i32) -> Self {
        let needle = needle.to_string();
        self.fail_when(
            move |cmd| cmd.program.contains(&needle) || cmd.args.iter().any(|a| a.contains(&needle)),
            exit_code,
        )
    }

    /// Commands run so far, in invocation order.
    pub fn calls(&self) -> Vec<CommandLine> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of commands run so far.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Number of recorded commands matching `predicate`.
    pub fn count_matching<F>(&self, predicate: F) -> usize
    where
        F: Fn(&CommandLine) -> bool,
    {
        self.calls.lock().unwrap().iter().filter(|c| predicate(c)).count()
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(&self, command: &CommandLine) -> CommandOutcome {
        self.calls.lock().unwrap().push(command.clone());

        match self.fail_rules.iter().find(|(rule, _)| rule(command)) {
            Some((_, code)) => Err(CommandFailure::Exited {
                program: command.program.clone(),
                code: Some(*code),
            }),
            None => Ok(()),
        }
    }
}
