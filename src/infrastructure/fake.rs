//! Scripted in-memory invoker (testing only)
//!
//! Records every command it is asked to run and answers with the outcome of
//! the first matching rule (substring match on the rendered command line).
//! Unmatched commands succeed with empty output.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::ProcessError;
use crate::infrastructure::process::{OutputMode, ProcessCommand, ProcessInvoker, ProcessOutcome};

enum Reply {
    Outcome(ProcessOutcome),
    SpawnFailure,
}

#[derive(Default)]
pub struct FakeInvoker {
    rules: Vec<(String, Reply)>,
    simulate_clones: bool,
    calls: Mutex<Vec<(ProcessCommand, OutputMode)>>,
}

impl FakeInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer commands containing `pattern` with exit `code` and the given stdout
    pub fn on(mut self, pattern: &str, code: i32, stdout: &[&str]) -> Self {
        let outcome = ProcessOutcome {
            exit_code: Some(code),
            stdout_tail: stdout.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        };
        self.rules.push((pattern.to_string(), Reply::Outcome(outcome)));
        self
    }

    /// Answer commands containing `pattern` with a non-zero exit and stderr
    pub fn fail(mut self, pattern: &str, code: i32, stderr: &str) -> Self {
        let outcome = ProcessOutcome {
            exit_code: Some(code),
            stderr_tail: vec![stderr.to_string()],
            ..Default::default()
        };
        self.rules.push((pattern.to_string(), Reply::Outcome(outcome)));
        self
    }

    /// Commands containing `pattern` cannot be started
    pub fn unspawnable(mut self, pattern: &str) -> Self {
        self.rules.push((pattern.to_string(), Reply::SpawnFailure));
        self
    }

    /// Commands containing `pattern` behave as if Ctrl-C arrived mid-run
    pub fn interrupt(mut self, pattern: &str) -> Self {
        self.rules
            .push((pattern.to_string(), Reply::Outcome(ProcessOutcome::interrupted())));
        self
    }

    /// Successful `git clone ... <dest>` creates `<dest>/.git`, an
    /// interrupted one leaves a partial `<dest>` behind
    pub fn simulating_clones(mut self) -> Self {
        self.simulate_clones = true;
        self
    }

    pub fn calls(&self) -> Vec<(ProcessCommand, OutputMode)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn command_lines(&self) -> Vec<String> {
        self.calls().iter().map(|(cmd, _)| cmd.display()).collect()
    }

    pub fn count_matching(&self, pattern: &str) -> usize {
        self.command_lines()
            .iter()
            .filter(|line| line.contains(pattern))
            .count()
    }
}

#[async_trait]
impl ProcessInvoker for FakeInvoker {
    async fn run(
        &self,
        command: &ProcessCommand,
        mode: OutputMode,
    ) -> Result<ProcessOutcome, ProcessError> {
        self.calls.lock().unwrap().push((command.clone(), mode));
        let line = command.display();

        let reply = self
            .rules
            .iter()
            .find(|(pattern, _)| line.contains(pattern.as_str()))
            .map(|(_, reply)| reply);

        let outcome = match reply {
            Some(Reply::SpawnFailure) => {
                return Err(ProcessError::Spawn {
                    program: command.program.clone(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
                })
            }
            Some(Reply::Outcome(outcome)) => outcome.clone(),
            None => ProcessOutcome::exited(Some(0)),
        };

        if self.simulate_clones && command.args.first().map(String::as_str) == Some("clone") {
            if let Some(dest) = command.args.last() {
                let dest = std::path::Path::new(dest);
                if outcome.success() {
                    std::fs::create_dir_all(dest.join(".git")).unwrap();
                } else if outcome.cancelled {
                    std::fs::create_dir_all(dest).unwrap();
                    std::fs::write(dest.join(".partial"), "").unwrap();
                }
            }
        }

        Ok(outcome)
    }
}
