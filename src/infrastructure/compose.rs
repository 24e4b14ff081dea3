//! docker compose invocation
//!
//! Argument shape, always in this order:
//!
//! ```text
//! docker compose -f <base> [-f <override>] [--profile <p>] <verb> <verb flags> [services]
//! ```

use std::sync::Arc;

use crate::config::LayeredComposeSet;
use crate::error::{ProcessError, UsageError};
use crate::infrastructure::process::{OutputMode, ProcessCommand, ProcessInvoker, ProcessOutcome};
use crate::tools::{get_tool_path, tools};

/// A compose subcommand with its verb-specific flags
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComposeVerb {
    Up { detach: bool, build: bool },
    Down { volumes: bool, remove_orphans: bool },
    Restart,
    Ps,
    /// `ps --format json`, captured for the status table
    PsJson,
    Logs { follow: bool, tail: Option<u32> },
    Build { no_cache: bool },
    Pull,
    Exec { command: Vec<String>, tty: bool },
    Shell { shell: String, tty: bool },
    /// Passed through verbatim after the file flags
    Raw { args: Vec<String> },
}

impl ComposeVerb {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Up { .. } => "up",
            Self::Down { .. } => "down",
            Self::Restart => "restart",
            Self::Ps | Self::PsJson => "ps",
            Self::Logs { .. } => "logs",
            Self::Build { .. } => "build",
            Self::Pull => "pull",
            Self::Exec { .. } => "exec",
            Self::Shell { .. } => "shell",
            Self::Raw { .. } => "compose",
        }
    }

    /// Verbs that attach to exactly one container
    pub fn is_interactive(&self) -> bool {
        matches!(self, Self::Exec { .. } | Self::Shell { .. })
    }

    /// `exec` and `shell` take exactly one service, the rest any number
    pub fn check_targets(&self, services: &[String]) -> Result<(), UsageError> {
        if self.is_interactive() && services.len() != 1 {
            return Err(UsageError::SingleTargetRequired {
                verb: self.name().to_string(),
                count: services.len(),
            });
        }
        Ok(())
    }

    pub fn output_mode(&self) -> OutputMode {
        match self {
            Self::PsJson => OutputMode::Capture,
            _ => OutputMode::Stream,
        }
    }

    /// Verb, flags and targets as compose expects them
    pub fn args(&self, services: &[String]) -> Vec<String> {
        let mut args: Vec<String> = Vec::new();
        let mut push = |s: &str| args.push(s.to_string());

        match self {
            Self::Up { detach, build } => {
                push("up");
                if *detach {
                    push("-d");
                }
                if *build {
                    push("--build");
                }
            }
            Self::Down {
                volumes,
                remove_orphans,
            } => {
                push("down");
                if *volumes {
                    push("--volumes");
                }
                if *remove_orphans {
                    push("--remove-orphans");
                }
            }
            Self::Restart => push("restart"),
            Self::Ps => push("ps"),
            Self::PsJson => {
                push("ps");
                push("--format");
                push("json");
            }
            Self::Logs { follow, tail } => {
                push("logs");
                if *follow {
                    push("-f");
                }
                if let Some(tail) = tail {
                    push("--tail");
                    push(&tail.to_string());
                }
            }
            Self::Build { no_cache } => {
                push("build");
                if *no_cache {
                    push("--no-cache");
                }
            }
            Self::Pull => push("pull"),
            Self::Exec { command, tty } => {
                push("exec");
                if !*tty {
                    push("-T");
                }
                args.extend(services.iter().cloned());
                args.extend(command.iter().cloned());
                return args;
            }
            Self::Shell { shell, tty } => {
                push("exec");
                if !*tty {
                    push("-T");
                }
                args.extend(services.iter().cloned());
                args.push(shell.clone());
                return args;
            }
            Self::Raw { args: raw } => {
                args.extend(raw.iter().cloned());
                return args;
            }
        }

        args.extend(services.iter().cloned());
        args
    }
}

/// docker compose bound to one layered file set
#[derive(Clone)]
pub struct ComposeClient {
    invoker: Arc<dyn ProcessInvoker>,
    docker: String,
    files: LayeredComposeSet,
}

impl ComposeClient {
    pub fn new(invoker: Arc<dyn ProcessInvoker>, files: LayeredComposeSet) -> Self {
        Self {
            invoker,
            docker: get_tool_path(tools::DOCKER),
            files,
        }
    }

    /// Full command line for `verb` on `services`
    pub fn command(&self, verb: &ComposeVerb, services: &[String]) -> ProcessCommand {
        let mut cmd = ProcessCommand::new(&self.docker).arg("compose");
        for file in self.files.files() {
            cmd = cmd.arg("-f").arg(file.to_string_lossy());
        }
        if let Some(profile) = self.files.profile() {
            cmd = cmd.args(["--profile", profile]);
        }
        cmd.args(verb.args(services))
    }

    pub async fn run(
        &self,
        verb: &ComposeVerb,
        services: &[String],
    ) -> Result<ProcessOutcome, ProcessError> {
        let cmd = self.command(verb, services);
        self.invoker.run(&cmd, verb.output_mode()).await
    }
}

/// `docker compose version`, used by preflight checks
pub async fn compose_version(
    invoker: &dyn ProcessInvoker,
) -> Result<Option<String>, ProcessError> {
    let cmd = ProcessCommand::new(get_tool_path(tools::DOCKER)).args(["compose", "version"]);
    let outcome = invoker.run(&cmd, OutputMode::Capture).await?;
    Ok(outcome
        .success()
        .then(|| outcome.stdout_text().trim().to_string()))
}
