//! Subprocess execution boundary
//!
//! Every call to docker, git, nix or a service-local build tool goes through
//! [`ProcessInvoker`]. Two modes exist:
//!
//! - [`OutputMode::Stream`]: stdio is inherited, output goes straight to the
//!   terminal (`logs --follow`, `shell`, `exec`). Nothing is captured.
//! - [`OutputMode::Capture`]: stdout/stderr are piped and only the last
//!   `tail_lines` lines of each are kept, so long image builds cannot grow
//!   memory without bound.
//!
//! A non-zero exit code is reported in [`ProcessOutcome`], never as an error.
//! Only a failure to start the program at all is a [`ProcessError`].
//! Both modes stop the child when the operator hits Ctrl-C.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use crate::error::ProcessError;

/// Lines kept per stream in capture mode
pub const DEFAULT_TAIL_LINES: usize = 200;

/// A program invocation: program, arguments, working directory, extra env
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessCommand {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    pub env: Vec<(String, String)>,
}

impl ProcessCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            env: Vec::new(),
        }
    }

    /// Run `script` through `sh -c`
    pub fn shell(sh: impl Into<String>, script: impl Into<String>) -> Self {
        Self::new(sh).arg("-c").arg(script)
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Shell-like rendering for logs (`docker compose -f a.yml up -d`)
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Stream,
    Capture,
}

/// Result of a finished (or interrupted) process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutcome {
    /// `None` when the process was killed by a signal
    pub exit_code: Option<i32>,
    pub stdout_tail: Vec<String>,
    pub stderr_tail: Vec<String>,
    /// Set when the operator interrupted the run
    pub cancelled: bool,
}

impl ProcessOutcome {
    pub fn exited(code: Option<i32>) -> Self {
        Self {
            exit_code: code,
            ..Default::default()
        }
    }

    pub fn interrupted() -> Self {
        Self {
            exit_code: None,
            cancelled: true,
            ..Default::default()
        }
    }

    pub fn success(&self) -> bool {
        !self.cancelled && self.exit_code == Some(0)
    }

    pub fn stdout_text(&self) -> String {
        self.stdout_tail.join("\n")
    }

    pub fn stderr_text(&self) -> String {
        self.stderr_tail.join("\n")
    }

    /// Last `n` lines across both streams, stderr last
    pub fn last_lines(&self, n: usize) -> Vec<String> {
        let all: Vec<&String> = self.stdout_tail.iter().chain(&self.stderr_tail).collect();
        let skip = all.len().saturating_sub(n);
        all.into_iter().skip(skip).cloned().collect()
    }
}

/// Fixed-capacity line buffer keeping only the most recent lines
#[derive(Debug)]
pub struct TailBuffer {
    lines: VecDeque<String>,
    capacity: usize,
}

impl TailBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    pub fn push(&mut self, line: String) {
        if self.capacity == 0 {
            return;
        }
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }

    pub fn into_vec(self) -> Vec<String> {
        self.lines.into()
    }
}

/// The one capability every component uses to run external programs
#[async_trait]
pub trait ProcessInvoker: Send + Sync {
    async fn run(
        &self,
        command: &ProcessCommand,
        mode: OutputMode,
    ) -> Result<ProcessOutcome, ProcessError>;
}

/// Runs real processes with tokio
#[derive(Debug, Clone)]
pub struct SystemInvoker {
    tail_lines: usize,
}

impl Default for SystemInvoker {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemInvoker {
    pub fn new() -> Self {
        Self {
            tail_lines: DEFAULT_TAIL_LINES,
        }
    }

    pub fn with_tail_lines(mut self, lines: usize) -> Self {
        self.tail_lines = lines;
        self
    }

    fn prepare(command: &ProcessCommand) -> Command {
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args).kill_on_drop(true);
        if let Some(ref dir) = command.working_dir {
            cmd.current_dir(dir);
        }
        for (key, value) in &command.env {
            cmd.env(key, value);
        }
        cmd
    }

    async fn run_streamed(&self, command: &ProcessCommand) -> Result<ProcessOutcome, ProcessError> {
        let mut cmd = Self::prepare(command);
        cmd.stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        let mut child = cmd.spawn().map_err(|source| ProcessError::Spawn {
            program: command.program.clone(),
            source,
        })?;

        let status = tokio::select! {
            status = child.wait() => Some(status),
            Ok(()) = tokio::signal::ctrl_c() => None,
        };

        match status {
            Some(status) => {
                let status = status.map_err(|source| ProcessError::Io {
                    program: command.program.clone(),
                    source,
                })?;
                Ok(ProcessOutcome::exited(status.code()))
            }
            None => {
                warn!("Interrupted, stopping `{}`", command.program);
                terminate(&mut child).await;
                Ok(ProcessOutcome::interrupted())
            }
        }
    }

    async fn run_captured(&self, command: &ProcessCommand) -> Result<ProcessOutcome, ProcessError> {
        let mut cmd = Self::prepare(command);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|source| ProcessError::Spawn {
            program: command.program.clone(),
            source,
        })?;

        let io_err = |source| ProcessError::Io {
            program: command.program.clone(),
            source,
        };
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let tail = self.tail_lines;
        let label = command.program.as_str();

        let finished = tokio::select! {
            result = async {
                let (out, err) = tokio::join!(
                    read_tail(stdout, tail, label),
                    read_tail(stderr, tail, label)
                );
                let status = child.wait().await;
                (out, err, status)
            } => Some(result),
            Ok(()) = tokio::signal::ctrl_c() => None,
        };

        match finished {
            Some((out, err, status)) => {
                let status = status.map_err(io_err)?;
                Ok(ProcessOutcome {
                    exit_code: status.code(),
                    stdout_tail: out.map_err(io_err)?,
                    stderr_tail: err.map_err(io_err)?,
                    cancelled: false,
                })
            }
            None => {
                warn!("Interrupted, stopping `{}`", command.program);
                terminate(&mut child).await;
                Ok(ProcessOutcome::interrupted())
            }
        }
    }
}

#[async_trait]
impl ProcessInvoker for SystemInvoker {
    async fn run(
        &self,
        command: &ProcessCommand,
        mode: OutputMode,
    ) -> Result<ProcessOutcome, ProcessError> {
        debug!("$ {}", command.display());
        match mode {
            OutputMode::Stream => self.run_streamed(command).await,
            OutputMode::Capture => self.run_captured(command).await,
        }
    }
}

/// Read a pipe to the end, keeping only the last `capacity` lines
async fn read_tail<R>(
    reader: Option<R>,
    capacity: usize,
    label: &str,
) -> std::io::Result<Vec<String>>
where
    R: AsyncRead + Unpin,
{
    let Some(reader) = reader else {
        return Ok(Vec::new());
    };

    let mut reader = BufReader::new(reader);
    let mut buffer = TailBuffer::new(capacity);
    let mut raw = Vec::new();

    loop {
        raw.clear();
        if reader.read_until(b'\n', &mut raw).await? == 0 {
            break;
        }
        let line = String::from_utf8_lossy(&raw)
            .trim_end_matches(['\n', '\r'])
            .to_string();
        debug!("[{}] {}", label, line);
        buffer.push(line);
    }

    Ok(buffer.into_vec())
}

async fn terminate(child: &mut Child) {
    if let Err(e) = child.start_kill() {
        debug!("kill failed (process already gone?): {}", e);
    }
    if let Err(e) = child.wait().await {
        warn!("Failed to reap interrupted process: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tail_buffer_keeps_latest_lines() {
        let mut buffer = TailBuffer::new(3);
        for i in 0..10 {
            buffer.push(format!("line {}", i));
        }
        assert_eq!(buffer.into_vec(), vec!["line 7", "line 8", "line 9"]);
    }

    #[test]
    fn test_tail_buffer_zero_capacity() {
        let mut buffer = TailBuffer::new(0);
        buffer.push("ignored".to_string());
        assert!(buffer.into_vec().is_empty());
    }

    #[test]
    fn test_command_display() {
        let cmd = ProcessCommand::new("docker")
            .args(["compose", "-f", "docker-compose.yml"])
            .arg("ps");
        assert_eq!(cmd.display(), "docker compose -f docker-compose.yml ps");
    }

    #[test]
    fn test_outcome_success() {
        assert!(ProcessOutcome::exited(Some(0)).success());
        assert!(!ProcessOutcome::exited(Some(1)).success());
        assert!(!ProcessOutcome::exited(None).success());
        assert!(!ProcessOutcome::interrupted().success());
    }

    #[test]
    fn test_last_lines_spans_both_streams() {
        let outcome = ProcessOutcome {
            exit_code: Some(1),
            stdout_tail: vec!["a".into(), "b".into()],
            stderr_tail: vec!["c".into()],
            cancelled: false,
        };
        assert_eq!(outcome.last_lines(2), vec!["b", "c"]);
        assert_eq!(outcome.last_lines(10).len(), 3);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_capture_bounded_tail_and_exit_code() {
        let invoker = SystemInvoker::new().with_tail_lines(2);
        let cmd = ProcessCommand::shell("sh", "for i in 1 2 3 4; do echo out$i; done; echo err >&2; exit 3");
        let outcome = invoker.run(&cmd, OutputMode::Capture).await.unwrap();

        assert_eq!(outcome.exit_code, Some(3));
        assert_eq!(outcome.stdout_tail, vec!["out3", "out4"]);
        assert_eq!(outcome.stderr_tail, vec!["err"]);
        assert!(!outcome.success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_capture_respects_working_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "hello").unwrap();

        let invoker = SystemInvoker::new();
        let cmd = ProcessCommand::shell("sh", "cat marker.txt").current_dir(dir.path());
        let outcome = invoker.run(&cmd, OutputMode::Capture).await.unwrap();

        assert!(outcome.success());
        assert_eq!(outcome.stdout_text(), "hello");
    }

    #[tokio::test]
    async fn test_spawn_failure_is_process_error() {
        let invoker = SystemInvoker::new();
        let cmd = ProcessCommand::new("shardctl-no-such-binary-anywhere");
        let err = invoker.run(&cmd, OutputMode::Capture).await.unwrap_err();
        assert!(matches!(err, ProcessError::Spawn { .. }));
    }
}
