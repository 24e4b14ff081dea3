//! Centralized error types for shardctl
//!
//! Uses thiserror for typed errors that can be matched on,
//! while still being compatible with anyhow for propagation.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for shardctl operations
#[derive(Error, Debug)]
pub enum ShardctlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Build error: {0}")]
    Build(#[from] BuildError),

    #[error("Usage error: {0}")]
    Usage(#[from] UsageError),

    #[error("Process error: {0}")]
    Process(#[from] ProcessError),

    /// A batch finished with at least one per-service failure
    #[error("{operation}: {failed} of {total} service(s) failed")]
    BatchFailed {
        operation: String,
        failed: usize,
        total: usize,
    },

    /// The container engine ran but exited non-zero
    #[error("docker compose {verb} exited with {}", exit_code_label(.code))]
    EngineFailed { verb: String, code: Option<i32> },
}

impl ShardctlError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Usage(_) => 2,
            Self::EngineFailed {
                code: Some(code), ..
            } if (1..=255).contains(code) => *code as u8,
            _ => 1,
        }
    }
}

fn exit_code_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("code {}", code),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

/// Registry, compose-file and workspace configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {}", .path.display())]
    FileNotFound { path: PathBuf },

    #[error("Failed to parse {}: {message}", .path.display())]
    ParseError { path: PathBuf, message: String },

    #[error("Service '{name}' is defined more than once")]
    DuplicateService { name: String },

    #[error("Service '{service}' is missing required field '{field}'")]
    MissingField { service: String, field: String },

    #[error("Service '{service}' has an invalid repository URL: '{url}'")]
    InvalidUrl { service: String, url: String },

    #[error("Invalid configuration value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("Refusing to overwrite existing {} (use --force)", .path.display())]
    AlreadyExists { path: PathBuf },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Per-service clone/checkout failure
#[derive(Error, Debug)]
#[error("{service}: {cause}")]
pub struct RepositoryError {
    pub service: String,
    pub cause: RepositoryCause,
}

impl RepositoryError {
    pub fn new(service: impl Into<String>, cause: RepositoryCause) -> Self {
        Self {
            service: service.into(),
            cause,
        }
    }
}

#[derive(Error, Debug)]
pub enum RepositoryCause {
    #[error("git clone failed ({}): {stderr}", exit_code_label(.code))]
    CloneFailed { code: Option<i32>, stderr: String },

    #[error("git clone was interrupted")]
    Interrupted,

    #[error("failed to remove existing working copy {}: {source}", .path.display())]
    RemoveFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Build pipeline stage a failure belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStageKind {
    Source,
    Image,
}

impl std::fmt::Display for BuildStageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Source => write!(f, "source build"),
            Self::Image => write!(f, "image build"),
        }
    }
}

/// Per-service source or image build failure
#[derive(Error, Debug)]
#[error("{service} ({stage}): {cause}")]
pub struct BuildError {
    pub service: String,
    pub stage: BuildStageKind,
    pub cause: BuildCause,
}

impl BuildError {
    pub fn new(service: impl Into<String>, stage: BuildStageKind, cause: BuildCause) -> Self {
        Self {
            service: service.into(),
            stage,
            cause,
        }
    }
}

#[derive(Error, Debug)]
pub enum BuildCause {
    #[error("working copy {} does not exist (run `shardctl setup`)", .path.display())]
    MissingWorkingCopy { path: PathBuf },

    #[error("no build command configured")]
    NoBuildCommand,

    #[error("pre-build step `{step}` failed ({})", exit_code_label(.code))]
    PreBuildStepFailed { step: String, code: Option<i32> },

    #[error("`{command}` failed ({})", exit_code_label(.code))]
    CommandFailed { command: String, code: Option<i32> },

    #[error("interrupted")]
    Interrupted,
}

/// Invalid combination of verb and targets
#[derive(Error, Debug)]
pub enum UsageError {
    #[error("`{verb}` needs exactly one target service, got {count}")]
    SingleTargetRequired { verb: String, count: usize },

    #[error("Unknown service '{name}' (see `shardctl build-service --list`)")]
    UnknownService { name: String },

    #[error("No service given (name one or pass --all)")]
    NoTargets,
}

/// An external binary could not be run at all
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("failed to start `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error while running `{program}`: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{tool}` not found in PATH (set {env_var} to override)")]
    ToolMissing { tool: String, env_var: String },
}
