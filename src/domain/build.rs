//! Build pipeline results
//!
//! Per-service outcomes live only for one `build-service` run; they drive the
//! summary and the process exit code.

use std::time::Duration;

use crate::error::BuildError;

/// Furthest stage a service's build reached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStage {
    Source,
    Image,
    Both,
}

impl BuildStage {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::Image => "image",
            Self::Both => "source+image",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStatus {
    Succeeded,
    Failed,
    /// Nothing to build for this service
    Skipped,
}

/// Outcome of one service in a build run
#[derive(Debug)]
pub struct BuildResult {
    pub service: String,
    /// `None` when no stage was attempted
    pub stage: Option<BuildStage>,
    pub status: BuildStatus,
    pub exit_code: Option<i32>,
    /// Last lines of output from the failing (or final) command
    pub output_tail: Vec<String>,
    pub duration: Duration,
    pub error: Option<BuildError>,
}

impl BuildResult {
    pub fn success(service: impl Into<String>, stage: BuildStage, duration: Duration) -> Self {
        Self {
            service: service.into(),
            stage: Some(stage),
            status: BuildStatus::Succeeded,
            exit_code: Some(0),
            output_tail: Vec::new(),
            duration,
            error: None,
        }
    }

    pub fn skipped(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            stage: None,
            status: BuildStatus::Skipped,
            exit_code: None,
            output_tail: Vec::new(),
            duration: Duration::ZERO,
            error: None,
        }
    }

    pub fn failure(
        stage: BuildStage,
        error: BuildError,
        exit_code: Option<i32>,
        output_tail: Vec<String>,
        duration: Duration,
    ) -> Self {
        Self {
            service: error.service.clone(),
            stage: Some(stage),
            status: BuildStatus::Failed,
            exit_code,
            output_tail,
            duration,
            error: Some(error),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.status == BuildStatus::Failed
    }
}

/// All results of one build run, in execution order
#[derive(Debug, Default)]
pub struct BuildReport {
    pub results: Vec<BuildResult>,
}

impl BuildReport {
    pub fn push(&mut self, result: BuildResult) {
        self.results.push(result);
    }

    pub fn failures(&self) -> Vec<&BuildResult> {
        self.results.iter().filter(|r| r.is_failure()).collect()
    }

    pub fn has_failures(&self) -> bool {
        self.results.iter().any(BuildResult::is_failure)
    }

    /// 0 iff every result succeeded or was skipped
    pub fn exit_code(&self) -> i32 {
        i32::from(self.has_failures())
    }
}
