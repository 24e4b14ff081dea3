//! Git operations
//!
//! Only the presence and branch of working copies are managed here:
//! clone, current branch, repository check. Never commit or push.

use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::error::ProcessError;
use crate::infrastructure::process::{OutputMode, ProcessCommand, ProcessInvoker, ProcessOutcome};
use crate::tools::{get_tool_path, tools};

/// Client for git operations
#[derive(Clone)]
pub struct GitClient {
    invoker: Arc<dyn ProcessInvoker>,
    git: String,
}

impl GitClient {
    /// Create a git client using `GIT_BIN` or `git` from PATH
    pub fn new(invoker: Arc<dyn ProcessInvoker>) -> Self {
        Self {
            invoker,
            git: get_tool_path(tools::GIT),
        }
    }

    fn command(&self) -> ProcessCommand {
        ProcessCommand::new(&self.git)
    }

    /// Clone `url` into `dest`, checking out `branch` when given
    ///
    /// Returns the raw outcome; the caller decides what a failure means.
    pub async fn clone_repo(
        &self,
        url: &str,
        branch: Option<&str>,
        dest: &Path,
    ) -> Result<ProcessOutcome, ProcessError> {
        let mut cmd = self.command().arg("clone");
        if let Some(branch) = branch {
            cmd = cmd.args(["--branch", branch]);
        }
        let cmd = cmd.arg(url).arg(dest.to_string_lossy());

        self.invoker.run(&cmd, OutputMode::Capture).await
    }

    /// Current branch of the working copy at `dir`
    ///
    /// `Ok(None)` when `dir` is not a git checkout (or HEAD is unreadable).
    pub async fn current_branch(&self, dir: &Path) -> Result<Option<String>, ProcessError> {
        let cmd = self
            .command()
            .args(["rev-parse", "--abbrev-ref", "HEAD"])
            .current_dir(dir);

        let outcome = self.invoker.run(&cmd, OutputMode::Capture).await?;
        if !outcome.success() {
            debug!(
                "git rev-parse failed in {}: {}",
                dir.display(),
                outcome.stderr_text()
            );
            return Ok(None);
        }

        let branch = outcome.stdout_text().trim().to_string();
        Ok((!branch.is_empty()).then_some(branch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::fake::FakeInvoker;

    #[tokio::test]
    async fn test_clone_with_branch() {
        let fake = Arc::new(FakeInvoker::new());
        let git = GitClient::new(fake.clone());

        git.clone_repo(
            "https://github.com/org/node.git",
            Some("dev"),
            Path::new("/work/services/node"),
        )
        .await
        .unwrap();

        let lines = fake.command_lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].ends_with(
            "clone --branch dev https://github.com/org/node.git /work/services/node"
        ));
        assert_eq!(fake.calls()[0].1, OutputMode::Capture);
    }

    #[tokio::test]
    async fn test_clone_without_branch_uses_remote_default() {
        let fake = Arc::new(FakeInvoker::new());
        let git = GitClient::new(fake.clone());

        git.clone_repo("git@github.com:org/api.git", None, Path::new("services/api"))
            .await
            .unwrap();

        assert!(!fake.command_lines()[0].contains("--branch"));
    }

    #[tokio::test]
    async fn test_current_branch() {
        let fake = Arc::new(FakeInvoker::new().on("rev-parse", 0, &["main"]));
        let git = GitClient::new(fake.clone());

        let branch = git.current_branch(Path::new("services/api")).await.unwrap();
        assert_eq!(branch.as_deref(), Some("main"));

        let (cmd, _) = &fake.calls()[0];
        assert_eq!(cmd.working_dir.as_deref(), Some(Path::new("services/api")));
    }

    #[tokio::test]
    async fn test_current_branch_outside_repository() {
        let fake = Arc::new(FakeInvoker::new().fail("rev-parse", 128, "fatal: not a git repository"));
        let git = GitClient::new(fake);

        let branch = git.current_branch(Path::new("/tmp")).await.unwrap();
        assert!(branch.is_none());
    }
}
