//! Runtime tool path resolution
//!
//! Every external binary shardctl shells out to (docker, git, nix, sh) is
//! resolved the same way:
//!
//! 1. Check for an environment variable `{TOOL}_BIN` (e.g., `DOCKER_BIN`)
//! 2. Fall back to PATH-based invocation if the envvar is not set
//!
//! ```rust,ignore
//! let docker = get_tool_path(tools::DOCKER);
//! let cmd = ProcessCommand::new(docker).args(["compose", "version"]);
//! ```

use std::env;

use crate::error::ProcessError;

/// Get the path to an external tool
///
/// Returns the value of `{TOOL}_BIN` (uppercase tool name + "_BIN") when set,
/// otherwise the tool name itself, which relies on PATH.
pub fn get_tool_path(tool: &str) -> String {
    env::var(tool_env_var(tool)).unwrap_or_else(|_| tool.to_string())
}

/// Name of the override variable for a tool (`docker` -> `DOCKER_BIN`)
pub fn tool_env_var(tool: &str) -> String {
    format!("{}_BIN", tool.to_uppercase())
}

/// Check that a tool can be found, either via its override or on PATH
pub fn require_tool(tool: &str) -> Result<String, ProcessError> {
    let path = get_tool_path(tool);
    which::which(&path)
        .map(|_| path)
        .map_err(|_| ProcessError::ToolMissing {
            tool: tool.to_string(),
            env_var: tool_env_var(tool),
        })
}

/// Whether a tool is available, without failing
pub fn is_available(tool: &str) -> bool {
    require_tool(tool).is_ok()
}

/// Tool names shardctl knows about
pub mod tools {
    pub const DOCKER: &str = "docker";
    pub const GIT: &str = "git";
    pub const NIX: &str = "nix";
    pub const SH: &str = "sh";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_env_var() {
        assert_eq!(tool_env_var("docker"), "DOCKER_BIN");
        assert_eq!(tool_env_var(tools::GIT), "GIT_BIN");
    }

    #[test]
    fn test_get_tool_path_fallback() {
        env::remove_var("SHARDCTL_FAKE_TOOL_BIN");
        assert_eq!(get_tool_path("shardctl_fake_tool"), "shardctl_fake_tool");
    }

    #[test]
    fn test_get_tool_path_override() {
        env::set_var("SHARDCTL_OVERRIDDEN_BIN", "/opt/bin/overridden");
        assert_eq!(get_tool_path("shardctl_overridden"), "/opt/bin/overridden");
        env::remove_var("SHARDCTL_OVERRIDDEN_BIN");
    }

    #[test]
    fn test_require_missing_tool() {
        let err = require_tool("shardctl-definitely-not-installed").unwrap_err();
        assert!(matches!(err, ProcessError::ToolMissing { .. }));
        assert!(err.to_string().contains("SHARDCTL-DEFINITELY-NOT-INSTALLED_BIN"));
    }
}
