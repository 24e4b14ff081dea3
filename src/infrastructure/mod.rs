//! Infrastructure layer - external I/O adapters
//!
//! This module contains all code that interacts with external systems:
//! - Subprocess execution (the single boundary everything goes through)
//! - Git operations
//! - docker compose

pub mod compose;
pub mod git;
pub mod process;

#[cfg(test)]
pub mod fake;

// Re-export commonly used types
pub use compose::{ComposeClient, ComposeVerb};
pub use git::GitClient;
pub use process::{OutputMode, ProcessCommand, ProcessInvoker, ProcessOutcome, SystemInvoker};
