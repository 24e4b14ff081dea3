//! Domain layer - pure business logic
//!
//! This module contains business logic with no external I/O.
//! Types and functions here can be unit tested without mocking.

pub mod build;
pub mod repository;
pub mod service;
pub mod status;

// Re-export commonly used types
pub use build::{BuildReport, BuildResult, BuildStage, BuildStatus};
pub use repository::{CloneReport, CloneStatus, WorkingCopyState};
pub use service::{BuildEnvironment, BuildSpec, BuildStrategy, ServiceCatalog, ServiceDefinition};
pub use status::ContainerStatus;
