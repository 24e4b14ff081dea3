//! Services layer - orchestration logic
//!
//! This module coordinates between domain logic and infrastructure.
//! Services use infrastructure adapters to perform I/O operations.

pub mod build_service;
pub mod orchestrator;
pub mod repository_service;

// Re-export commonly used types
pub use build_service::{BuildRequest, BuildService};
pub use orchestrator::Orchestrator;
pub use repository_service::{CloneOptions, RepositoryService};
