//! # Workspace Configuration
//!
//! Everything shardctl needs to know about the integration workspace:
//!
//! 1. **Layout** (`WorkspaceConfig`): root, `services/` directory, registry
//!    file, base compose file. Defaults can be overridden per invocation via
//!    CLI flags or `SHARDCTL_*` environment variables.
//! 2. **Registry** (`services.yml`, see [`registry`]): which service
//!    repositories exist and how to build them.
//! 3. **Compose layering** (see [`compose`]): which compose files apply for a
//!    profile.
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! let workspace = WorkspaceConfig::discover(WorkspaceOverrides::default())?;
//! let catalog = workspace.load_registry(MissingRegistry::Fail)?;
//! let files = workspace.profile_resolver().resolve(Some("dev"))?;
//! ```

pub mod compose;
pub mod registry;

pub use compose::{LayeredComposeSet, ProfileResolver};
pub use registry::MissingRegistry;

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::domain::ServiceCatalog;
use crate::error::ConfigError;

pub const DEFAULT_REGISTRY_FILE: &str = "services.yml";
pub const DEFAULT_COMPOSE_FILE: &str = "docker-compose.yml";
pub const DEFAULT_SERVICES_DIR: &str = "services";

/// Per-invocation overrides (CLI flags / environment)
#[derive(Debug, Clone, Default)]
pub struct WorkspaceOverrides {
    pub root: Option<PathBuf>,
    pub registry_file: Option<PathBuf>,
    pub compose_file: Option<PathBuf>,
    pub services_dir: Option<PathBuf>,
}

/// Resolved workspace layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceConfig {
    pub root_dir: PathBuf,
    /// Nested working copies live here (`services/<name>`)
    pub services_dir: PathBuf,
    pub registry_file: PathBuf,
    /// Base compose file; profile overrides sit next to it
    pub compose_file: PathBuf,
}

impl WorkspaceConfig {
    /// Default layout rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root_dir = root.into();
        Self {
            services_dir: root_dir.join(DEFAULT_SERVICES_DIR),
            registry_file: root_dir.join(DEFAULT_REGISTRY_FILE),
            compose_file: root_dir.join(DEFAULT_COMPOSE_FILE),
            root_dir,
        }
    }

    /// Locate the workspace and apply overrides
    ///
    /// Relative override paths are taken relative to the workspace root.
    pub fn discover(overrides: WorkspaceOverrides) -> Result<Self> {
        let root = match overrides.root {
            Some(root) => root,
            None => {
                let compose_marker = overrides
                    .compose_file
                    .as_deref()
                    .and_then(Path::file_name)
                    .and_then(|n| n.to_str())
                    .unwrap_or(DEFAULT_COMPOSE_FILE)
                    .to_string();
                let registry_marker = overrides
                    .registry_file
                    .as_deref()
                    .and_then(Path::file_name)
                    .and_then(|n| n.to_str())
                    .unwrap_or(DEFAULT_REGISTRY_FILE)
                    .to_string();
                crate::repo::find_workspace_root(&[&compose_marker, &registry_marker])?
            }
        };

        let mut config = Self::new(root);
        if let Some(path) = overrides.registry_file {
            config.registry_file = config.resolve(path);
        }
        if let Some(path) = overrides.compose_file {
            config.compose_file = config.resolve(path);
        }
        if let Some(path) = overrides.services_dir {
            config.services_dir = config.resolve(path);
        }
        Ok(config)
    }

    fn resolve(&self, path: PathBuf) -> PathBuf {
        if path.is_absolute() {
            path
        } else {
            self.root_dir.join(path)
        }
    }

    pub fn registry_exists(&self) -> bool {
        self.registry_file.is_file()
    }

    pub fn load_registry(&self, missing: MissingRegistry) -> Result<ServiceCatalog, ConfigError> {
        registry::load(&self.registry_file, missing)
    }

    pub fn profile_resolver(&self) -> ProfileResolver {
        ProfileResolver::new(&self.compose_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout() {
        let config = WorkspaceConfig::new("/work");
        assert_eq!(config.services_dir, PathBuf::from("/work/services"));
        assert_eq!(config.registry_file, PathBuf::from("/work/services.yml"));
        assert_eq!(config.compose_file, PathBuf::from("/work/docker-compose.yml"));
    }

    #[test]
    fn test_overrides_relative_to_root() {
        let config = WorkspaceConfig::discover(WorkspaceOverrides {
            root: Some(PathBuf::from("/work")),
            registry_file: Some(PathBuf::from("config/services.yml")),
            compose_file: Some(PathBuf::from("/elsewhere/compose.yaml")),
            services_dir: Some(PathBuf::from("repos")),
        })
        .unwrap();

        assert_eq!(config.registry_file, PathBuf::from("/work/config/services.yml"));
        assert_eq!(config.compose_file, PathBuf::from("/elsewhere/compose.yaml"));
        assert_eq!(config.services_dir, PathBuf::from("/work/repos"));
        assert_eq!(
            config.profile_resolver().override_path("dev"),
            PathBuf::from("/elsewhere/compose.dev.yaml")
        );
    }

    #[test]
    fn test_load_registry_from_workspace() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("services.yml"),
            "repositories:\n  api: https://example.com/api.git\n",
        )
        .unwrap();

        let config = WorkspaceConfig::new(dir.path());
        assert!(config.registry_exists());
        let catalog = config.load_registry(MissingRegistry::Fail).unwrap();
        assert_eq!(catalog.len(), 1);
    }
}
