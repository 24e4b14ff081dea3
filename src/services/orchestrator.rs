//! Orchestration facade - the single entry point commands talk to
//!
//! Owns the workspace layout and the process capability, and wires them into
//! the registry, repository, build and compose components for one invocation.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::{registry, MissingRegistry, WorkspaceConfig};
use crate::domain::status::parse_ps_output;
use crate::domain::{BuildReport, CloneReport, ContainerStatus, ServiceCatalog, WorkingCopyState};
use crate::error::{ConfigError, ProcessError, ShardctlError};
use crate::infrastructure::compose::compose_version;
use crate::infrastructure::{ComposeClient, ComposeVerb, ProcessInvoker, ProcessOutcome};
use crate::services::build_service::{BuildRequest, BuildService};
use crate::services::repository_service::{CloneOptions, RepositoryService};
use crate::tools::{self, tools as tool_names};

pub struct Orchestrator {
    workspace: WorkspaceConfig,
    invoker: Arc<dyn ProcessInvoker>,
}

impl Orchestrator {
    pub fn new(workspace: WorkspaceConfig, invoker: Arc<dyn ProcessInvoker>) -> Self {
        Self { workspace, invoker }
    }

    pub fn workspace(&self) -> &WorkspaceConfig {
        &self.workspace
    }

    pub fn load_catalog(&self, missing: MissingRegistry) -> Result<ServiceCatalog, ConfigError> {
        let catalog = self.workspace.load_registry(missing)?;
        debug!(
            "Loaded {} service(s) from {}",
            catalog.len(),
            self.workspace.registry_file.display()
        );
        Ok(catalog)
    }

    /// Compose client for `profile`, warning when the profile has no override file
    pub fn compose_client(&self, profile: Option<&str>) -> Result<ComposeClient, ConfigError> {
        let files = self.workspace.profile_resolver().resolve(profile)?;
        if let Some(profile) = files.unmatched_profile() {
            warn!(
                "No override file for profile '{}', using {} only",
                profile,
                files.base().display()
            );
        }
        Ok(ComposeClient::new(self.invoker.clone(), files))
    }

    /// docker with the compose plugin must be usable; git is only advised
    pub async fn preflight(&self) -> Result<(), ShardctlError> {
        tools::require_tool(tool_names::DOCKER)?;

        match compose_version(self.invoker.as_ref()).await? {
            Some(version) => debug!("{}", version),
            None => {
                return Err(ProcessError::ToolMissing {
                    tool: "docker compose".to_string(),
                    env_var: tools::tool_env_var(tool_names::DOCKER),
                }
                .into())
            }
        }

        if !tools::is_available(tool_names::GIT) {
            warn!("git not found in PATH; `shardctl setup` will not work");
        }
        Ok(())
    }

    /// Run one compose verb against `services` (empty = all of them)
    ///
    /// `exec`/`shell` are checked for exactly one target before anything runs.
    /// A non-zero exit becomes [`ShardctlError::EngineFailed`].
    pub async fn lifecycle(
        &self,
        verb: &ComposeVerb,
        services: &[String],
        profile: Option<&str>,
    ) -> Result<ProcessOutcome, ShardctlError> {
        verb.check_targets(services)?;

        let client = self.compose_client(profile)?;
        let outcome = client.run(verb, services).await?;

        if outcome.cancelled {
            info!("docker compose {} interrupted", verb.name());
            return Ok(outcome);
        }
        if !outcome.success() {
            return Err(ShardctlError::EngineFailed {
                verb: verb.name().to_string(),
                code: outcome.exit_code,
            });
        }
        Ok(outcome)
    }

    /// Containers of the compose project, sorted by service
    pub async fn container_status(
        &self,
        profile: Option<&str>,
    ) -> Result<Vec<ContainerStatus>, ShardctlError> {
        let outcome = self.lifecycle(&ComposeVerb::PsJson, &[], profile).await?;
        Ok(parse_ps_output(&outcome.stdout_text()))
    }

    /// Working copy states, or `None` when there is no registry
    pub async fn working_copy_status(
        &self,
    ) -> Result<Option<Vec<(String, WorkingCopyState)>>, ShardctlError> {
        if !self.workspace.registry_exists() {
            return Ok(None);
        }
        let catalog = self.load_catalog(MissingRegistry::Fail)?;
        let states = self.repositories().status(&catalog).await?;
        Ok(Some(states))
    }

    /// Write the example registry
    pub fn create_registry(&self, force: bool) -> Result<(), ConfigError> {
        registry::create_default(&self.workspace.registry_file, force)?;
        info!("Created {}", self.workspace.registry_file.display());
        Ok(())
    }

    /// Prepare the services directory and clone what is missing
    pub async fn clone_services(&self, options: CloneOptions) -> Result<CloneReport, ShardctlError> {
        let catalog = self.load_catalog(MissingRegistry::Fail)?;
        let repositories = self.repositories();
        repositories.ensure_services_dir()?;

        if catalog.is_empty() {
            warn!(
                "No repositories configured in {}",
                self.workspace.registry_file.display()
            );
            return Ok(CloneReport::default());
        }
        Ok(repositories.clone_all(&catalog, options).await?)
    }

    pub async fn build_services(&self, request: &BuildRequest) -> Result<BuildReport, ShardctlError> {
        let catalog = self.load_catalog(MissingRegistry::Fail)?;
        self.builds().build(&catalog, request).await
    }

    pub fn repositories(&self) -> RepositoryService {
        RepositoryService::new(self.invoker.clone(), &self.workspace)
    }

    pub fn builds(&self) -> BuildService {
        BuildService::new(self.invoker.clone(), &self.workspace.services_dir)
    }
}
