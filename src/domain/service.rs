//! Service domain types
//!
//! Defines service definitions, their build metadata and the catalog that
//! holds them for the duration of one command.

use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{ConfigError, UsageError};

/// How a service gets built
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStrategy {
    /// Native build tool only (sbt, pnpm, cargo, ...)
    Source,
    /// Container image only
    Docker,
    /// Source build, then image build
    Both,
    /// Nothing to build
    None,
}

impl BuildStrategy {
    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "source" | "source-only" => Some(Self::Source),
            "docker" | "docker-only" | "image" => Some(Self::Docker),
            "both" => Some(Self::Both),
            "none" => Some(Self::None),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::Docker => "docker",
            Self::Both => "both",
            Self::None => "none",
        }
    }

    /// Strategy implied by which build commands are configured
    pub fn derive(spec: &BuildSpec) -> Self {
        let source = spec.build_command.is_some();
        let image = spec.docker_build_command.is_some() || spec.docker_image.is_some();
        match (source, image) {
            (true, true) => Self::Both,
            (true, false) => Self::Source,
            (false, true) => Self::Docker,
            (false, false) => Self::None,
        }
    }

    pub fn includes_source(&self) -> bool {
        matches!(self, Self::Source | Self::Both)
    }

    pub fn includes_image(&self) -> bool {
        matches!(self, Self::Docker | Self::Both)
    }

    /// Same strategy with an image stage added
    pub fn with_image(self) -> Self {
        match self {
            Self::Source | Self::Both => Self::Both,
            Self::Docker | Self::None => Self::Docker,
        }
    }

    /// Same strategy with the image stage dropped
    pub fn without_image(self) -> Self {
        match self {
            Self::Source | Self::Both => Self::Source,
            Self::Docker | Self::None => Self::None,
        }
    }
}

impl std::fmt::Display for BuildStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Environment build commands run in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildEnvironment {
    #[default]
    Default,
    /// Wrap commands in `nix develop --command bash -c`
    Nix,
}

impl BuildEnvironment {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "default" | "" => Some(Self::Default),
            "nix" => Some(Self::Nix),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Nix => "nix",
        }
    }
}

/// Build metadata from the `builds` section of the registry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildSpec {
    pub build_command: Option<String>,
    pub pre_build_steps: Vec<String>,
    pub docker_build_command: Option<String>,
    pub docker_pre_build_steps: Vec<String>,
    pub docker_image: Option<String>,
    pub environment: BuildEnvironment,
    /// Directory under the services dir to build in (defaults to the service name)
    pub working_directory: Option<String>,
    /// Produced binary, relative to the build directory
    pub binary_path: Option<String>,
}

/// Service definition with all metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDefinition {
    /// Service name, unique within the registry (also the working copy dir name)
    pub name: String,
    pub repository_url: String,
    /// Branch to clone; `None` means the remote's default branch
    pub branch: Option<String>,
    /// Disabled services are skipped by bulk operations
    pub enabled: bool,
    pub build_strategy: BuildStrategy,
    /// Advisory start-order hint, never enforced
    pub depends_on: Vec<String>,
    pub build: BuildSpec,
}

impl ServiceDefinition {
    /// Create an enabled service with no build configuration
    pub fn new(name: impl Into<String>, repository_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            repository_url: repository_url.into(),
            branch: None,
            enabled: true,
            build_strategy: BuildStrategy::None,
            depends_on: Vec::new(),
            build: BuildSpec::default(),
        }
    }

    /// Builder: pin a branch
    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    /// Builder: enable/disable
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Builder: set build metadata, deriving the strategy from it
    pub fn with_build(mut self, build: BuildSpec) -> Self {
        self.build_strategy = BuildStrategy::derive(&build);
        self.build = build;
        self
    }

    /// Builder: advisory dependencies
    pub fn with_depends_on(mut self, deps: Vec<String>) -> Self {
        self.depends_on = deps;
        self
    }

    /// `services/<name>`
    pub fn working_copy_dir(&self, services_dir: &Path) -> PathBuf {
        services_dir.join(&self.name)
    }

    /// Directory build commands run in
    pub fn build_dir(&self, services_dir: &Path) -> PathBuf {
        match self.build.working_directory {
            Some(ref dir) => services_dir.join(dir),
            None => self.working_copy_dir(services_dir),
        }
    }

    /// Image tag for the default `docker build`
    pub fn docker_image(&self) -> String {
        self.build
            .docker_image
            .clone()
            .unwrap_or_else(|| format!("{}:latest", self.name))
    }

    /// Branch label for display
    pub fn branch_label(&self) -> &str {
        self.branch.as_deref().unwrap_or("(default)")
    }
}

fn scp_like_remote() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Host needs two characters so `C:repo` stays a drive path
    RE.get_or_init(|| {
        Regex::new(r"^(?:[A-Za-z0-9._-]+@)?[A-Za-z0-9.-]{2,}:[^\s/][^\s]*$").unwrap()
    })
}

/// A service name is used verbatim as one directory under the services dir
fn is_single_path_component(name: &str) -> bool {
    if name.contains(['/', '\\']) {
        return false;
    }
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// Relative path that stays below the directory it is joined onto
fn is_contained_relative_path(path: &str) -> bool {
    let path = Path::new(path);
    path.components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
        && path.components().any(|c| matches!(c, Component::Normal(_)))
}

/// Whether `url` is something `git clone` can take as a remote
///
/// Accepts scheme URLs (https, ssh, git, file), scp-like `[user@]host:path`
/// and explicit local paths.
pub fn is_valid_repository_url(url: &str) -> bool {
    let url = url.trim();
    if url.is_empty() || url.contains(char::is_whitespace) {
        return false;
    }
    if url.starts_with('/') || url.starts_with("./") || url.starts_with("../") {
        return true;
    }
    if scp_like_remote().is_match(url) {
        return true;
    }
    match url::Url::parse(url) {
        Ok(parsed) => parsed.has_host() || parsed.scheme() == "file",
        Err(_) => false,
    }
}

/// Ordered, immutable set of service definitions for one invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceCatalog {
    services: Vec<ServiceDefinition>,
}

impl ServiceCatalog {
    /// Build a catalog, checking names, build directories and repository URLs
    pub fn from_definitions(services: Vec<ServiceDefinition>) -> Result<Self, ConfigError> {
        for (i, service) in services.iter().enumerate() {
            if !is_single_path_component(&service.name) {
                return Err(ConfigError::InvalidValue {
                    field: "repositories (service name)".to_string(),
                    value: service.name.clone(),
                });
            }
            if let Some(ref dir) = service.build.working_directory {
                if !is_contained_relative_path(dir) {
                    return Err(ConfigError::InvalidValue {
                        field: format!("builds.{}.working_directory", service.name),
                        value: dir.clone(),
                    });
                }
            }
            if services[..i].iter().any(|s| s.name == service.name) {
                return Err(ConfigError::DuplicateService {
                    name: service.name.clone(),
                });
            }
            if service.enabled && service.repository_url.trim().is_empty() {
                return Err(ConfigError::MissingField {
                    service: service.name.clone(),
                    field: "url".to_string(),
                });
            }
            if !service.repository_url.trim().is_empty()
                && !is_valid_repository_url(&service.repository_url)
            {
                return Err(ConfigError::InvalidUrl {
                    service: service.name.clone(),
                    url: service.repository_url.clone(),
                });
            }
        }
        Ok(Self { services })
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ServiceDefinition> {
        self.services.iter()
    }

    pub fn get(&self, name: &str) -> Option<&ServiceDefinition> {
        self.services.iter().find(|s| s.name == name)
    }

    /// Enabled services, in registry order
    pub fn list_enabled(&self) -> Vec<&ServiceDefinition> {
        self.services.iter().filter(|s| s.enabled).collect()
    }

    /// All services when `include_disabled`, enabled ones otherwise
    pub fn bulk_targets(&self, include_disabled: bool) -> Vec<&ServiceDefinition> {
        if include_disabled {
            self.services.iter().collect()
        } else {
            self.list_enabled()
        }
    }

    /// Look up explicitly named services, keeping the caller's order
    pub fn select(&self, names: &[String]) -> Result<Vec<&ServiceDefinition>, UsageError> {
        names
            .iter()
            .map(|name| {
                self.get(name).ok_or_else(|| UsageError::UnknownService {
                    name: name.clone(),
                })
            })
            .collect()
    }
}
