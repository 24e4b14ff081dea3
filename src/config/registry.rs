//! Service registry (`services.yml`)
//!
//! ```yaml
//! repositories:
//!   node:
//!     url: https://github.com/org/node.git
//!     branch: dev
//!     depends_on: [postgres]
//!   web: https://github.com/org/web.git   # legacy form: URL only
//!
//! builds:
//!   node:
//!     build_command: sbt compile
//!     docker_build_command: sbt docker:publishLocal
//!     environment: nix
//! ```

use std::io::Write;
use std::path::Path;

use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use tracing::{debug, warn};

use crate::domain::service::{
    BuildEnvironment, BuildSpec, BuildStrategy, ServiceCatalog, ServiceDefinition,
};
use crate::error::ConfigError;

/// What to do when the registry file does not exist
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingRegistry {
    Fail,
    /// Treat a missing file as an empty registry
    Empty,
}

#[derive(Debug, Default, Deserialize)]
struct RawRegistry {
    #[serde(default)]
    repositories: Option<Mapping>,
    #[serde(default)]
    builds: Option<Mapping>,
}

#[derive(Debug, Deserialize)]
struct RawRepository {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    branch: Option<String>,
    #[serde(default = "default_enabled")]
    enabled: bool,
    #[serde(default)]
    depends_on: Vec<String>,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Default, Deserialize)]
struct RawBuild {
    #[serde(default)]
    strategy: Option<String>,
    #[serde(default)]
    build_command: Option<String>,
    #[serde(default)]
    pre_build_steps: Vec<String>,
    #[serde(default)]
    docker_build_command: Option<String>,
    #[serde(default)]
    docker_pre_build_steps: Vec<String>,
    #[serde(default)]
    docker_image: Option<String>,
    #[serde(default)]
    environment: Option<String>,
    #[serde(default)]
    working_directory: Option<String>,
    #[serde(default)]
    binary_path: Option<String>,
}

/// Load the registry at `path`
pub fn load(path: &Path, missing: MissingRegistry) -> Result<ServiceCatalog, ConfigError> {
    if !path.exists() {
        return match missing {
            MissingRegistry::Empty => {
                debug!("No registry at {}, using an empty one", path.display());
                Ok(ServiceCatalog::default())
            }
            MissingRegistry::Fail => Err(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }),
        };
    }

    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse(&content, path)
}

/// Parse registry YAML; `origin` is only used in error messages
pub fn parse(content: &str, origin: &Path) -> Result<ServiceCatalog, ConfigError> {
    let parse_error = |message: String| ConfigError::ParseError {
        path: origin.to_path_buf(),
        message,
    };

    if content.trim().is_empty() {
        return Ok(ServiceCatalog::default());
    }

    let raw: RawRegistry = serde_yaml::from_str(content).map_err(|e| parse_error(e.to_string()))?;
    let builds = raw.builds.unwrap_or_default();

    let mut definitions = Vec::new();
    for (key, value) in raw.repositories.unwrap_or_default() {
        let name = key_name(&key).ok_or_else(|| parse_error(format!("invalid service name {:?}", key)))?;
        let mut definition = repository_entry(&name, value, &parse_error)?;

        if let Some(build) = builds.get(name.as_str()) {
            apply_build(&mut definition, build.clone(), &parse_error)?;
        }
        definitions.push(definition);
    }

    for key in builds.keys() {
        if let Some(name) = key_name(key) {
            if !definitions.iter().any(|d| d.name == name) {
                warn!(
                    "Ignoring build configuration for '{}': not listed under repositories",
                    name
                );
            }
        }
    }

    ServiceCatalog::from_definitions(definitions)
}

fn key_name(key: &Value) -> Option<String> {
    key.as_str()
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
}

fn repository_entry(
    name: &str,
    value: Value,
    parse_error: &impl Fn(String) -> ConfigError,
) -> Result<ServiceDefinition, ConfigError> {
    let missing_url = || ConfigError::MissingField {
        service: name.to_string(),
        field: "url".to_string(),
    };

    match value {
        Value::String(url) => Ok(ServiceDefinition::new(name, url.trim())),
        Value::Mapping(_) => {
            let raw: RawRepository = serde_yaml::from_value(value)
                .map_err(|e| parse_error(format!("repository '{}': {}", name, e)))?;

            let url = raw.url.map(|u| u.trim().to_string()).unwrap_or_default();
            if url.is_empty() && raw.enabled {
                return Err(missing_url());
            }

            let mut definition = ServiceDefinition::new(name, url)
                .with_enabled(raw.enabled)
                .with_depends_on(raw.depends_on);
            if let Some(branch) = raw.branch.map(|b| b.trim().to_string()).filter(|b| !b.is_empty()) {
                definition = definition.with_branch(branch);
            }
            Ok(definition)
        }
        Value::Null => Err(missing_url()),
        other => Err(parse_error(format!(
            "repository '{}' must be a URL or a mapping, got {:?}",
            name, other
        ))),
    }
}

fn apply_build(
    definition: &mut ServiceDefinition,
    value: Value,
    parse_error: &impl Fn(String) -> ConfigError,
) -> Result<(), ConfigError> {
    let raw: RawBuild = if value.is_null() {
        RawBuild::default()
    } else {
        serde_yaml::from_value(value)
            .map_err(|e| parse_error(format!("build for '{}': {}", definition.name, e)))?
    };

    let environment = match raw.environment.as_deref() {
        None => BuildEnvironment::Default,
        Some(env) => BuildEnvironment::from_str(env).ok_or_else(|| ConfigError::InvalidValue {
            field: format!("builds.{}.environment", definition.name),
            value: env.to_string(),
        })?,
    };

    let spec = BuildSpec {
        build_command: non_empty(raw.build_command),
        pre_build_steps: raw.pre_build_steps,
        docker_build_command: non_empty(raw.docker_build_command),
        docker_pre_build_steps: raw.docker_pre_build_steps,
        docker_image: non_empty(raw.docker_image),
        environment,
        working_directory: non_empty(raw.working_directory),
        binary_path: non_empty(raw.binary_path),
    };

    let derived = BuildStrategy::derive(&spec);
    let strategy = match raw.strategy.as_deref() {
        None => derived,
        Some(s) => BuildStrategy::from_str(s).ok_or_else(|| ConfigError::InvalidValue {
            field: format!("builds.{}.strategy", definition.name),
            value: s.to_string(),
        })?,
    };

    definition.build = spec;
    definition.build_strategy = strategy;
    Ok(())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

const EXAMPLE_REGISTRY: &str = r#"# Service repositories cloned into services/ by `shardctl setup`.
# Each entry is either a bare URL or a mapping with url/branch/enabled.

repositories:
  service-1:
    url: https://github.com/your-org/service-1.git
    branch: main
    enabled: true
  service-2:
    url: https://github.com/your-org/service-2.git
    enabled: false
    depends_on: [service-1]
  # service-3: https://github.com/your-org/service-3.git

# Optional build metadata used by `shardctl build-service`.
builds:
  service-1:
    build_command: cargo build --release
    docker_build_command: docker build -t your-org/service-1:latest .
    docker_image: your-org/service-1:latest
    # environment: nix
    # pre_build_steps: ["./scripts/generate.sh"]
    # working_directory: service-1/server
    # binary_path: target/release/service-1
"#;

/// Write an example registry to `path`
///
/// Never replaces an existing file unless `force` is set.
pub fn create_default(path: &Path, force: bool) -> Result<(), ConfigError> {
    let io_error = |source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    };

    if force {
        return std::fs::write(path, EXAMPLE_REGISTRY).map_err(io_error);
    }

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::AlreadyExists {
                ConfigError::AlreadyExists {
                    path: path.to_path_buf(),
                }
            } else {
                io_error(e)
            }
        })?;
    file.write_all(EXAMPLE_REGISTRY.as_bytes()).map_err(io_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_str(content: &str) -> Result<ServiceCatalog, ConfigError> {
        parse(content, Path::new("services.yml"))
    }

    #[test]
    fn test_parse_both_entry_forms() {
        let catalog = parse_str(
            r#"
repositories:
  node:
    url: https://github.com/org/node.git
    branch: dev
    depends_on: [postgres]
  web: https://github.com/org/web.git
"#,
        )
        .unwrap();

        let names: Vec<_> = catalog.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["node", "web"]);

        let node = catalog.get("node").unwrap();
        assert_eq!(node.branch.as_deref(), Some("dev"));
        assert!(node.enabled);
        assert_eq!(node.depends_on, vec!["postgres".to_string()]);
        assert_eq!(node.build_strategy, BuildStrategy::None);

        let web = catalog.get("web").unwrap();
        assert!(web.branch.is_none());
        assert_eq!(web.repository_url, "https://github.com/org/web.git");
    }

    #[test]
    fn test_disabled_services_filtered_by_list_enabled() {
        let catalog = parse_str(
            r#"
repositories:
  a: https://example.com/a.git
  b:
    url: https://example.com/b.git
    enabled: false
"#,
        )
        .unwrap();
        let enabled: Vec<_> = catalog.list_enabled().iter().map(|s| s.name.clone()).collect();
        assert_eq!(enabled, vec!["a".to_string()]);
    }

    #[test]
    fn test_builds_attach_to_services() {
        let catalog = parse_str(
            r#"
repositories:
  node: https://example.com/node.git
  client: https://example.com/client.git
builds:
  node:
    build_command: sbt compile
    pre_build_steps: ["./gen.sh"]
    docker_build_command: sbt docker:publishLocal
    environment: nix
    binary_path: target/node
  client:
    docker_image: org/client:dev
    strategy: none
"#,
        )
        .unwrap();

        let node = catalog.get("node").unwrap();
        assert_eq!(node.build_strategy, BuildStrategy::Both);
        assert_eq!(node.build.environment, BuildEnvironment::Nix);
        assert_eq!(node.build.pre_build_steps, vec!["./gen.sh".to_string()]);
        assert_eq!(node.build.binary_path.as_deref(), Some("target/node"));

        // Explicit strategy wins over derivation
        let client = catalog.get("client").unwrap();
        assert_eq!(client.build_strategy, BuildStrategy::None);
    }

    #[test]
    fn test_missing_url_is_config_error() {
        let err = parse_str("repositories:\n  node:\n    branch: main\n").unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { ref field, .. } if field == "url"));

        let err = parse_str("repositories:\n  node:\n").unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { .. }));
    }

    #[test]
    fn test_paths_escaping_services_dir_rejected() {
        let err = parse_str("repositories:\n  \"..\": https://e.com/x.git\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref value, .. } if value == ".."));

        let err = parse_str("repositories:\n  org/api: https://e.com/api.git\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));

        let err = parse_str(
            "repositories:\n  a: https://e.com/a.git\nbuilds:\n  a:\n    build_command: make\n    working_directory: ../../etc\n",
        )
        .unwrap_err();
        assert!(
            matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "builds.a.working_directory")
        );
    }

    #[test]
    fn test_unparseable_url_is_config_error() {
        let err = parse_str("repositories:\n  node: not a url\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUrl { .. }));
    }

    #[test]
    fn test_invalid_strategy_and_environment() {
        let err = parse_str(
            "repositories:\n  a: https://e.com/a.git\nbuilds:\n  a:\n    strategy: sometimes\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "builds.a.strategy"));

        let err = parse_str(
            "repositories:\n  a: https://e.com/a.git\nbuilds:\n  a:\n    environment: conda\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_malformed_yaml() {
        let err = parse_str("repositories: [unclosed").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn test_empty_file_is_empty_catalog() {
        assert!(parse_str("").unwrap().is_empty());
        assert!(parse_str("repositories:\n").unwrap().is_empty());
    }

    #[test]
    fn test_missing_file_handling() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("services.yml");

        let err = load(&path, MissingRegistry::Fail).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
        assert!(load(&path, MissingRegistry::Empty).unwrap().is_empty());
    }

    #[test]
    fn test_create_default_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("services.yml");
        std::fs::write(&path, "repositories:\n  mine: https://example.com/mine.git\n").unwrap();

        let err = create_default(&path, false).unwrap_err();
        assert!(matches!(err, ConfigError::AlreadyExists { .. }));
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("mine"));
    }

    #[test]
    fn test_create_default_is_loadable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("services.yml");

        create_default(&path, false).unwrap();
        let catalog = load(&path, MissingRegistry::Fail).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.list_enabled().len(), 1);
        assert_eq!(
            catalog.get("service-1").unwrap().build_strategy,
            BuildStrategy::Both
        );

        // --force replaces
        std::fs::write(&path, "garbage").unwrap();
        create_default(&path, true).unwrap();
        assert!(load(&path, MissingRegistry::Fail).is_ok());
    }
}
