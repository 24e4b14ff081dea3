//! Repository lifecycle - keeps `services/<name>` working copies in place
//!
//! Clones run one at a time in registry order. A failing service is recorded
//! and the batch moves on; only an operator interrupt stops the batch early.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use colored::Colorize;
use tracing::{debug, info, warn};

use crate::config::WorkspaceConfig;
use crate::domain::{CloneReport, CloneStatus, ServiceCatalog, ServiceDefinition, WorkingCopyState};
use crate::error::{ConfigError, ProcessError, RepositoryCause, RepositoryError};
use crate::infrastructure::{GitClient, ProcessInvoker};
use crate::ui;

const GITKEEP: &str = ".gitkeep";

#[derive(Debug, Clone, Copy, Default)]
pub struct CloneOptions {
    /// Remove existing working copies and clone them again
    pub force: bool,
    /// Also clone services marked `enabled: false`
    pub include_disabled: bool,
}

/// Clones and inspects nested working copies
pub struct RepositoryService {
    git: GitClient,
    services_dir: PathBuf,
    root_dir: PathBuf,
}

impl RepositoryService {
    pub fn new(invoker: Arc<dyn ProcessInvoker>, workspace: &WorkspaceConfig) -> Self {
        Self {
            git: GitClient::new(invoker),
            services_dir: workspace.services_dir.clone(),
            root_dir: workspace.root_dir.clone(),
        }
    }

    /// Create the services directory with a `.gitkeep` and make the workspace
    /// `.gitignore` ignore everything under it except that file
    pub fn ensure_services_dir(&self) -> Result<(), ConfigError> {
        fs::create_dir_all(&self.services_dir).map_err(|source| ConfigError::Io {
            path: self.services_dir.clone(),
            source,
        })?;

        let keep = self.services_dir.join(GITKEEP);
        if !keep.exists() {
            fs::write(&keep, "").map_err(|source| ConfigError::Io {
                path: keep.clone(),
                source,
            })?;
        }

        // Only a services dir inside the workspace can be ignored from its root
        let Ok(relative) = self.services_dir.strip_prefix(&self.root_dir) else {
            debug!(
                "{} is outside {}, leaving .gitignore alone",
                self.services_dir.display(),
                self.root_dir.display()
            );
            return Ok(());
        };
        let relative = relative.to_string_lossy().replace('\\', "/");
        if relative.is_empty() {
            return Ok(());
        }

        let gitignore = self.root_dir.join(".gitignore");
        let existing = match fs::read_to_string(&gitignore) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: gitignore,
                    source,
                })
            }
        };

        let wanted = [format!("{}/*", relative), format!("!{}/{}", relative, GITKEEP)];
        let missing: Vec<&String> = wanted
            .iter()
            .filter(|entry| !existing.lines().any(|line| line.trim() == entry.as_str()))
            .collect();
        if missing.is_empty() {
            return Ok(());
        }

        let mut addition = String::new();
        if !existing.is_empty() && !existing.ends_with('\n') {
            addition.push('\n');
        }
        for entry in missing {
            addition.push_str(entry);
            addition.push('\n');
        }

        let io_err = |source| ConfigError::Io {
            path: gitignore.clone(),
            source,
        };
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&gitignore)
            .map_err(io_err)?;
        file.write_all(addition.as_bytes()).map_err(io_err)?;
        info!("Updated {}", gitignore.display());
        Ok(())
    }

    /// Clone every target service that is not already present
    ///
    /// Per-service failures end up in the report. `Err` means git could not
    /// be started at all.
    pub async fn clone_all(
        &self,
        catalog: &ServiceCatalog,
        options: CloneOptions,
    ) -> Result<CloneReport, ProcessError> {
        let targets = catalog.bulk_targets(options.include_disabled);
        let skipped_disabled = catalog.len() - targets.len();
        if skipped_disabled > 0 {
            info!("Skipping {} disabled service(s)", skipped_disabled);
        }

        let mut report = CloneReport::default();
        for service in targets {
            let status = self.clone_one(service, options.force).await?;
            print_clone_line(service, &status);

            let interrupted = matches!(
                &status,
                CloneStatus::Failed(RepositoryError {
                    cause: RepositoryCause::Interrupted,
                    ..
                })
            );
            report.push(&service.name, status);
            if interrupted {
                warn!("Interrupted, not cloning remaining services");
                break;
            }
        }
        Ok(report)
    }

    async fn clone_one(
        &self,
        service: &ServiceDefinition,
        force: bool,
    ) -> Result<CloneStatus, ProcessError> {
        let dest = service.working_copy_dir(&self.services_dir);
        let existed = dest.exists();

        if existed && !force {
            debug!("{} already present at {}", service.name, dest.display());
            return Ok(CloneStatus::Skipped);
        }

        if existed {
            info!("Removing {} for re-clone", dest.display());
            if let Err(source) = remove_path(&dest) {
                return Ok(CloneStatus::Failed(RepositoryError::new(
                    &service.name,
                    RepositoryCause::RemoveFailed { path: dest, source },
                )));
            }
        }

        let pb = ui::spinner(format!(
            "Cloning {} ({})",
            service.name,
            service.branch_label()
        ));
        let outcome = self
            .git
            .clone_repo(&service.repository_url, service.branch.as_deref(), &dest)
            .await;
        pb.finish_and_clear();
        let outcome = outcome?;

        if outcome.cancelled {
            // git may have left a partial checkout behind
            if dest.exists() {
                if let Err(e) = remove_path(&dest) {
                    warn!("Could not remove partial clone {}: {}", dest.display(), e);
                }
            }
            return Ok(CloneStatus::Failed(RepositoryError::new(
                &service.name,
                RepositoryCause::Interrupted,
            )));
        }

        if !outcome.success() {
            return Ok(CloneStatus::Failed(RepositoryError::new(
                &service.name,
                RepositoryCause::CloneFailed {
                    code: outcome.exit_code,
                    stderr: outcome.stderr_text().trim().to_string(),
                },
            )));
        }

        Ok(if existed {
            CloneStatus::Recloned
        } else {
            CloneStatus::Cloned
        })
    }

    /// Working copy state of every service in the catalog (read-only)
    pub async fn status(
        &self,
        catalog: &ServiceCatalog,
    ) -> Result<Vec<(String, WorkingCopyState)>, ProcessError> {
        let mut states = Vec::with_capacity(catalog.len());
        for service in catalog.iter() {
            let state = self.working_copy_state(service).await?;
            states.push((service.name.clone(), state));
        }
        Ok(states)
    }

    async fn working_copy_state(
        &self,
        service: &ServiceDefinition,
    ) -> Result<WorkingCopyState, ProcessError> {
        let dir = service.working_copy_dir(&self.services_dir);
        if !dir.exists() {
            return Ok(WorkingCopyState::Absent);
        }
        // Without this check git would answer for the enclosing workspace repo
        if !dir.join(".git").exists() {
            return Ok(WorkingCopyState::NotARepository);
        }

        let Some(actual) = self.git.current_branch(&dir).await? else {
            return Ok(WorkingCopyState::NotARepository);
        };

        Ok(match service.branch {
            Some(ref expected) if *expected != actual => WorkingCopyState::WrongBranch {
                expected: expected.clone(),
                actual,
            },
            _ => WorkingCopyState::Present { branch: actual },
        })
    }
}

fn remove_path(path: &Path) -> std::io::Result<()> {
    if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

fn print_clone_line(service: &ServiceDefinition, status: &CloneStatus) {
    match status {
        CloneStatus::Cloned => println!(
            "  {} {} ({})",
            "✓".green(),
            service.name.bold(),
            service.branch_label()
        ),
        CloneStatus::Recloned => println!(
            "  {} {} ({}) re-cloned",
            "✓".green(),
            service.name.bold(),
            service.branch_label()
        ),
        CloneStatus::Skipped => println!(
            "  {} {} already present",
            "•".dimmed(),
            service.name
        ),
        CloneStatus::Failed(err) => println!("  {} {}", "✗".red(), err.to_string().red()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::fake::FakeInvoker;

    fn catalog() -> ServiceCatalog {
        ServiceCatalog::from_definitions(vec![
            ServiceDefinition::new("a", "https://example.com/a.git"),
            ServiceDefinition::new("b", "https://example.com/b.git").with_branch("dev"),
            ServiceDefinition::new("c", "https://example.com/c.git"),
            ServiceDefinition::new("d", "https://example.com/d.git").with_enabled(false),
        ])
        .unwrap()
    }

    fn service(fake: Arc<FakeInvoker>, root: &Path) -> RepositoryService {
        RepositoryService::new(fake, &WorkspaceConfig::new(root))
    }

    #[tokio::test]
    async fn test_clone_all_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeInvoker::new().simulating_clones());
        let repos = service(fake.clone(), dir.path());

        let first = repos.clone_all(&catalog(), CloneOptions::default()).await.unwrap();
        assert_eq!(first.cloned(), vec!["a", "b", "c"]);
        assert_eq!(fake.count_matching(" clone "), 3);

        let second = repos.clone_all(&catalog(), CloneOptions::default()).await.unwrap();
        assert_eq!(second.skipped(), vec!["a", "b", "c"]);
        assert!(!second.has_failures());
        assert_eq!(fake.count_matching(" clone "), 3);
    }

    #[tokio::test]
    async fn test_failure_is_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let fake = Arc::new(
            FakeInvoker::new()
                .fail("b.git", 128, "fatal: Remote branch dev not found")
                .simulating_clones(),
        );
        let repos = service(fake.clone(), dir.path());

        let report = repos.clone_all(&catalog(), CloneOptions::default()).await.unwrap();

        assert!(report.has_failures());
        assert_eq!(report.failed(), vec!["b"]);
        assert_eq!(report.cloned(), vec!["a", "c"]);
        assert!(fake.count_matching("c.git") == 1);
        assert!(fake.command_lines()[1].contains("--branch dev"));
    }

    #[tokio::test]
    async fn test_disabled_services_skipped_unless_included() {
        let dir = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeInvoker::new().simulating_clones());
        let repos = service(fake.clone(), dir.path());

        repos.clone_all(&catalog(), CloneOptions::default()).await.unwrap();
        assert_eq!(fake.count_matching("d.git"), 0);

        let report = repos
            .clone_all(
                &catalog(),
                CloneOptions {
                    force: false,
                    include_disabled: true,
                },
            )
            .await
            .unwrap();
        assert_eq!(report.cloned(), vec!["d"]);
    }

    #[tokio::test]
    async fn test_force_reclones() {
        let dir = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeInvoker::new().simulating_clones());
        let repos = service(fake.clone(), dir.path());
        let stale = dir.path().join("services/a/stale.txt");
        fs::create_dir_all(stale.parent().unwrap()).unwrap();
        fs::write(&stale, "old").unwrap();

        let report = repos
            .clone_all(
                &catalog(),
                CloneOptions {
                    force: true,
                    include_disabled: false,
                },
            )
            .await
            .unwrap();

        assert!(matches!(report.outcomes[0].status, CloneStatus::Recloned));
        assert!(!stale.exists());
        assert!(dir.path().join("services/a/.git").exists());
    }

    #[tokio::test]
    async fn test_interrupted_clone_stops_batch() {
        let dir = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeInvoker::new().interrupt("b.git").simulating_clones());
        let repos = service(fake.clone(), dir.path());

        let report = repos.clone_all(&catalog(), CloneOptions::default()).await.unwrap();

        assert_eq!(report.cloned(), vec!["a"]);
        assert_eq!(report.failed(), vec!["b"]);
        assert!(matches!(
            report.outcomes[1].status,
            CloneStatus::Failed(RepositoryError {
                cause: RepositoryCause::Interrupted,
                ..
            })
        ));
        assert!(!dir.path().join("services/b").exists());
        assert!(dir.path().join("services/a/.git").exists());
        assert_eq!(fake.count_matching("c.git"), 0);
        assert_eq!(report.outcomes.len(), 2);
    }

    #[tokio::test]
    async fn test_escaping_service_name_never_reaches_disk() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("ws");
        fs::create_dir_all(root.join("services")).unwrap();
        fs::write(root.join("precious.txt"), "keep").unwrap();

        let parsed = crate::config::registry::parse(
            "repositories:\n  \"..\": https://example.com/x.git\n",
            Path::new("services.yml"),
        );
        assert!(matches!(parsed, Err(ConfigError::InvalidValue { ref value, .. }) if value == ".."));

        // A registry that fails to load never gets as far as a forced re-clone
        let fake = Arc::new(FakeInvoker::new().simulating_clones());
        let repos = service(fake.clone(), &root);
        if let Ok(catalog) = parsed {
            repos
                .clone_all(
                    &catalog,
                    CloneOptions {
                        force: true,
                        include_disabled: true,
                    },
                )
                .await
                .unwrap();
        }

        assert_eq!(fake.count_matching("clone"), 0);
        assert_eq!(fs::read_to_string(root.join("precious.txt")).unwrap(), "keep");
    }

    #[tokio::test]
    async fn test_spawn_failure_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeInvoker::new().unspawnable("clone"));
        let repos = service(fake, dir.path());

        let result = repos.clone_all(&catalog(), CloneOptions::default()).await;
        assert!(matches!(result, Err(ProcessError::Spawn { .. })));
    }

    #[tokio::test]
    async fn test_status_states() {
        let dir = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeInvoker::new().on("rev-parse", 0, &["main"]));
        let repos = service(fake, dir.path());

        fs::create_dir_all(dir.path().join("services/a/.git")).unwrap();
        fs::create_dir_all(dir.path().join("services/b/.git")).unwrap();
        fs::create_dir_all(dir.path().join("services/c")).unwrap();

        let states = repos.status(&catalog()).await.unwrap();
        assert_eq!(
            states,
            vec![
                ("a".to_string(), WorkingCopyState::Present { branch: "main".into() }),
                (
                    "b".to_string(),
                    WorkingCopyState::WrongBranch {
                        expected: "dev".into(),
                        actual: "main".into()
                    }
                ),
                ("c".to_string(), WorkingCopyState::NotARepository),
                ("d".to_string(), WorkingCopyState::Absent),
            ]
        );
    }

    #[test]
    fn test_ensure_services_dir() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".gitignore"), "target/").unwrap();
        let repos = service(Arc::new(FakeInvoker::new()), dir.path());

        repos.ensure_services_dir().unwrap();
        repos.ensure_services_dir().unwrap();

        assert!(dir.path().join("services/.gitkeep").exists());
        let gitignore = fs::read_to_string(dir.path().join(".gitignore")).unwrap();
        assert_eq!(gitignore, "target/\nservices/*\n!services/.gitkeep\n");
    }
}
