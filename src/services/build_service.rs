//! Build pipeline - source and image builds for registered services
//!
//! Per service, in order: source stage (pre-build steps, then
//! `build_command`), then image stage (docker pre-build steps, then
//! `docker_build_command` or a plain `docker build`). A failed source stage
//! skips that service's image stage. Services never affect each other.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use colored::Colorize;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::domain::{
    BuildEnvironment, BuildReport, BuildResult, BuildStage, BuildStrategy, ServiceCatalog,
    ServiceDefinition,
};
use crate::error::{BuildCause, BuildError, BuildStageKind, ProcessError, ShardctlError, UsageError};
use crate::infrastructure::{OutputMode, ProcessCommand, ProcessInvoker, ProcessOutcome};
use crate::tools::{get_tool_path, tools};
use crate::ui;

/// Output lines shown for a failed build
const FAILURE_TAIL_LINES: usize = 20;

/// What to build and how
#[derive(Debug, Clone, Default)]
pub struct BuildRequest {
    /// Explicit targets; disabled services may be named
    pub services: Vec<String>,
    /// Build every enabled service when no names are given
    pub all: bool,
    /// Replaces each service's configured strategy
    pub strategy_override: Option<BuildStrategy>,
    /// Add an image stage to every target
    pub docker: bool,
    /// Drop the image stage from every target
    pub skip_image: bool,
}

impl BuildRequest {
    fn effective_strategy(&self, service: &ServiceDefinition) -> BuildStrategy {
        let strategy = self.strategy_override.unwrap_or(service.build_strategy);
        if self.skip_image {
            strategy.without_image()
        } else if self.docker {
            strategy.with_image()
        } else {
            strategy
        }
    }
}

struct StageFailure {
    cause: BuildCause,
    outcome: ProcessOutcome,
}

pub struct BuildService {
    invoker: Arc<dyn ProcessInvoker>,
    services_dir: PathBuf,
    sh: String,
    nix: String,
    docker: String,
    nix_available: OnceCell<bool>,
}

impl BuildService {
    pub fn new(invoker: Arc<dyn ProcessInvoker>, services_dir: impl Into<PathBuf>) -> Self {
        Self {
            invoker,
            services_dir: services_dir.into(),
            sh: get_tool_path(tools::SH),
            nix: get_tool_path(tools::NIX),
            docker: get_tool_path(tools::DOCKER),
            nix_available: OnceCell::new(),
        }
    }

    /// Services shown by `build-service --list`
    pub fn list<'a>(
        &self,
        catalog: &'a ServiceCatalog,
        include_disabled: bool,
    ) -> Vec<&'a ServiceDefinition> {
        catalog.bulk_targets(include_disabled)
    }

    /// Resolve targets, then build each in turn
    pub async fn build(
        &self,
        catalog: &ServiceCatalog,
        request: &BuildRequest,
    ) -> Result<BuildReport, ShardctlError> {
        let targets = if !request.services.is_empty() {
            catalog.select(&request.services)?
        } else if request.all {
            catalog.list_enabled()
        } else {
            return Err(UsageError::NoTargets.into());
        };

        let mut report = BuildReport::default();
        for service in targets {
            let strategy = request.effective_strategy(service);
            println!(
                "{} {} ({})",
                "▶".cyan(),
                service.name.bold(),
                strategy.as_str().dimmed()
            );

            let result = self.build_one(service, strategy).await?;
            print_result(&result);

            let interrupted = matches!(
                result.error,
                Some(BuildError {
                    cause: BuildCause::Interrupted,
                    ..
                })
            );
            report.push(result);
            if interrupted {
                warn!("Interrupted, not building remaining services");
                break;
            }
        }
        Ok(report)
    }

    async fn build_one(
        &self,
        service: &ServiceDefinition,
        strategy: BuildStrategy,
    ) -> Result<BuildResult, ProcessError> {
        let start = Instant::now();
        let reached = match strategy {
            BuildStrategy::None => {
                info!("{}: nothing to build", service.name);
                return Ok(BuildResult::skipped(&service.name));
            }
            BuildStrategy::Source => BuildStage::Source,
            BuildStrategy::Docker => BuildStage::Image,
            BuildStrategy::Both => BuildStage::Both,
        };
        let first_stage = if strategy.includes_source() {
            (BuildStage::Source, BuildStageKind::Source)
        } else {
            (BuildStage::Image, BuildStageKind::Image)
        };

        let dir = service.build_dir(&self.services_dir);
        if !dir.is_dir() {
            let error = BuildError::new(
                &service.name,
                first_stage.1,
                BuildCause::MissingWorkingCopy { path: dir },
            );
            return Ok(BuildResult::failure(
                first_stage.0,
                error,
                None,
                Vec::new(),
                start.elapsed(),
            ));
        }

        let use_nix = self.use_nix(service).await?;
        let spec = &service.build;

        if strategy.includes_source() {
            let Some(ref command) = spec.build_command else {
                let error =
                    BuildError::new(&service.name, BuildStageKind::Source, BuildCause::NoBuildCommand);
                return Ok(BuildResult::failure(
                    BuildStage::Source,
                    error,
                    None,
                    Vec::new(),
                    start.elapsed(),
                ));
            };

            let main = self.script(command, use_nix);
            let stage = self
                .run_stage(&service.name, &spec.pre_build_steps, main, command, &dir, use_nix)
                .await?;
            if let Err(failure) = stage {
                return Ok(stage_failure(service, BuildStageKind::Source, failure, start));
            }

            if let Some(ref binary) = spec.binary_path {
                let path = dir.join(binary);
                if path.exists() {
                    ui::print_dim(&format!("  Binary: {}", path.display()));
                } else {
                    debug!("Expected binary {} not found", path.display());
                }
            }
        }

        if strategy.includes_image() {
            let image = service.docker_image();
            let (main, label) = match spec.docker_build_command {
                Some(ref command) => (self.script(command, use_nix), command.clone()),
                None => {
                    let cmd = ProcessCommand::new(&self.docker).args(["build", "-t", image.as_str(), "."]);
                    let label = cmd.display();
                    (cmd, label)
                }
            };

            let stage = self
                .run_stage(
                    &service.name,
                    &spec.docker_pre_build_steps,
                    main,
                    &label,
                    &dir,
                    use_nix,
                )
                .await?;
            if let Err(failure) = stage {
                return Ok(stage_failure(service, BuildStageKind::Image, failure, start));
            }
            info!("{}: image {} built", service.name, image);
        }

        Ok(BuildResult::success(&service.name, reached, start.elapsed()))
    }

    /// Pre-build steps, then the stage's main command, all in `dir`
    async fn run_stage(
        &self,
        service: &str,
        pre_steps: &[String],
        main: ProcessCommand,
        label: &str,
        dir: &Path,
        use_nix: bool,
    ) -> Result<Result<(), StageFailure>, ProcessError> {
        for step in pre_steps {
            ui::print_dim(&format!("  $ {}", step));
            let outcome = self.run_in(self.script(step, use_nix), dir, service).await?;
            if !outcome.success() {
                let cause = if outcome.cancelled {
                    BuildCause::Interrupted
                } else {
                    BuildCause::PreBuildStepFailed {
                        step: step.clone(),
                        code: outcome.exit_code,
                    }
                };
                return Ok(Err(StageFailure { cause, outcome }));
            }
        }

        ui::print_dim(&format!("  $ {}", label));
        let outcome = self.run_in(main, dir, service).await?;
        if !outcome.success() {
            let cause = if outcome.cancelled {
                BuildCause::Interrupted
            } else {
                BuildCause::CommandFailed {
                    command: label.to_string(),
                    code: outcome.exit_code,
                }
            };
            return Ok(Err(StageFailure { cause, outcome }));
        }
        Ok(Ok(()))
    }

    async fn run_in(
        &self,
        command: ProcessCommand,
        dir: &Path,
        service: &str,
    ) -> Result<ProcessOutcome, ProcessError> {
        let command = command.current_dir(dir);
        let pb = ui::spinner(format!("Building {}", service));
        let outcome = self.invoker.run(&command, OutputMode::Capture).await;
        pb.finish_and_clear();
        outcome
    }

    /// `sh -c <script>`, or `nix develop --command bash -c <script>`
    fn script(&self, script: &str, use_nix: bool) -> ProcessCommand {
        if use_nix {
            ProcessCommand::new(&self.nix).args(["develop", "--command", "bash", "-c", script])
        } else {
            ProcessCommand::shell(&self.sh, script)
        }
    }

    async fn use_nix(&self, service: &ServiceDefinition) -> Result<bool, ProcessError> {
        if service.build.environment != BuildEnvironment::Nix {
            return Ok(false);
        }
        let available = *self
            .nix_available
            .get_or_try_init(|| async {
                let cmd = ProcessCommand::new(&self.nix).arg("--version");
                match self.invoker.run(&cmd, OutputMode::Capture).await {
                    Ok(outcome) => Ok(outcome.success()),
                    Err(ProcessError::Spawn { .. }) => Ok(false),
                    Err(e) => Err(e),
                }
            })
            .await?;

        if !available {
            warn!(
                "{}: nix not found, building without the nix environment",
                service.name
            );
        }
        Ok(available)
    }
}

fn stage_failure(
    service: &ServiceDefinition,
    kind: BuildStageKind,
    failure: StageFailure,
    start: Instant,
) -> BuildResult {
    let stage = match kind {
        BuildStageKind::Source => BuildStage::Source,
        BuildStageKind::Image => BuildStage::Image,
    };
    BuildResult::failure(
        stage,
        BuildError::new(&service.name, kind, failure.cause),
        failure.outcome.exit_code,
        failure.outcome.last_lines(FAILURE_TAIL_LINES),
        start.elapsed(),
    )
}

fn print_result(result: &BuildResult) {
    let took = ui::format_duration(result.duration);
    match (&result.error, result.stage) {
        (Some(error), _) => {
            println!("  {} {}", "✗".red(), error.to_string().red());
            for line in &result.output_tail {
                println!("    {}", line.dimmed());
            }
        }
        (None, Some(stage)) => println!(
            "  {} {} built ({}) in {}",
            "✓".green(),
            result.service,
            stage.name(),
            took
        ),
        (None, None) => println!("  {} {} nothing to build", "•".dimmed(), result.service),
    }
}
