//! `build-service`: source and image builds driven by services.yml

use anyhow::Result;
use colored::Colorize;

use crate::config::MissingRegistry;
use crate::domain::{BuildReport, BuildStatus, BuildStrategy, ServiceDefinition};
use crate::error::ShardctlError;
use crate::services::{BuildRequest, Orchestrator};
use crate::ui;

/// Flags of `build-service`, as parsed
#[derive(Debug, Clone, Default)]
pub struct BuildArgs {
    pub services: Vec<String>,
    pub all: bool,
    pub no_docker: bool,
    pub docker: bool,
    pub docker_only: bool,
}

impl From<BuildArgs> for BuildRequest {
    fn from(args: BuildArgs) -> Self {
        Self {
            services: args.services,
            all: args.all,
            strategy_override: args.docker_only.then_some(BuildStrategy::Docker),
            docker: args.docker,
            skip_image: args.no_docker,
        }
    }
}

pub async fn execute(orchestrator: &Orchestrator, args: BuildArgs) -> Result<()> {
    let request = BuildRequest::from(args);

    ui::print_header("Building services");
    let report = orchestrator.build_services(&request).await?;
    print_summary(&report);

    let failed = report.failures().len();
    if failed > 0 {
        return Err(ShardctlError::BatchFailed {
            operation: "build-service".to_string(),
            failed,
            total: report.results.len(),
        }
        .into());
    }
    Ok(())
}

/// `build-service --list`: registry read only, nothing is run
pub fn list(orchestrator: &Orchestrator, include_disabled: bool) -> Result<()> {
    let catalog = orchestrator.load_catalog(MissingRegistry::Fail)?;
    let services = orchestrator.builds().list(&catalog, include_disabled);

    if services.is_empty() {
        ui::print_warning("No services configured");
        return Ok(());
    }

    print!("{}", build_table(&services));
    if !include_disabled && services.len() < catalog.len() {
        ui::print_dim(&format!(
            "{} disabled service(s) hidden, use --all to show them",
            catalog.len() - services.len()
        ));
    }
    Ok(())
}

fn build_table(services: &[&ServiceDefinition]) -> String {
    let rows: Vec<Vec<String>> = services
        .iter()
        .map(|s| {
            let command = match s.build_strategy {
                BuildStrategy::Docker => s.build.docker_build_command.clone(),
                _ => s.build.build_command.clone(),
            };
            vec![
                s.name.clone(),
                if s.enabled { "yes" } else { "no" }.to_string(),
                s.build_strategy.to_string(),
                s.build.environment.as_str().to_string(),
                command.unwrap_or_else(|| "-".to_string()),
                if s.build_strategy.includes_image() {
                    s.docker_image()
                } else {
                    "-".to_string()
                },
                if s.depends_on.is_empty() {
                    "-".to_string()
                } else {
                    s.depends_on.join(", ")
                },
            ]
        })
        .collect();

    ui::render_table(
        &["SERVICE", "ENABLED", "STRATEGY", "ENV", "COMMAND", "IMAGE", "DEPENDS ON"],
        &rows,
        |column, cell| match column {
            0 => cell.cyan().to_string(),
            1 if cell == "no" => cell.dimmed().to_string(),
            _ => cell.to_string(),
        },
    )
}

fn print_summary(report: &BuildReport) {
    let count = |status: BuildStatus| report.results.iter().filter(|r| r.status == status).count();

    println!();
    println!("{}", "Summary".bold());
    println!("  Built:   {}", count(BuildStatus::Succeeded).to_string().green());
    println!("  Skipped: {}", count(BuildStatus::Skipped));
    println!("  Failed:  {}", count(BuildStatus::Failed).to_string().red());

    for result in report.failures() {
        let stage = result.stage.map(|s| s.name()).unwrap_or("-");
        println!(
            "    {} {} ({}, after {})",
            "✗".red(),
            result.service,
            stage,
            ui::format_duration(result.duration)
        );
    }
    println!();

    if report.results.is_empty() {
        ui::print_warning("No services to build");
    } else if !report.has_failures() {
        ui::print_success(&format!("{} service(s) done", report.results.len()));
    }
}
