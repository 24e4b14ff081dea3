//! `setup` / `clone`: prepare the services directory and clone repositories

use anyhow::Result;
use colored::Colorize;

use crate::domain::{CloneReport, CloneStatus};
use crate::error::{ConfigError, ShardctlError};
use crate::services::{CloneOptions, Orchestrator};
use crate::tools::{self, tools as tool_names};
use crate::ui;

pub async fn execute(
    orchestrator: &Orchestrator,
    force: bool,
    all: bool,
    create_config: bool,
) -> Result<()> {
    let registry = &orchestrator.workspace().registry_file;

    if create_config {
        orchestrator.create_registry(force)?;
        ui::print_success(&format!("Created {}", registry.display()));
        ui::print_info("Edit it, then run `shardctl setup` to clone the repositories");
        return Ok(());
    }

    if !orchestrator.workspace().registry_exists() {
        ui::print_info("Create one with `shardctl setup --create-config`");
        return Err(ShardctlError::from(ConfigError::FileNotFound {
            path: registry.clone(),
        })
        .into());
    }

    tools::require_tool(tool_names::GIT).map_err(ShardctlError::from)?;

    ui::print_header("Cloning service repositories");
    println!(
        "{} {}",
        "Services directory:".bold(),
        orchestrator.workspace().services_dir.display()
    );
    if force {
        ui::print_warning("--force: existing working copies will be removed and cloned again");
    }
    println!();

    let report = orchestrator
        .clone_services(CloneOptions {
            force,
            include_disabled: all,
        })
        .await?;

    print_summary(&report);

    let failed = report.failed().len();
    if failed > 0 {
        return Err(ShardctlError::BatchFailed {
            operation: "setup".to_string(),
            failed,
            total: report.outcomes.len(),
        }
        .into());
    }
    Ok(())
}

fn print_summary(report: &CloneReport) {
    println!();
    println!("{}", "Summary".bold());
    println!("  Cloned:  {}", report.cloned().len().to_string().green());
    println!("  Present: {}", report.skipped().len());
    println!("  Failed:  {}", report.failed().len().to_string().red());

    for outcome in &report.outcomes {
        if let CloneStatus::Failed(ref err) = outcome.status {
            println!("    {} {}", "✗".red(), err);
        }
    }
    println!();

    if report.outcomes.is_empty() {
        ui::print_warning("Nothing to clone");
    } else if !report.has_failures() {
        ui::print_success("All repositories are in place");
    }
}
