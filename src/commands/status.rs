//! Status command for showing containers and working copies
//!
//! Containers come from `docker compose ps --format json`; working copies
//! are only shown when a registry exists.

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;

use crate::domain::{ContainerStatus, WorkingCopyState};
use crate::services::Orchestrator;
use crate::ui;

/// Output format for status command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Text,
        }
    }
}

#[derive(Debug, Serialize)]
struct StatusReport<'a> {
    containers: &'a [ContainerStatus],
    #[serde(skip_serializing_if = "Option::is_none")]
    working_copies: Option<Vec<WorkingCopyRow>>,
}

#[derive(Debug, Serialize)]
struct WorkingCopyRow {
    service: String,
    state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    branch: Option<String>,
}

impl WorkingCopyRow {
    fn new(service: &str, state: &WorkingCopyState) -> Self {
        let (label, branch) = match state {
            WorkingCopyState::Absent => ("absent", None),
            WorkingCopyState::Present { branch } => ("present", Some(branch.clone())),
            WorkingCopyState::WrongBranch { actual, .. } => ("wrong-branch", Some(actual.clone())),
            WorkingCopyState::NotARepository => ("not-a-repository", None),
        };
        Self {
            service: service.to_string(),
            state: label.to_string(),
            branch,
        }
    }
}

pub async fn execute(
    orchestrator: &Orchestrator,
    profile: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    orchestrator.preflight().await?;

    let containers = orchestrator.container_status(profile.as_deref()).await?;
    let working_copies = orchestrator.working_copy_status().await?;

    match format {
        OutputFormat::Json => {
            let report = StatusReport {
                containers: &containers,
                working_copies: working_copies.as_ref().map(|states| {
                    states
                        .iter()
                        .map(|(name, state)| WorkingCopyRow::new(name, state))
                        .collect()
                }),
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Text => {
            ui::print_header("Service status");
            print!("{}", container_table(&containers));
            if let Some(states) = working_copies {
                println!();
                println!("{}", "Working copies".bold());
                print!("{}", working_copy_table(&states));
            }
        }
    }
    Ok(())
}

fn container_table(containers: &[ContainerStatus]) -> String {
    if containers.is_empty() {
        return format!("{}\n", "No containers running".dimmed());
    }

    let rows: Vec<Vec<String>> = containers
        .iter()
        .map(|c| {
            vec![
                c.service.clone(),
                c.name.clone(),
                c.state.clone(),
                c.status.clone(),
                c.ports(),
            ]
        })
        .collect();

    ui::render_table(
        &["SERVICE", "CONTAINER", "STATE", "STATUS", "PORTS"],
        &rows,
        |column, cell| match column {
            0 => cell.cyan().to_string(),
            2 if cell == "running" => cell.green().to_string(),
            2 => cell.yellow().to_string(),
            _ => cell.to_string(),
        },
    )
}

fn working_copy_table(states: &[(String, WorkingCopyState)]) -> String {
    if states.is_empty() {
        return format!("{}\n", "No services registered".dimmed());
    }

    let rows: Vec<Vec<String>> = states
        .iter()
        .map(|(name, state)| vec![name.clone(), state.label()])
        .collect();

    ui::render_table(&["SERVICE", "WORKING COPY"], &rows, |column, cell| {
        match column {
            1 if cell.starts_with("present") => cell.green().to_string(),
            1 if cell == "absent" => cell.dimmed().to_string(),
            1 => cell.yellow().to_string(),
            _ => cell.to_string(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_table() {
        colored::control::set_override(false);
        let containers = vec![ContainerStatus {
            name: "ws-web-1".into(),
            service: "web".into(),
            state: "running".into(),
            status: "Up 5 minutes".into(),
            publishers: None,
        }];

        let table = container_table(&containers);
        let lines: Vec<&str> = table.lines().collect();
        assert!(lines[0].starts_with("SERVICE"));
        assert!(lines[1].starts_with("web "));
        assert!(lines[1].ends_with("N/A"));
        assert_eq!(container_table(&[]), "No containers running\n");
    }

    #[test]
    fn test_working_copy_json_rows() {
        let row = WorkingCopyRow::new(
            "api",
            &WorkingCopyState::WrongBranch {
                expected: "main".into(),
                actual: "dev".into(),
            },
        );
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["state"], "wrong-branch");
        assert_eq!(json["branch"], "dev");

        let absent = serde_json::to_value(WorkingCopyRow::new("b", &WorkingCopyState::Absent)).unwrap();
        assert!(absent.get("branch").is_none());
    }

    #[test]
    fn test_output_format() {
        assert_eq!(OutputFormat::from_str("JSON"), OutputFormat::Json);
        assert_eq!(OutputFormat::from_str("table"), OutputFormat::Text);
    }
}
