use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;
mod config;
mod domain;
mod error;
mod infrastructure;
mod repo;
mod services;
mod tools;
mod ui;

use cli::{Cli, Commands};
use commands::build::BuildArgs;
use commands::status::OutputFormat;
use config::WorkspaceConfig;
use error::{ShardctlError, UsageError};
use infrastructure::{ComposeVerb, SystemInvoker};
use services::Orchestrator;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging with LOGGING env var support
    // LOGGING=debug,info,warn,error or just LOGGING=debug
    let log_level = std::env::var("LOGGING")
        .or_else(|_| std::env::var("LOG_LEVEL"))
        .unwrap_or_else(|_| {
            if cli.verbose {
                "debug".to_string()
            } else {
                "info".to_string()
            }
        });

    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_ansi(false)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            ui::print_error(&format!("{:#}", e));
            ExitCode::from(exit_code(&e))
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let workspace = WorkspaceConfig::discover(cli.workspace.into())?;
    tracing::debug!("Workspace root: {}", workspace.root_dir.display());
    let orchestrator = Orchestrator::new(workspace, Arc::new(SystemInvoker::new()));

    match cli.command {
        Commands::Setup {
            force,
            all,
            create_config,
        } => commands::setup::execute(&orchestrator, force, all, create_config).await,

        Commands::Up {
            services,
            foreground,
            build,
            profile,
        } => {
            let verb = ComposeVerb::Up {
                detach: !foreground,
                build,
            };
            commands::lifecycle::execute(&orchestrator, verb, services, profile.profile).await
        }

        Commands::Down {
            volumes,
            keep_orphans,
            profile,
        } => {
            let verb = ComposeVerb::Down {
                volumes,
                remove_orphans: !keep_orphans,
            };
            commands::lifecycle::execute(&orchestrator, verb, Vec::new(), profile.profile).await
        }

        Commands::Restart { services, profile } => {
            commands::lifecycle::execute(&orchestrator, ComposeVerb::Restart, services, profile.profile)
                .await
        }

        Commands::Status { format, profile } => {
            commands::status::execute(&orchestrator, profile.profile, OutputFormat::from_str(&format))
                .await
        }

        Commands::Ps { services, profile } => {
            commands::lifecycle::execute(&orchestrator, ComposeVerb::Ps, services, profile.profile)
                .await
        }

        Commands::Logs {
            services,
            follow,
            tail,
            profile,
        } => {
            let verb = ComposeVerb::Logs { follow, tail };
            commands::lifecycle::execute(&orchestrator, verb, services, profile.profile).await
        }

        Commands::Build {
            services,
            no_cache,
            profile,
        } => {
            let verb = ComposeVerb::Build { no_cache };
            commands::lifecycle::execute(&orchestrator, verb, services, profile.profile).await
        }

        Commands::BuildService {
            services,
            all,
            no_docker,
            docker,
            docker_only,
            list,
        } => {
            if list {
                commands::build::list(&orchestrator, all)
            } else {
                let args = BuildArgs {
                    services,
                    all,
                    no_docker,
                    docker,
                    docker_only,
                };
                commands::build::execute(&orchestrator, args).await
            }
        }

        Commands::Pull { services, profile } => {
            commands::lifecycle::execute(&orchestrator, ComposeVerb::Pull, services, profile.profile)
                .await
        }

        Commands::Exec {
            service,
            command,
            no_tty,
            profile,
        } => {
            let verb = ComposeVerb::Exec {
                command,
                tty: commands::lifecycle::wants_tty(no_tty),
            };
            commands::lifecycle::execute(&orchestrator, verb, vec![service], profile.profile).await
        }

        Commands::Shell {
            service,
            shell,
            profile,
        } => {
            let verb = ComposeVerb::Shell {
                shell,
                tty: commands::lifecycle::wants_tty(false),
            };
            commands::lifecycle::execute(&orchestrator, verb, vec![service], profile.profile).await
        }

        Commands::Compose { args, profile } => {
            let verb = ComposeVerb::Raw { args };
            commands::lifecycle::execute(&orchestrator, verb, Vec::new(), profile.profile).await
        }
    }
}

/// Usage errors exit 2, engine failures forward the engine's code, the rest exit 1
fn exit_code(err: &anyhow::Error) -> u8 {
    if let Some(e) = err.downcast_ref::<ShardctlError>() {
        e.exit_code()
    } else if err.downcast_ref::<UsageError>().is_some() {
        2
    } else {
        1
    }
}
