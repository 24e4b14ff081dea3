//! CLI definitions for shardctl
//!
//! This module contains all CLI argument parsing structures using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::WorkspaceOverrides;

#[derive(Parser)]
#[command(
    name = "shardctl",
    version,
    about = "Local multi-service integration workspace manager",
    long_about = "Clones service repositories into services/, builds them and drives\ndocker compose with layered, per-profile compose files."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(flatten)]
    pub workspace: WorkspaceArgs,
}

/// Workspace layout overrides, shared by every command
#[derive(Args, Debug, Clone, Default)]
pub struct WorkspaceArgs {
    /// Workspace root (defaults to the nearest directory with a compose file or services.yml)
    #[arg(long, global = true, env = "SHARDCTL_ROOT")]
    pub root: Option<PathBuf>,

    /// Service registry file
    #[arg(long, global = true, env = "SHARDCTL_REGISTRY")]
    pub registry: Option<PathBuf>,

    /// Base compose file
    #[arg(long, global = true, env = "SHARDCTL_COMPOSE_FILE")]
    pub compose_file: Option<PathBuf>,

    /// Directory the service repositories are cloned into
    #[arg(long, global = true, env = "SHARDCTL_SERVICES_DIR")]
    pub services_dir: Option<PathBuf>,
}

impl From<WorkspaceArgs> for WorkspaceOverrides {
    fn from(args: WorkspaceArgs) -> Self {
        Self {
            root: args.root,
            registry_file: args.registry,
            compose_file: args.compose_file,
            services_dir: args.services_dir,
        }
    }
}

/// Compose profile selection
#[derive(Args, Debug, Clone, Default)]
pub struct ProfileArgs {
    /// Compose profile; layers docker-compose.<profile>.yml when present
    #[arg(short, long)]
    pub profile: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Clone service repositories into the services directory
    #[command(alias = "clone")]
    Setup {
        /// Remove existing working copies and clone them again
        #[arg(short, long)]
        force: bool,

        /// Also clone services marked `enabled: false`
        #[arg(long)]
        all: bool,

        /// Write an example services.yml instead of cloning
        #[arg(long)]
        create_config: bool,
    },

    /// Start services (detached unless --foreground)
    Up {
        /// Services to start (default: all)
        services: Vec<String>,

        /// Stay attached to container output
        #[arg(short, long)]
        foreground: bool,

        /// Build images before starting
        #[arg(short, long)]
        build: bool,

        #[command(flatten)]
        profile: ProfileArgs,
    },

    /// Stop and remove containers
    Down {
        /// Also remove named volumes
        #[arg(long)]
        volumes: bool,

        /// Keep containers for services no longer in the compose files
        #[arg(long)]
        keep_orphans: bool,

        #[command(flatten)]
        profile: ProfileArgs,
    },

    /// Restart services
    Restart {
        services: Vec<String>,

        #[command(flatten)]
        profile: ProfileArgs,
    },

    /// Show container status and working copy state
    Status {
        /// Output format (text, json)
        #[arg(long, default_value = "text")]
        format: String,

        #[command(flatten)]
        profile: ProfileArgs,
    },

    /// Raw `docker compose ps`
    Ps {
        services: Vec<String>,

        #[command(flatten)]
        profile: ProfileArgs,
    },

    /// Show service logs
    Logs {
        services: Vec<String>,

        /// Follow log output
        #[arg(short, long)]
        follow: bool,

        /// Number of lines from the end of the logs
        #[arg(short = 'n', long)]
        tail: Option<u32>,

        #[command(flatten)]
        profile: ProfileArgs,
    },

    /// Build compose images
    Build {
        services: Vec<String>,

        /// Do not use the image build cache
        #[arg(long)]
        no_cache: bool,

        #[command(flatten)]
        profile: ProfileArgs,
    },

    /// Build services from source and/or as images using services.yml
    BuildService {
        /// Services to build (disabled services may be named)
        services: Vec<String>,

        /// Build every enabled service
        #[arg(short, long)]
        all: bool,

        /// Skip image builds
        #[arg(long, conflicts_with_all = ["docker", "docker_only"])]
        no_docker: bool,

        /// Add an image build even where none is configured
        #[arg(long, conflicts_with = "docker_only")]
        docker: bool,

        /// Build images only, without a source build
        #[arg(long)]
        docker_only: bool,

        /// List services with build configuration and exit
        #[arg(short, long)]
        list: bool,
    },

    /// Pull service images
    Pull {
        services: Vec<String>,

        #[command(flatten)]
        profile: ProfileArgs,
    },

    /// Run a command inside a running service container
    Exec {
        /// Target service
        service: String,

        /// Command and arguments
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,

        /// Disable pseudo-TTY allocation (automatic when stdin is not a terminal)
        #[arg(short = 'T', long)]
        no_tty: bool,

        #[command(flatten)]
        profile: ProfileArgs,
    },

    /// Open an interactive shell in a service container
    Shell {
        service: String,

        /// Shell to run
        #[arg(short, long, default_value = "/bin/bash")]
        shell: String,

        #[command(flatten)]
        profile: ProfileArgs,
    },

    /// Pass arguments straight to docker compose with the layered files
    Compose {
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,

        #[command(flatten)]
        profile: ProfileArgs,
    },
}
