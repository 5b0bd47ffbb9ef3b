//! SMIG - Bitbucket Server to Bitbucket Cloud migration CLI.
//!
//! One subcommand per migration stage. Stages are run in order by the
//! operator and are individually safe to re-run; the CSV interchange files
//! under the configured data directory carry state between stages.

#![forbid(unsafe_code)]

mod commands;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use smig_common::MigrationConfig;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(name = "smig")]
#[command(author, version, about = "Bitbucket Server to Bitbucket Cloud migration toolkit")]
struct Cli {
    /// Path to the migration configuration file
    #[arg(short, long, default_value = "smig.toml", env = "SMIG_CONFIG")]
    config: PathBuf,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch both repository inventories and write the merged correspondence
    Inventory,
    /// Fetch both user inventories and write the user correspondence
    ExportUsers,
    /// Clone matched repositories and push content (and LFS) to the cloud
    Mirror,
    /// Rewrite server clone URLs inside working trees, commit and push
    RewriteRefs,
    /// Apply the branching model and branch restrictions to matched repos
    SyncBranchPolicy,
    /// Copy default reviewers from server repositories to the cloud
    SyncReviewers,
    /// Create workspace groups from the membership export
    TransferGroups,
    /// Add users to workspace groups from the membership export
    AddMemberships,
    /// Replay project- and repository-level permissions onto the cloud
    TransferPermissions,
    /// Migrate personal repositories, one cloud repo per owner/slug pair
    TransferPersonalRepos,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let config = MigrationConfig::load(&cli.config)
        .with_context(|| format!("loading configuration from {}", cli.config.display()))?;

    match cli.command {
        Command::Inventory => commands::inventory::run(&config),
        Command::ExportUsers => commands::users::run(&config),
        Command::Mirror => commands::mirror::run(&config),
        Command::RewriteRefs => commands::rewrite::run(&config),
        Command::SyncBranchPolicy => commands::branches::run(&config),
        Command::SyncReviewers => commands::reviewers::run(&config),
        Command::TransferGroups => commands::groups::transfer_groups(&config),
        Command::AddMemberships => commands::groups::add_memberships(&config),
        Command::TransferPermissions => commands::permissions::run(&config),
        Command::TransferPersonalRepos => commands::personal::run(&config),
    }
}
