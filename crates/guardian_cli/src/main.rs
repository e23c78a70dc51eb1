//! Guardian CLI - snapshot organization members' public repositories and
//! report what changed since the last run.

mod commands;
mod config;
mod logging;
mod notify;
mod progress;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::commands::limits::OutputFormat;
use crate::commands::scan::ScanArgs;

#[derive(Parser)]
#[command(name = "guardian")]
#[command(version)]
#[command(about = "Watch organization members' public repositories for new commits")]
#[command(
    long_about = "Guardian snapshots every public repository and branch head owned by the \
members of one or more GitHub organizations, diffs the snapshot against the previous run, \
and writes the updated commits, new repositories and new branches for a secret scanner."
)]
#[command(after_long_help = r#"EXAMPLES
    Scan the members of two organizations:
        $ guardian scan acme acme-labs

    Fetch and diff without writing results:
        $ guardian scan acme --dry-run

    Report new repositories without running the secret scanner:
        $ guardian scan acme --no-scan

    Compare two earlier runs:
        $ guardian diff scan_results/2025-08-10_07-00-00/commit_hash.json \
                        scan_results/2025-08-11_07-00-00/commit_hash.json

    Show the remaining GraphQL budget:
        $ guardian limits

CONFIGURATION
    Guardian reads configuration from:
      1. ~/.config/guardian/config.toml (or $XDG_CONFIG_HOME/guardian/config.toml)
      2. ./guardian.toml
      3. Environment variables (GUARDIAN_* prefix)
      4. .env file in current directory

ENVIRONMENT VARIABLES
    GUARDIAN_GITHUB_TOKEN        GitHub token (GITHUB_TOKEN is used if unset)
    GUARDIAN_GITHUB__GRAPHQL_URL GraphQL endpoint
    GUARDIAN_SCAN__ORGANIZATIONS Comma-separated organizations
    GUARDIAN_SCAN__WORKERS       Members fetched concurrently
    GUARDIAN_SCAN__RESULTS_DIR   Root of the run directories
    RUST_LOG                     Log filter (default: guardian=info,guardian_cli=info)
"#)]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Snapshot all members, diff against the previous run and write the results
    Scan(ScanArgs),
    /// Diff two persisted snapshots without touching the network
    Diff {
        /// Older commit_hash.json
        previous: PathBuf,
        /// Newer commit_hash.json
        current: PathBuf,
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        output: OutputFormat,
    },
    /// Show current GraphQL rate limit status
    Limits {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        output: OutputFormat,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = config::Config::load()?;
    let _log_guard = logging::init(&config.logging, cli.json_logs)?;

    match cli.command {
        // No scanner implementation ships with the CLI yet.
        Commands::Scan(args) => commands::scan::handle_scan(args, &config, None).await?,
        Commands::Diff {
            previous,
            current,
            output,
        } => commands::diff::handle_diff(&previous, &current, output)?,
        Commands::Limits { output } => commands::limits::handle_limits(output, &config).await?,
    }

    Ok(())
}
