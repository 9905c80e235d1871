//! Warden: game server supervisor and backup tool.
//!
//! # Usage
//!
//! ```text
//! warden start <server> [--no-attach]
//! warden stop <server> [--force]
//! warden restart <server>
//! warden status [--json]
//! warden send <server> <command...>
//! warden console <server>
//! warden logs <server> [lines]
//! warden backup <server>
//! warden restore <server> <file> [--force]
//! warden list [server]
//! warden cleanup [server] [days]
//! warden server list|add|remove
//! ```

mod commands;

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;

use commands::{
    backup::{BackupArgs, CleanupArgs, ListArgs, RestoreArgs},
    lifecycle::{ConsoleArgs, RestartArgs, SendArgs, StartArgs, StopArgs},
    logs::LogsArgs,
    server::ServerCommand,
    status::StatusArgs,
};

/// Log filter variable; defaults to `warn` so command output stays clean.
const LOG_ENV: &str = "WARDEN_LOG";

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "warden",
    version,
    about = "Run, stop and back up game servers inside screen sessions",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start a server in a detached session and attach to its console.
    Start(StartArgs),

    /// Stop a server, gracefully unless --force is given.
    Stop(StopArgs),

    /// Stop (if running) and start a server again.
    Restart(RestartArgs),

    /// Show the state of every configured server.
    Status(StatusArgs),

    /// Type a command into a server console.
    Send(SendArgs),

    /// Attach to a running server console.
    Console(ConsoleArgs),

    /// Print the tail of a server's latest log.
    Logs(LogsArgs),

    /// Archive a server directory.
    Backup(BackupArgs),

    /// Replace a server directory with the contents of a backup.
    Restore(RestoreArgs),

    /// List backups, newest first.
    List(ListArgs),

    /// Delete backups older than a number of days.
    Cleanup(CleanupArgs),

    /// Manage server definitions in the configuration file.
    Server {
        #[command(subcommand)]
        command: ServerCommand,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {err:#}", "Error:".red().bold());
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Start(args) => args.run().await,
        Commands::Stop(args) => args.run().await,
        Commands::Restart(args) => args.run().await,
        Commands::Status(args) => args.run().await,
        Commands::Send(args) => args.run().await,
        Commands::Console(args) => args.run().await,
        Commands::Logs(args) => args.run(),
        Commands::Backup(args) => args.run().await,
        Commands::Restore(args) => args.run().await,
        Commands::List(args) => args.run(),
        Commands::Cleanup(args) => args.run(),
        Commands::Server { command } => commands::server::run(command),
    }
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
