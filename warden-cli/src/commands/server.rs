//! `warden server list|add|remove`: edit server definitions.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use warden_core::types::ServerDefinition;
use warden_core::validate::validate_port;

use super::context;

#[derive(Subcommand, Debug)]
pub enum ServerCommand {
    /// List configured servers.
    List,

    /// Add a server definition.
    Add(AddArgs),

    /// Remove a server definition. Files on disk are left alone.
    Remove(RemoveArgs),
}

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Server name; also the screen session name.
    pub name: String,

    /// Server directory (containing the jar and server.properties).
    #[arg(long)]
    pub path: PathBuf,

    /// Resource profile to launch with.
    #[arg(long = "type", short = 't', value_name = "PROFILE", default_value = "spigot-params")]
    pub server_type: String,

    /// Listening port written into server.properties on start.
    #[arg(long, short, allow_negative_numbers = true)]
    pub port: Option<i64>,
}

#[derive(Args, Debug)]
pub struct RemoveArgs {
    pub name: String,
}

#[derive(Tabled)]
struct ServerRow {
    #[tabled(rename = "server")]
    name: String,
    #[tabled(rename = "type")]
    kind: String,
    #[tabled(rename = "port")]
    port: String,
    #[tabled(rename = "path")]
    path: String,
}

pub fn run(cmd: ServerCommand) -> Result<()> {
    match cmd {
        ServerCommand::List => list(),
        ServerCommand::Add(args) => add(args),
        ServerCommand::Remove(args) => remove(args),
    }
}

fn list() -> Result<()> {
    let store = context::load_config()?;
    let servers = &store.config().servers;
    if servers.is_empty() {
        println!("{}", "No servers configured.".yellow());
        println!("Run: warden server add <name> --path <dir>");
        return Ok(());
    }

    let rows = servers.iter().map(|(name, def)| ServerRow {
        name: name.clone(),
        kind: def.server_type.clone(),
        port: def.port.map(|p| p.to_string()).unwrap_or_else(|| "-".into()),
        path: def.path.display().to_string(),
    });
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
    Ok(())
}

fn add(args: AddArgs) -> Result<()> {
    let mut store = context::load_config()?;
    let port = args.port.map(validate_port).transpose()?;
    let path = std::path::absolute(&args.path)
        .with_context(|| format!("invalid server path {}", args.path.display()))?;

    store.add_server(
        &args.name,
        ServerDefinition {
            server_type: args.server_type,
            path,
            port,
        },
    )?;
    store
        .save()
        .with_context(|| format!("failed to write {}", store.path().display()))?;

    println!("{}", format!("✓ Added server '{}'", args.name).green());
    Ok(())
}

fn remove(args: RemoveArgs) -> Result<()> {
    let mut store = context::load_config()?;
    store.remove_server(&args.name)?;
    store
        .save()
        .with_context(|| format!("failed to write {}", store.path().display()))?;
    println!("{}", format!("✓ Removed server '{}'", args.name).green());
    Ok(())
}
