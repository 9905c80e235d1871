//! `warden status`: session, process and port state per server.

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use warden_supervisor::{ServerRuntimeStatus, SupervisorError};

use super::context;

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl StatusArgs {
    pub async fn run(self) -> Result<()> {
        let controller = context::controller()?;
        let results = controller.status_all().await;

        if self.json {
            print_json(&results)?;
        } else if results.is_empty() {
            println!("{}", "No servers configured.".yellow());
        } else {
            print_table(&results);
        }

        let failed = results.iter().filter(|(_, r)| r.is_err()).count();
        if failed > 0 {
            bail!("{failed} of {} servers could not be probed", results.len());
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct StatusEntryJson<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<&'a ServerRuntimeStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Tabled)]
struct StatusTableRow {
    #[tabled(rename = "server")]
    name: String,
    #[tabled(rename = "type")]
    kind: String,
    #[tabled(rename = "status")]
    status: String,
    #[tabled(rename = "port")]
    port: String,
    #[tabled(rename = "pid")]
    pid: String,
    #[tabled(rename = "uptime")]
    uptime: String,
    #[tabled(rename = "memory")]
    memory: String,
}

type StatusResults = [(String, Result<ServerRuntimeStatus, SupervisorError>)];

fn print_json(results: &StatusResults) -> Result<()> {
    let entries: Vec<StatusEntryJson<'_>> = results
        .iter()
        .map(|(name, result)| StatusEntryJson {
            name,
            status: result.as_ref().ok(),
            error: result.as_ref().err().map(ToString::to_string),
        })
        .collect();
    println!(
        "{}",
        serde_json::to_string_pretty(&entries).context("failed to render status JSON")?
    );
    Ok(())
}

fn print_table(results: &StatusResults) {
    let dash = || "-".to_string();
    let rows: Vec<StatusTableRow> = results
        .iter()
        .map(|(name, result)| match result {
            Ok(s) => StatusTableRow {
                name: name.clone(),
                kind: if s.proxy {
                    "proxy".to_string()
                } else {
                    s.server_type.clone()
                },
                status: if s.port_conflict() {
                    "stopped (port busy)".to_string()
                } else {
                    s.status.to_string()
                },
                port: s.port.map(|p| p.to_string()).unwrap_or_else(dash),
                pid: s.pid.map(|p| p.to_string()).unwrap_or_else(dash),
                uptime: s.uptime.clone().unwrap_or_else(dash),
                memory: s
                    .memory_mb
                    .map(|mb| format!("{mb} MB"))
                    .unwrap_or_else(dash),
            },
            Err(err) => StatusTableRow {
                name: name.clone(),
                kind: dash(),
                status: format!("error: {err}"),
                port: dash(),
                pid: dash(),
                uptime: dash(),
                memory: dash(),
            },
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");

    let running = results
        .iter()
        .filter(|(_, r)| r.as_ref().is_ok_and(ServerRuntimeStatus::is_running))
        .count();
    let busy = results
        .iter()
        .filter(|(_, r)| r.as_ref().is_ok_and(ServerRuntimeStatus::port_conflict))
        .count();
    let failed = results.iter().filter(|(_, r)| r.is_err()).count();

    let mut summary = format!("{running}/{} running", results.len());
    if busy > 0 {
        summary.push_str(&format!(", {busy} with a busy port"));
    }
    if failed > 0 {
        summary.push_str(&format!(", {failed} could not be probed"));
    }
    if busy > 0 || failed > 0 {
        println!("{}", summary.yellow());
    } else {
        println!("{}", summary.green());
    }
}
