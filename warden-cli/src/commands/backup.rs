//! `warden backup|restore|list|cleanup`

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use warden_backup::BackupRecord;

use super::context;

const DEFAULT_KEEP_DAYS: u32 = 30;

#[derive(Args, Debug)]
pub struct BackupArgs {
    pub server: String,
}

impl BackupArgs {
    pub async fn run(self) -> Result<()> {
        let orchestrator = context::orchestrator()?;
        println!("{}", format!("Creating backup for {}...", self.server).blue());
        let outcome = orchestrator.create_backup(&self.server).await?;
        println!("{}", "Backup created successfully".green());
        println!("{}", format!("File: {}", outcome.path.display()).dimmed());
        println!("{}", format!("Size: {}", outcome.size).dimmed());
        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct RestoreArgs {
    pub server: String,

    /// Archive path, or a filename inside the backup directory.
    pub file: String,

    /// Stop the server first if it is running.
    #[arg(long, short)]
    pub force: bool,
}

impl RestoreArgs {
    pub async fn run(self) -> Result<()> {
        let orchestrator = context::orchestrator()?;
        println!(
            "{}",
            format!("Restoring {} from {}...", self.server, self.file).blue()
        );
        let outcome = orchestrator
            .restore_backup(&self.server, &self.file, self.force)
            .await?;
        println!("{}", "Backup restored successfully".green());
        println!(
            "{}",
            format!("Server path: {}", outcome.server_path.display()).dimmed()
        );
        if let Some(snapshot) = outcome.snapshot {
            println!(
                "{}",
                format!("Previous contents saved to: {}", snapshot.display()).dimmed()
            );
        }
        println!(
            "{}",
            format!("You can now start the server: warden start {}", self.server).yellow()
        );
        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only show backups of this server.
    pub server: Option<String>,
}

#[derive(Tabled)]
struct BackupRow {
    #[tabled(rename = "filename")]
    filename: String,
    #[tabled(rename = "size")]
    size: String,
    #[tabled(rename = "created (UTC)")]
    created: String,
}

impl From<&BackupRecord> for BackupRow {
    fn from(record: &BackupRecord) -> Self {
        Self {
            filename: record.filename.clone(),
            size: record.size.clone(),
            created: record.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

impl ListArgs {
    pub fn run(self) -> Result<()> {
        let orchestrator = context::orchestrator()?;
        let records = orchestrator.list_backups(self.server.as_deref())?;

        if records.is_empty() {
            let message = match &self.server {
                Some(server) => format!("No backups found for {server}"),
                None => "No backups found".to_string(),
            };
            println!("{}", message.yellow());
            return Ok(());
        }

        let title = match &self.server {
            Some(server) => format!("Backups for {server}:"),
            None => "All backups:".to_string(),
        };
        println!("{}", title.bold());
        let mut table = Table::new(records.iter().map(BackupRow::from));
        table.with(Style::rounded());
        println!("{table}");
        println!("{}", format!("Total: {} backup(s)", records.len()).dimmed());
        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct CleanupArgs {
    /// Only prune backups of this server.
    pub server: Option<String>,

    /// Keep backups newer than this many days.
    #[arg(default_value_t = DEFAULT_KEEP_DAYS)]
    pub days: u32,
}

impl CleanupArgs {
    pub fn run(self) -> Result<()> {
        let orchestrator = context::orchestrator()?;
        println!(
            "{}",
            format!("Cleaning up backups older than {} days...", self.days).blue()
        );
        let deleted = orchestrator.cleanup_old_backups(self.server.as_deref(), self.days)?;
        if deleted > 0 {
            println!("{}", format!("Deleted {deleted} old backup(s)").green());
        } else {
            println!("{}", "No old backups to delete".yellow());
        }
        Ok(())
    }
}
