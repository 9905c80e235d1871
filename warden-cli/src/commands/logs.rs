//! `warden logs <server> [lines]`

use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use warden_core::paths::latest_log_path;

use super::context;

const TAIL_PREALLOC: usize = 1024;

#[derive(Args, Debug)]
pub struct LogsArgs {
    pub server: String,

    /// Number of trailing lines to show.
    #[arg(default_value_t = 50)]
    pub lines: usize,
}

impl LogsArgs {
    pub fn run(self) -> Result<()> {
        let config = context::load_config()?;
        let server = config.server(&self.server)?;
        let path = latest_log_path(&server.path);
        if !path.exists() {
            println!(
                "{}",
                format!("No log file found for server {}", self.server).yellow()
            );
            return Ok(());
        }
        println!(
            "{}",
            format!("Last {} lines of {} logs:", self.lines, self.server).bold()
        );
        print_tail(&path, self.lines).context("failed to read server log")
    }
}

fn print_tail(path: &Path, lines: usize) -> Result<()> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let reader = BufReader::new(file);

    let mut tail = VecDeque::<String>::with_capacity(lines.min(TAIL_PREALLOC));
    for line in reader.lines() {
        let line = line.with_context(|| format!("read {}", path.display()))?;
        if lines == 0 {
            continue;
        }
        if tail.len() == lines {
            tail.pop_front();
        }
        tail.push_back(line);
    }

    println!("{}", format!("==> {} <==", path.display()).dimmed());
    for line in tail {
        println!("{line}");
    }
    Ok(())
}
