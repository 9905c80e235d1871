//! `warden start|stop|restart|send|console`

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use warden_supervisor::StopOutcome;

use super::context;

#[derive(Args, Debug)]
pub struct StartArgs {
    /// Server name from the configuration file.
    pub server: String,

    /// Leave the session detached instead of attaching to its console.
    #[arg(long)]
    pub no_attach: bool,
}

impl StartArgs {
    pub async fn run(self) -> Result<()> {
        let controller = context::controller()?;
        println!("{}", format!("Starting server {}...", self.server).blue());
        controller.start(&self.server, !self.no_attach).await?;
        println!("{}", format!("Server {} started", self.server).green());
        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct StopArgs {
    pub server: String,

    /// Skip the console `stop` and go straight to signals.
    #[arg(long, short)]
    pub force: bool,
}

impl StopArgs {
    pub async fn run(self) -> Result<()> {
        let controller = context::controller()?;
        println!("{}", format!("Stopping server {}...", self.server).blue());
        let outcome = controller.stop(&self.server, self.force).await?;
        print_stop(&self.server, outcome);
        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct RestartArgs {
    pub server: String,
}

impl RestartArgs {
    pub async fn run(self) -> Result<()> {
        let controller = context::controller()?;
        println!("{}", format!("Restarting server {}...", self.server).blue());
        match controller.restart(&self.server).await? {
            Some(outcome) => print_stop(&self.server, outcome),
            None => println!("{}", format!("Server {} was not running", self.server).dimmed()),
        }
        println!("{}", format!("Server {} started", self.server).green());
        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct SendArgs {
    pub server: String,

    /// Console command; remaining words are joined with spaces.
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

impl SendArgs {
    pub async fn run(self) -> Result<()> {
        let controller = context::controller()?;
        let text = self.command.join(" ");
        controller.send_command(&self.server, &text).await?;
        println!("{}", format!("Sent to {}: {text}", self.server).green());
        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct ConsoleArgs {
    pub server: String,
}

impl ConsoleArgs {
    pub async fn run(self) -> Result<()> {
        let controller = context::controller()?;
        println!(
            "{}",
            "Attaching to console. Detach with Ctrl+A then D.".dimmed()
        );
        controller.attach_console(&self.server).await?;
        Ok(())
    }
}

fn print_stop(server: &str, outcome: StopOutcome) {
    let message = outcome.describe(server);
    if outcome.is_warning() {
        println!("{}", message.yellow());
    } else {
        println!("{}", message.green());
    }
}
