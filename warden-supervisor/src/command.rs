//! Thin wrapper over `tokio::process::Command` for host tools
//! (`screen`, `netstat`, `ss`).
//!
//! A missing binary is reported as an unsuccessful [`ToolOutput`], not as an
//! error, so probes can fail soft.

use std::io::ErrorKind;
use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;

use crate::error::{io_err, SupervisorError};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    pub success: bool,
    /// `false` when the binary could not be found on `PATH`.
    pub found: bool,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    fn missing() -> Self {
        Self::default()
    }
}

pub async fn run_tool(program: &str, args: &[&str]) -> Result<ToolOutput, SupervisorError> {
    run_tool_in(program, args, None).await
}

pub async fn run_tool_in(
    program: &str,
    args: &[&str],
    cwd: Option<&Path>,
) -> Result<ToolOutput, SupervisorError> {
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }

    let output = match cmd.output().await {
        Ok(output) => output,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            tracing::debug!(program, "tool not found on PATH");
            return Ok(ToolOutput::missing());
        }
        Err(err) => return Err(io_err(program, err)),
    };

    let result = ToolOutput {
        success: output.status.success(),
        found: true,
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    };
    if !result.success {
        tracing::debug!(
            program,
            status = %output.status,
            stderr = %result.stderr,
            "tool exited unsuccessfully"
        );
    }
    Ok(result)
}

/// Single-quote `arg` for `bash -c`, escaping embedded quotes.
pub fn shell_quote(arg: &str) -> String {
    if !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_=./:+,@%".contains(c))
    {
        return arg.to_string();
    }
    format!("'{}'", arg.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoting_leaves_plain_args_alone() {
        assert_eq!(shell_quote("-Xmx2G"), "-Xmx2G");
        assert_eq!(shell_quote("-XX:MaxGCPauseMillis=200"), "-XX:MaxGCPauseMillis=200");
        assert_eq!(shell_quote("/srv/lobby"), "/srv/lobby");
    }

    #[test]
    fn quoting_wraps_spaces_and_quotes() {
        assert_eq!(shell_quote("/srv/my server"), "'/srv/my server'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
        assert_eq!(shell_quote(""), "''");
        assert_eq!(shell_quote("a;b"), "'a;b'");
    }

    #[tokio::test]
    async fn missing_binary_is_not_an_error() {
        let out = run_tool("warden-definitely-not-a-binary", &[])
            .await
            .expect("missing tool fails soft");
        assert!(!out.found);
        assert!(!out.success);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn captures_stdout_and_status() {
        let out = run_tool("sh", &["-c", "echo hello; exit 3"])
            .await
            .expect("run sh");
        assert!(out.found);
        assert!(!out.success);
        assert_eq!(out.stdout.trim(), "hello");
    }
}
