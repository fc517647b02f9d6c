//! Command engine: shell-interpreted child processes with timeout, full
//! output capture and line-oriented streaming.
//!
//! Command validation is a conservative heuristic, not a sandbox: it
//! rejects a fixed set of first tokens and a few dangerous substrings, and
//! nothing more. Callers must not rely on it as a security boundary.

use std::process::Stdio;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{info, warn};

use crate::error::OpsError;
use crate::ops::StreamSender;

/// First tokens that are refused outright (case-insensitive).
const DENY_LIST: &[&str] = &[
    "rm", "rmdir", "del", "format", "fdisk", "mkfs", "dd", "shutdown", "reboot", "halt",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandExecution {
    pub command: String,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub execution_time_ms: u64,
    pub success: bool,
}

/// Execute a command through the host shell, capturing both output streams
/// in full. The child is killed when `timeout` elapses.
pub async fn execute(
    command: &str,
    working_directory: Option<&str>,
    timeout: Duration,
) -> Result<CommandExecution, OpsError> {
    validate_command(command)?;

    let start = Instant::now();
    let mut cmd = shell_command(command, working_directory);
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
    // Dropping the in-flight future on timeout must also reap the child.
    cmd.kill_on_drop(true);

    let output = match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(output) => output?,
        Err(_) => return Err(OpsError::CommandTimeout(timeout.as_millis() as u64)),
    };

    let exit_code = output.status.code().unwrap_or(-1);
    Ok(CommandExecution {
        command: command.to_string(),
        exit_code,
        stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        execution_time_ms: start.elapsed().as_millis() as u64,
        success: exit_code == 0,
    })
}

/// Streaming execution: each stdout line becomes a `STDOUT: `-prefixed
/// chunk, stderr lines `STDERR: ` (when `include_stderr`), followed by a
/// final `EXIT_CODE: <n>` chunk. Cancellation of the stream kills the
/// child.
pub async fn execute_stream(
    command: &str,
    working_directory: Option<&str>,
    include_stderr: bool,
    tx: &StreamSender,
) -> Result<(), OpsError> {
    validate_command(command)?;

    let mut cmd = shell_command(command, working_directory);
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
    cmd.kill_on_drop(true);
    let mut child = cmd.spawn()?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let stdout_task = stdout.map(|out| {
        let tx = tx.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(out).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                tx.data(json!(format!("STDOUT: {line}"))).await?;
            }
            Ok::<(), OpsError>(())
        })
    });

    let stderr_task = if include_stderr {
        stderr.map(|err| {
            let tx = tx.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(err).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    tx.data(json!(format!("STDERR: {line}"))).await?;
                }
                Ok::<(), OpsError>(())
            })
        })
    } else {
        None
    };

    let status = tokio::select! {
        status = child.wait() => status?,
        _ = tx.closed() => {
            warn!(command, "stream consumer went away, killing child");
            let _ = child.kill().await;
            return Err(OpsError::StreamClosed);
        }
    };

    // Drain both readers before reporting the exit code so output chunks
    // always precede it.
    if let Some(task) = stdout_task {
        match task.await {
            Ok(result) => result?,
            Err(join_err) => return Err(OpsError::StreamError(join_err.to_string())),
        }
    }
    if let Some(task) = stderr_task {
        match task.await {
            Ok(result) => result?,
            Err(join_err) => return Err(OpsError::StreamError(join_err.to_string())),
        }
    }

    let exit_code = status.code().unwrap_or(-1);
    tx.data(json!(format!("EXIT_CODE: {exit_code}"))).await?;
    Ok(())
}

/// Describe the host system (`uname -a && uptime && whoami`).
pub async fn system_info(timeout: Duration) -> Result<CommandExecution, OpsError> {
    let command = if cfg!(windows) {
        "systeminfo"
    } else {
        "uname -a && uptime && whoami"
    };
    execute(command, None, timeout).await
}

/// List running processes (`ps aux` or `tasklist`).
pub async fn list_processes(timeout: Duration) -> Result<CommandExecution, OpsError> {
    let command = if cfg!(windows) { "tasklist" } else { "ps aux" };
    execute(command, None, timeout).await
}

fn shell_command(command: &str, working_directory: Option<&str>) -> Command {
    let mut cmd = if cfg!(windows) {
        let mut cmd = Command::new("cmd.exe");
        cmd.arg("/c").arg(command);
        cmd
    } else {
        let mut cmd = Command::new("/bin/sh");
        cmd.arg("-c").arg(command);
        cmd
    };
    if let Some(dir) = working_directory {
        if !dir.trim().is_empty() {
            cmd.current_dir(dir);
        }
    }
    info!(command, "executing command");
    cmd
}

/// Reject commands matching the deny-list (first token) or the dangerous
/// substring set. Both checks run against the lowercased command, so
/// benign strings containing e.g. `sudo` are also refused.
pub fn validate_command(command: &str) -> Result<(), OpsError> {
    let lower = command.trim().to_lowercase();
    if lower.is_empty() {
        return Err(OpsError::InvalidParameter {
            name: "command",
            message: "must not be empty".to_string(),
        });
    }

    for token in DENY_LIST {
        if lower == *token || lower.starts_with(&format!("{token} ")) {
            return Err(OpsError::ForbiddenCommand(format!(
                "Dangerous command not allowed: {token}"
            )));
        }
    }

    if lower.contains("sudo") || lower.contains("su ") {
        return Err(OpsError::ForbiddenCommand(
            "Privilege escalation commands not allowed".to_string(),
        ));
    }
    if lower.contains(">/dev/") || lower.contains(">/proc/") {
        return Err(OpsError::ForbiddenCommand(
            "Writing to system devices not allowed".to_string(),
        ));
    }

    Ok(())
}
