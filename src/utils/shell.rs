// src/utils/shell.rs
use std::process::Output;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, trace, warn};

use crate::error::{UtilResult, UtilError};

fn shell_error(cmd: &str, message: String) -> UtilError {
    UtilError::ExternalToolError {
        tool: cmd.split_whitespace().next().unwrap_or("sh").to_string(),
        message,
    }
}

/// Execute a shell command
pub async fn run_command(cmd: &str) -> UtilResult<Output> {
    debug!("Executing command: {}", cmd);

    let output = Command::new("sh")
        .arg("-c")
        .arg(cmd)
        .output()
        .await
        .map_err(|e| shell_error(cmd, format!("Failed to execute command: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        warn!("Command failed: {}\nStderr: {}", cmd, stderr);
    } else {
        trace!("Command succeeded: {}", cmd);
    }

    Ok(output)
}

/// Execute a shell command with a timeout
pub async fn run_command_with_timeout(cmd: &str, timeout_secs: u64) -> UtilResult<Output> {
    debug!("Executing command with timeout {}: {}", timeout_secs, cmd);

    let command_future = Command::new("sh")
        .arg("-c")
        .arg(cmd)
        .kill_on_drop(true)
        .output();

    match tokio::time::timeout(Duration::from_secs(timeout_secs), command_future).await {
        Ok(result) => result.map_err(|e| shell_error(cmd, format!("Failed to execute command: {}", e))),
        Err(_) => {
            warn!("Command timed out after {} seconds: {}", timeout_secs, cmd);
            Err(UtilError::TimeoutError {
                operation: cmd.to_string(),
                seconds: timeout_secs,
            })
        }
    }
}

/// Run a command and return its trimmed stdout, optionally echoing it.
///
/// A non-zero exit status is an error carrying the command's stderr.
pub async fn command_stdout(cmd: &str, echo: bool) -> UtilResult<String> {
    let output = run_command(cmd).await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(shell_error(cmd, format!("exited with {}: {}", output.status, stderr.trim())));
    }

    let stdout = String::from_utf8_lossy(&output.stdout).trim_end().to_string();
    if echo {
        println!("{}", stdout);
    }
    Ok(stdout)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_command_stdout() {
        let out = command_stdout("echo hello", false).await.unwrap();
        assert_eq!(out, "hello");
    }

    #[tokio::test]
    async fn test_failing_command_is_error() {
        let err = command_stdout("exit 3", false).await.unwrap_err();
        assert!(matches!(err, UtilError::ExternalToolError { .. }));
    }

    #[tokio::test]
    async fn test_command_timeout() {
        let err = run_command_with_timeout("sleep 5", 1).await.unwrap_err();
        assert!(matches!(err, UtilError::TimeoutError { seconds: 1, .. }));
    }
}
