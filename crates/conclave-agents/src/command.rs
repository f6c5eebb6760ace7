use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::AgentError;

/// An external program that answers knowledge lookups.
#[derive(Debug, Clone)]
pub struct CommandConfig {
    pub program: String,
    pub args: Vec<String>,
    pub timeout: Duration,
}

/// Run `program args... request` and return its stdout.
///
/// The request JSON is passed as the final argument. A non-zero exit or
/// empty output is an error; so is exceeding the timeout.
pub async fn invoke_command(config: &CommandConfig, request: &str) -> Result<String, AgentError> {
    debug!(program = %config.program, "Invoking knowledge command");

    let output = tokio::time::timeout(
        config.timeout,
        Command::new(&config.program)
            .args(&config.args)
            .arg(request)
            .kill_on_drop(true)
            .output(),
    )
    .await
    .map_err(|_| AgentError::Timeout(config.timeout.as_secs()))?
    .map_err(|e| AgentError::Command(format!("failed to spawn {}: {e}", config.program)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        warn!(program = %config.program, status = %output.status, stderr = %stderr, "Knowledge command failed");
        return Err(AgentError::Command(format!(
            "{} exited {}: {}",
            config.program, output.status, stderr
        )));
    }

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    if stdout.trim().is_empty() {
        return Err(AgentError::Command(format!(
            "{} produced no output",
            config.program
        )));
    }
    Ok(stdout)
}

/// Whether `program` can be spawned at all.
pub async fn check_command_available(program: &str) -> bool {
    match Command::new(program).arg("--version").output().await {
        Ok(output) => output.status.success(),
        Err(_) => false,
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn config(program: &str, args: &[&str], timeout_ms: u64) -> CommandConfig {
        CommandConfig {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            timeout: Duration::from_millis(timeout_ms),
        }
    }

    #[tokio::test]
    async fn request_is_last_argument() {
        let out = invoke_command(&config("echo", &["-n"], 2000), r#"{"agent":"a"}"#)
            .await
            .unwrap();
        assert_eq!(out, r#"{"agent":"a"}"#);
    }

    #[tokio::test]
    async fn missing_program_is_command_error() {
        let err = invoke_command(&config("conclave-no-such-binary", &[], 2000), "{}")
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Command(_)));
    }

    #[tokio::test]
    async fn failing_program_is_command_error() {
        let err = invoke_command(&config("sh", &["-c", "exit 3"], 2000), "{}")
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Command(_)));
    }

    #[tokio::test]
    async fn slow_program_times_out() {
        let err = invoke_command(&config("sh", &["-c", "sleep 5", "sh"], 100), "{}")
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Timeout(_)));
    }
}
