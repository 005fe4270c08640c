//! Running the external CLIs (`charmcraft`, `juju`) the release tooling drives.

use crate::error::OpsError;

/// Run `program args...` to completion and return its stdout.
///
/// A non-zero exit is an error carrying the trimmed stderr.
pub async fn run_command(program: &str, args: &[&str]) -> Result<String, OpsError> {
    let command_line = std::iter::once(program)
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" ");
    tracing::debug!("[Process] Running {}", command_line);

    let output = tokio::process::Command::new(program)
        .args(args)
        .output()
        .await
        .map_err(|e| OpsError::Command {
            command: command_line.clone(),
            message: e.to_string(),
        })?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    if output.status.success() {
        return Ok(stdout);
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    Err(OpsError::Command {
        command: command_line,
        message: format!("{} ({})", stderr.trim(), output.status),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stdout_returned_on_success() {
        let out = run_command("sh", &["-c", "echo promoted"]).await.unwrap();
        assert_eq!(out.trim(), "promoted");
    }

    #[tokio::test]
    async fn test_failure_carries_stderr() {
        let err = run_command("sh", &["-c", "echo 'no such channel' >&2; exit 3"])
            .await
            .unwrap_err();
        match err {
            OpsError::Command { command, message } => {
                assert!(command.starts_with("sh -c"));
                assert!(message.contains("no such channel"));
            }
            other => panic!("expected Command error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_program_is_error() {
        let err = run_command("charmops-no-such-binary", &[]).await.unwrap_err();
        assert!(err.to_string().contains("charmops-no-such-binary"));
    }
}
