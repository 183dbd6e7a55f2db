//! Shell command collaborator.
//!
//! Every platform tool this crate consults (`dmidecode`, `lshw`, `nvidia-smi`,
//! `df`, `ip`, `docker`) is invoked through [`run_command`]: spawn the command
//! under `sh -c`, capture stdout and stderr as one text stream, and succeed
//! only on a zero exit code. Probe call sites treat a failure as "data
//! unavailable" and substitute an empty result.
//!
//! No timeout is applied to the spawned process; a hung tool stalls the one
//! query that invoked it.

use tokio::process::Command;

/// Error raised when a command cannot be run or exits nonzero.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with status {status}: {output}")]
    Failed {
        command: String,
        status: i32,
        output: String,
    },
}

/// Runs a shell command and returns its combined stdout and stderr.
///
/// # Errors
///
/// Returns [`CommandError::Spawn`] if the shell cannot be started and
/// [`CommandError::Failed`] (carrying the exit status and the combined
/// output) if the command exits nonzero.
pub async fn run_command(command: &str) -> Result<String, CommandError> {
    let output = Command::new("sh")
        .arg("-c")
        .arg(command)
        .output()
        .await
        .map_err(|source| CommandError::Spawn {
            command: command.to_owned(),
            source,
        })?;

    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));

    if !output.status.success() {
        return Err(CommandError::Failed {
            command: command.to_owned(),
            status: output.status.code().unwrap_or(-1),
            output: text,
        });
    }

    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_captures_stdout() {
        let out = run_command("printf hello").await.unwrap();
        assert_eq!(out, "hello");
    }

    #[tokio::test]
    async fn test_combines_stdout_and_stderr() {
        let out = run_command("printf out; printf err 1>&2").await.unwrap();
        assert!(out.contains("out"));
        assert!(out.contains("err"));
    }

    #[tokio::test]
    async fn test_nonzero_exit_fails_with_status_and_output() {
        let err = run_command("printf doomed; exit 3").await.unwrap_err();
        match err {
            CommandError::Failed { status, output, .. } => {
                assert_eq!(status, 3);
                assert!(output.contains("doomed"));
            }
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_tool_fails() {
        let result = run_command("definitely-not-a-real-tool-xyz").await;
        assert!(result.is_err());
    }
}
