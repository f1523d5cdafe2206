//! Builder for running external collaborator commands.
//!
//! The pipeline shells out for two things: an optional syntax check of the
//! rewritten manifests (e.g. `ruby -c`) and opening a pull request (`git`,
//! `gh`). Both go through [`ExternalCommand`] so they share timeout
//! handling, logging, and error shape.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

use crate::constants::COMMAND_TIMEOUT;
use crate::core::TapError;

/// Captured output of a successful command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Fluent builder around [`tokio::process::Command`].
#[derive(Debug, Clone)]
pub struct ExternalCommand {
    program: String,
    args: Vec<String>,
    current_dir: Option<PathBuf>,
    timeout_duration: Duration,
}

impl ExternalCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
            timeout_duration: COMMAND_TIMEOUT,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub const fn with_timeout(mut self, duration: Duration) -> Self {
        self.timeout_duration = duration;
        self
    }

    /// Command line as a single string, for logs and messages.
    #[must_use]
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Run to completion; a non-zero exit is an error carrying stderr.
    pub async fn execute(self) -> Result<CommandOutput, TapError> {
        let command_error = |reason: String| TapError::Command {
            program: self.program.clone(),
            reason,
        };

        let resolved = which::which(&self.program)
            .map_err(|_| command_error("not found on PATH".to_string()))?;

        let mut cmd = Command::new(resolved);
        cmd.args(&self.args).stdout(Stdio::piped()).stderr(Stdio::piped()).kill_on_drop(true);
        if let Some(dir) = &self.current_dir {
            cmd.current_dir(dir);
        }

        tracing::debug!(target: "command", "Executing: {}", self.display());

        let output = match timeout(self.timeout_duration, cmd.output()).await {
            Ok(result) => result.map_err(|e| command_error(format!("failed to start: {e}")))?,
            Err(_) => {
                tracing::warn!(
                    target: "command",
                    "Command timed out after {} seconds: {}",
                    self.timeout_duration.as_secs(),
                    self.display()
                );
                return Err(command_error(format!(
                    "timed out after {} seconds",
                    self.timeout_duration.as_secs()
                )));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            tracing::debug!(target: "command", "Exit status {:?}: {}", output.status.code(), stderr);
            let reason = if stderr.trim().is_empty() {
                format!("exited with {}", output.status)
            } else {
                stderr.trim().to_string()
            };
            return Err(command_error(reason));
        }

        Ok(CommandOutput {
            stdout,
            stderr,
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_execute_captures_stdout() {
        let out = ExternalCommand::new("sh").args(["-c", "echo hello"]).execute().await.unwrap();
        assert_eq!(out.stdout.trim(), "hello");
    }

    #[tokio::test]
    async fn test_non_zero_exit_carries_stderr() {
        let err = ExternalCommand::new("sh")
            .args(["-c", "echo broken >&2; exit 3"])
            .execute()
            .await
            .unwrap_err();
        assert!(matches!(err, TapError::Command { .. }));
        assert!(err.to_string().contains("broken"));
    }

    #[tokio::test]
    async fn test_missing_program() {
        let err = ExternalCommand::new("tapbump-no-such-program").execute().await.unwrap_err();
        assert!(err.to_string().contains("not found on PATH"));
    }

    #[tokio::test]
    async fn test_timeout() {
        let err = ExternalCommand::new("sh")
            .args(["-c", "sleep 5"])
            .with_timeout(Duration::from_millis(100))
            .execute()
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn test_current_dir() {
        let temp = tempfile::TempDir::new().unwrap();
        let out =
            ExternalCommand::new("pwd").current_dir(temp.path()).execute().await.unwrap();
        let expected = temp.path().canonicalize().unwrap();
        let actual = std::path::PathBuf::from(out.stdout.trim()).canonicalize().unwrap();
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_display() {
        let cmd = ExternalCommand::new("ruby").arg("-c").arg("Casks/openjdk@ea.rb");
        assert_eq!(cmd.display(), "ruby -c Casks/openjdk@ea.rb");
    }
}
