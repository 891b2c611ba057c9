// TerminalCollaborator that runs commands through the platform shell

use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;

use super::{CommandOutput, TerminalCollaborator};
use crate::error::TerminalError;

#[derive(Debug, Clone, Copy, Default)]
pub struct ShellTerminal;

impl ShellTerminal {
    fn command(command: &str) -> Command {
        #[cfg(windows)]
        {
            let mut cmd = Command::new("cmd");
            cmd.arg("/C").arg(command);
            cmd
        }

        #[cfg(not(windows))]
        {
            let mut cmd = Command::new("sh");
            cmd.arg("-c").arg(command);
            cmd
        }
    }
}

#[async_trait]
impl TerminalCollaborator for ShellTerminal {
    async fn execute(&self, dir: &Path, command: &str) -> Result<CommandOutput, TerminalError> {
        let output = Self::command(command)
            .current_dir(dir)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| TerminalError::Spawn {
                command: command.to_string(),
                dir: dir.to_path_buf(),
                source: e,
            })?;

        Ok(CommandOutput {
            // Killed by a signal has no code
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}
