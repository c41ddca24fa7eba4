//! Shell action - runs a script in the workspace

use crate::actions::{Action, ActionError, ActionOutput, ActionParams};
use crate::workspace::Workspace;
use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

/// Runs `with.script` through `with.shell` (default `sh`)
///
/// Optional `with.working_directory` is resolved against the workspace.
#[derive(Debug, Clone)]
pub struct ShellAction {
    default_shell: String,
}

impl ShellAction {
    pub fn new() -> Self {
        Self {
            default_shell: "sh".to_string(),
        }
    }

    pub fn with_default_shell(shell: impl Into<String>) -> Self {
        Self {
            default_shell: shell.into(),
        }
    }
}

impl Default for ShellAction {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Action for ShellAction {
    async fn execute(
        &self,
        params: &ActionParams,
        workspace: &Workspace,
    ) -> Result<ActionOutput, ActionError> {
        let script = params.require("script")?;
        let shell = params.input("shell").unwrap_or(self.default_shell.as_str());
        let cwd = match params.input("working_directory") {
            Some(dir) => workspace.path().join(dir),
            None => workspace.path().to_path_buf(),
        };

        debug!("[{}] {} -c {:?} in {}", params.step_id, shell, script, cwd.display());

        // Dropping the future on timeout kills the child
        let output = Command::new(shell)
            .arg("-c")
            .arg(script)
            .current_dir(&cwd)
            .envs(&params.env)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ActionError::Spawn(format!("{}: {}", shell, e)))?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        // Killed by a signal
        let exit_code = output.status.code().unwrap_or(-1);
        if exit_code != 0 {
            warn!("[{}] exited with code {}", params.step_id, exit_code);
        }

        Ok(ActionOutput::new(exit_code, combined))
    }
}
