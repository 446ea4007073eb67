use std::process::{ExitStatus, Stdio};

use eyre::{Result, WrapErr, eyre};
use tokio::process::{Child, Command};

/// The application launched next to the mesh.
///
/// The child shares the mesh's environment and stdio and is killed if the
/// handle is dropped while it still runs.
pub struct AppProcess {
    program: String,
    child: Child,
}

impl AppProcess {
    /// Spawn `command[0]` with the remaining elements as arguments.
    pub fn spawn(command: &[String]) -> Result<Self> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| eyre!("Application command is empty"))?;

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .wrap_err_with(|| format!("Failed to start application '{program}'"))?;

        tracing::info!(program = %program, pid = child.id(), "Started application process");
        Ok(Self {
            program: program.clone(),
            child,
        })
    }

    /// Wait for the application to exit.
    pub async fn wait(&mut self) -> Result<ExitStatus> {
        let status = self
            .child
            .wait()
            .await
            .wrap_err_with(|| format!("Failed to wait for application '{}'", self.program))?;
        if status.success() {
            tracing::info!(program = %self.program, "Application exited");
        } else {
            tracing::error!(program = %self.program, %status, "Application exited with failure");
        }
        Ok(status)
    }
}
