//! Compute release through an executable hook.

use super::CommandSpec;
use crate::job::{
    domain::JobId,
    ports::{ComputeError, ComputeResult, ComputeTerminator},
};
use async_trait::async_trait;
use std::process::Stdio;

/// Releases compute by running a hook with `--job-id <id>`.
#[derive(Debug, Clone)]
pub struct CommandTerminator {
    command: CommandSpec,
}

impl CommandTerminator {
    /// Creates a terminator for the given hook.
    #[must_use]
    pub const fn new(command: CommandSpec) -> Self {
        Self { command }
    }
}

#[async_trait]
impl ComputeTerminator for CommandTerminator {
    async fn terminate(&self, job_id: JobId) -> ComputeResult<()> {
        let output = self
            .command
            .command()
            .arg("--job-id")
            .arg(job_id.to_string())
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|err| ComputeError::Spawn(format!("{}: {err}", self.command.program)))?;
        if output.status.success() {
            return Ok(());
        }
        Err(ComputeError::Failed(
            String::from_utf8_lossy(&output.stderr).trim().to_owned(),
        ))
    }
}
